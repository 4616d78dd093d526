//! Controls manager: the child control list
//!
//! Builds and rebuilds children from the field descriptor, enforces the
//! structural invariants (unique sibling names outside array grouping,
//! metadata for heterogeneous array templates), and carries the dynamic
//! add/append/remove/move operations.

use super::ManagerLifecycle;
use crate::control::Control;
use crate::error::FieldError;
use crate::field::{Field, Grouping, StartWith};
use formwork_value::Value;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Identifier accepted by control lookups
///
/// Numeric indexes count from the end when negative; string queries match
/// `"."` (root), `".."` (parent), dot-delimited paths, or a direct
/// name/key/uid.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// Child index; negative indexes from the end
    Index(isize),
    /// Path or name/key/uid query
    Query(&'a str),
}

impl<'a> From<&'a str> for Lookup<'a> {
    fn from(query: &'a str) -> Self {
        Self::Query(query)
    }
}

impl From<isize> for Lookup<'_> {
    fn from(index: isize) -> Self {
        Self::Index(index)
    }
}

impl From<usize> for Lookup<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index as isize)
    }
}

/// Template selector for repeating controls
#[derive(Debug, Clone)]
pub enum TemplateRef {
    /// Template by name
    Name(String),
    /// Template by declaration index
    Index(usize),
    /// Explicit field (must match a declared template name unless unresolved
    /// names are allowed)
    Field(Box<Field>),
}

impl From<&str> for TemplateRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for TemplateRef {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<Field> for TemplateRef {
    fn from(field: Field) -> Self {
        Self::Field(Box::new(field))
    }
}

/// Owns the ordered child control list
pub(crate) struct ControlsManager {
    control: Weak<Control>,
    children: RwLock<Vec<Arc<Control>>>,
    changed: watch::Sender<u64>,
}

impl ControlsManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        let (changed, _) = watch::channel(0);
        Self {
            control,
            children: RwLock::new(Vec::new()),
            changed,
        }
    }

    /// Snapshot of the child list
    pub(crate) fn children(&self) -> Vec<Arc<Control>> {
        self.children.read().clone()
    }

    /// Number of children
    pub(crate) fn len(&self) -> usize {
        self.children.read().len()
    }

    /// Change stream (revision counter)
    pub(crate) fn changed_stream(&self) -> watch::Receiver<u64> {
        self.changed.subscribe()
    }

    /// Position of a child by uid
    pub(crate) fn position_of(&self, child: &Control) -> Option<usize> {
        self.children
            .read()
            .iter()
            .position(|c| c.uid() == child.uid())
    }

    fn notify(&self) {
        self.changed.send_modify(|revision| *revision += 1);
    }

    /// Rebuild the child list from the current field
    ///
    /// `reset` discards all existing children first (full rebuild); the
    /// incremental path keeps same-named children alive across field edits.
    pub(crate) fn rebuild(&self, reset: bool) -> Result<(), FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Ok(());
        };
        let field = control.field();
        let path = control.path().to_string();

        if reset {
            self.remove_all();
        }

        match field.grouping {
            Grouping::Array => self.rebuild_array(&control, &field, &path)?,
            Grouping::Group | Grouping::Flat => self.rebuild_group(&control, &field, &path)?,
        }
        self.notify();
        Ok(())
    }

    fn rebuild_array(
        &self,
        control: &Arc<Control>,
        field: &Field,
        path: &str,
    ) -> Result<(), FieldError> {
        let templates = field.templates();
        if templates.is_empty() {
            return Err(FieldError::NoTemplate { path: path.to_string() });
        }
        let names = field.template_names();
        if names.len() > 1 {
            // Heterogeneous repeatable items are only tellable-apart after
            // serialization when each entry carries `_name` metadata.
            if !control.config().add_metadata {
                return Err(FieldError::HeterogeneousWithoutMetadata { path: path.to_string() });
            }
            if let Some(template) = templates.iter().find(|t| t.fields.is_none()) {
                return Err(FieldError::TemplateNotGroup {
                    path: path.to_string(),
                    template: template.name.clone(),
                });
            }
        }

        // A present array value drives child creation through reconciliation
        // instead; `start_with` only materializes a fresh, value-less control.
        let value_is_array = matches!(control.managers.value.current(), Some(Value::Array(_)));
        if !value_is_array && self.len() == 0 {
            match &field.start_with {
                Some(StartWith::Count(count)) => {
                    for _ in 0..*count {
                        self.construct_and_push(templates[0].clone())?;
                    }
                }
                Some(StartWith::Templates(names)) => {
                    for name in names {
                        let template = field.template_named(name).ok_or_else(|| {
                            FieldError::UnknownTemplate {
                                path: path.to_string(),
                                requested: name.clone(),
                            }
                        })?;
                        self.construct_and_push(template.clone())?;
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    fn rebuild_group(
        &self,
        _control: &Arc<Control>,
        field: &Field,
        path: &str,
    ) -> Result<(), FieldError> {
        let Some(fields) = &field.fields else {
            return Ok(());
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for child_field in fields {
            if !seen.insert(child_field.name.as_str()) {
                duplicates.push(child_field.name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(FieldError::DuplicateNames {
                path: path.to_string(),
                names: duplicates,
            });
        }

        // Drop children whose names vanished from the descriptor.
        let keep: HashSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        let stale: Vec<Arc<Control>> = self
            .children()
            .into_iter()
            .filter(|child| !keep.contains(child.name().as_str()))
            .collect();
        for child in stale {
            self.remove_child(&child);
        }

        // In-place field updates preserve identity and state across edits.
        for child_field in fields {
            match self.find_by_name(&child_field.name) {
                Some(existing) => {
                    existing.set_field(child_field.clone(), false)?;
                }
                None => {
                    self.construct_and_push(child_field.clone())?;
                }
            }
        }
        Ok(())
    }

    /// Build a child and append it to the list
    pub(crate) fn construct_and_push(&self, field: Field) -> Result<Arc<Control>, FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Err(FieldError::MissingName { path: ".".to_string() });
        };
        let slot = match control.grouping() {
            Grouping::Array => Some(self.len()),
            _ => None,
        };
        let child = Control::build_with_slot(field, Some(&control), control.context(), slot)?;
        self.children.write().push(child.clone());
        Ok(child)
    }

    /// Locate-or-update for groups, append otherwise
    pub(crate) fn add_control(&self, field: Field) -> Result<Arc<Control>, FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Err(FieldError::MissingName { path: ".".to_string() });
        };
        if control.grouping() != Grouping::Array {
            if let Some(existing) = self.find_by_name(&field.name) {
                existing.set_field(field, false)?;
                return Ok(existing);
            }
        }
        let child = self.construct_and_push(field)?;
        self.notify();
        control.managers.value.resync_upward();
        Ok(child)
    }

    /// Append one repeating child from a template
    pub(crate) fn append_repeating(
        &self,
        template: Option<TemplateRef>,
    ) -> Result<Arc<Control>, FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Err(FieldError::MissingName { path: ".".to_string() });
        };
        let field = control.field();
        let path = control.path().to_string();
        if field.grouping != Grouping::Array {
            return Err(FieldError::NotArrayGrouped { path });
        }
        let templates = field.templates();
        if templates.is_empty() {
            return Err(FieldError::NoTemplate { path });
        }

        let chosen: Field = match template {
            None => templates[0].clone(),
            Some(TemplateRef::Name(name)) => field
                .template_named(&name)
                .cloned()
                .ok_or_else(|| FieldError::UnknownTemplate {
                    path: path.clone(),
                    requested: name,
                })?,
            Some(TemplateRef::Index(index)) => {
                templates
                    .get(index)
                    .cloned()
                    .ok_or_else(|| FieldError::UnknownTemplate {
                        path: path.clone(),
                        requested: index.to_string(),
                    })?
            }
            Some(TemplateRef::Field(custom)) => {
                let known = field.template_named(&custom.name).is_some();
                if !known && !control.config().allow_unresolved_array_child_names {
                    return Err(FieldError::UnknownTemplate {
                        path: path.clone(),
                        requested: custom.name.clone(),
                    });
                }
                *custom
            }
        };

        let child = self.construct_and_push(chosen)?;
        self.notify();
        control.managers.value.resync_upward();
        Ok(child)
    }

    /// Remove a child located by index/name/key/uid
    ///
    /// Returns `false` on a lookup miss.
    pub(crate) fn remove(&self, lookup: Lookup<'_>) -> bool {
        let Some(child) = self.get_direct(lookup) else {
            return false;
        };
        self.remove_child(&child);
        self.notify();
        if let Some(control) = self.control.upgrade() {
            control.managers.value.resync_upward();
        }
        true
    }

    /// Remove one child: hook, cleanup, splice
    ///
    /// Cleanup runs before the list is updated so the child's resources are
    /// released while it is still addressable.
    pub(crate) fn remove_child(&self, child: &Arc<Control>) {
        if let Some(hook) = child.field().hooks.on_remove.clone() {
            hook(child);
        }
        child.cleanup();
        let mut children = self.children.write();
        if let Some(position) = children.iter().position(|c| c.uid() == child.uid()) {
            children.remove(position);
        }
    }

    /// Remove every child (array clear, full rebuild)
    pub(crate) fn remove_all(&self) {
        for child in self.children() {
            self.remove_child(&child);
        }
    }

    /// Trim array children beyond `len`
    pub(crate) fn truncate(&self, len: usize) {
        let excess: Vec<Arc<Control>> = self.children().into_iter().skip(len).collect();
        for child in excess {
            self.remove_child(&child);
        }
    }

    /// Move a child to a new index
    pub(crate) fn move_to(&self, lookup: Lookup<'_>, to_index: usize) -> bool {
        let Some(child) = self.get_direct(lookup) else {
            return false;
        };
        {
            let mut children = self.children.write();
            let Some(from) = children.iter().position(|c| c.uid() == child.uid()) else {
                return false;
            };
            let moved = children.remove(from);
            let to = to_index.min(children.len());
            children.insert(to, moved);
        }
        self.notify();
        if let Some(control) = self.control.upgrade() {
            control.managers.value.resync_upward();
        }
        true
    }

    /// Resolve a lookup, including `"."`, `".."`, and dot-delimited paths
    pub(crate) fn get(&self, lookup: Lookup<'_>) -> Option<Arc<Control>> {
        let control = self.control.upgrade()?;
        match lookup {
            Lookup::Index(_) => self.get_direct(lookup),
            Lookup::Query(".") => Some(control.root()),
            Lookup::Query("..") => control.parent(),
            Lookup::Query(query) => match query.split_once('.') {
                Some((head, rest)) => {
                    let next = match head {
                        "" => control.root(),
                        ".." => control.parent()?,
                        name => self.get_direct(Lookup::Query(name))?,
                    };
                    next.get_control(rest)
                }
                None => self.get_direct(lookup),
            },
        }
    }

    /// Direct child by index, name, key, or uid
    fn get_direct(&self, lookup: Lookup<'_>) -> Option<Arc<Control>> {
        let children = self.children();
        match lookup {
            Lookup::Index(index) => {
                let len = children.len() as isize;
                let normalized = if index < 0 { len + index } else { index };
                usize::try_from(normalized)
                    .ok()
                    .and_then(|i| children.get(i).cloned())
            }
            Lookup::Query(query) => children.into_iter().find(|child| {
                child.name() == query
                    || child.uid().as_str() == query
                    || child.key().short() == query
            }),
        }
    }

    /// Direct child by field name
    pub(crate) fn find_by_name(&self, name: &str) -> Option<Arc<Control>> {
        self.children()
            .into_iter()
            .find(|child| child.name() == name)
    }
}

impl ManagerLifecycle for ControlsManager {
    fn on_initialize(&self) -> Result<(), FieldError> {
        self.rebuild(false)
    }

    fn cleanup(&self) {
        for child in self.children() {
            child.cleanup();
        }
        self.children.write().clear();
    }
}
