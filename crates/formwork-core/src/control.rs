//! The control: composition root and tree node
//!
//! A control owns one instance of each manager and its child controls;
//! parents hold the only strong references, children point back through
//! `Weak`. The public API here is a thin layer over the manager set: values
//! through the value manager, state through the state manager, structure
//! through the controls manager, submission through the events manager.

use crate::config::{Config, NameCase};
use crate::context::FormContext;
use crate::error::{FieldError, SubmitError};
use crate::external::{ElementBinding, ElementEvent};
use crate::field::{Field, Grouping};
use crate::managers::{Lookup, Managers, TaskBag, TemplateRef};
use crate::state::{ControlState, PairState, SubmitResult};
use formwork_resolver::{Registry, ResolverRegistry, ValidatorRegistry};
use formwork_value::{KeyPath, Segment, StructuralKey, Uid, Value};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Live runtime node built from a field descriptor
///
/// Construction happens through [`FormContext::create_form`] for roots and
/// through the parent's child operations for everything else. A control is
/// alive while reachable from its parent's child list; removal cleans up all
/// owned resources synchronously.
pub struct Control {
    context: Arc<FormContext>,
    uid: Uid,
    parent: Weak<Control>,
    this: Weak<Control>,
    slot_hint: RwLock<Option<usize>>,
    pub(crate) managers: Managers,
    initialized: AtomicBool,
    tasks: TaskBag,
}

impl Control {
    // ---- construction ----

    pub(crate) fn build(
        field: Field,
        parent: Option<&Arc<Control>>,
        context: &Arc<FormContext>,
    ) -> Result<Arc<Control>, FieldError> {
        Self::build_with_slot(field, parent, context, None)
    }

    pub(crate) fn build_with_slot(
        field: Field,
        parent: Option<&Arc<Control>>,
        context: &Arc<FormContext>,
        slot: Option<usize>,
    ) -> Result<Arc<Control>, FieldError> {
        if field.name.is_empty() {
            let path = parent.map_or_else(|| ".".to_string(), |p| p.path().to_string());
            return Err(FieldError::MissingName { path });
        }
        let effective = parent
            .map_or_else(|| context.default_config(), |p| p.config())
            .merged(&field.config);
        if let Some(case) = effective.required_name_case {
            if !name_matches_case(&field.name, case) {
                tracing::warn!(name = %field.name, ?case, "field name does not match the required case");
            }
        }

        let uid = context.uid_pool().issue();
        let control = Arc::new_cyclic(|weak: &Weak<Control>| Control {
            context: context.clone(),
            uid,
            parent: parent.map_or_else(Weak::new, Arc::downgrade),
            this: weak.clone(),
            slot_hint: RwLock::new(slot),
            managers: Managers::new(weak.clone(), field),
            initialized: AtomicBool::new(false),
            tasks: TaskBag::new(),
        });
        if let Err(error) = control.initialize() {
            control.cleanup();
            return Err(error);
        }
        Ok(control)
    }

    fn initialize(&self) -> Result<(), FieldError> {
        for manager in self.managers.ordered() {
            manager.prepare()?;
        }
        for manager in self.managers.ordered() {
            manager.on_initialize()?;
        }
        self.initialized.store(true, Ordering::SeqCst);
        for manager in self.managers.ordered() {
            manager.after_initialize();
        }
        if let Some(hook) = self.field().hooks.on_create.clone() {
            hook(&self.this());
        }
        Ok(())
    }

    fn this(&self) -> Arc<Control> {
        self.this
            .upgrade()
            .expect("self reference is valid while the control is referenced")
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    // ---- identity ----

    /// The field name
    #[must_use]
    pub fn name(&self) -> String {
        self.managers.field.name()
    }

    /// Instance identifier, stable for this control's lifetime
    #[must_use]
    pub fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Path from the root down to this control
    #[must_use]
    pub fn path(&self) -> KeyPath {
        match self.parent() {
            None => KeyPath::root(),
            Some(parent) => {
                let base = parent.path();
                match self.slot_segment() {
                    Some(segment) => base.child(segment),
                    None => base.child(self.name().as_str()),
                }
            }
        }
    }

    /// Structural key: content-stable hash of the path
    ///
    /// Recomputed from the live path, so ancestor reordering is always
    /// reflected.
    #[must_use]
    pub fn key(&self) -> StructuralKey {
        StructuralKey::compute(&self.path())
    }

    /// The parent control, if any
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Control>> {
        self.parent.upgrade()
    }

    /// The tree root (self for root controls)
    #[must_use]
    pub fn root(&self) -> Arc<Control> {
        let mut node = self.this();
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node
    }

    /// True for the tree root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.upgrade().is_none()
    }

    /// The registry context this control was built in
    #[must_use]
    pub fn context(&self) -> &Arc<FormContext> {
        &self.context
    }

    pub(crate) fn index_in_parent(&self) -> Option<usize> {
        let parent = self.parent()?;
        parent.managers.controls.position_of(self)
    }

    pub(crate) fn slot_segment(&self) -> Option<Segment> {
        let parent = self.parent()?;
        match parent.grouping() {
            Grouping::Array => {
                let index = self.index_in_parent().or(*self.slot_hint.read())?;
                Some(Segment::Index(index))
            }
            _ => Some(Segment::Name(self.name())),
        }
    }

    // ---- descriptor / configuration ----

    /// Snapshot of the current field descriptor
    #[must_use]
    pub fn field(&self) -> Field {
        self.managers.field.current()
    }

    /// How this control's children combine
    #[must_use]
    pub fn grouping(&self) -> Grouping {
        self.managers.field.current().grouping
    }

    /// Effective configuration
    #[must_use]
    pub fn config(&self) -> Config {
        self.managers.config.current()
    }

    /// Replace the field descriptor
    ///
    /// Semantically equal descriptors are a no-op. `reset_control` forces a
    /// full child rebuild instead of the incremental diff. Returns whether
    /// anything changed.
    ///
    /// # Errors
    /// Construction errors from the rebuild.
    pub fn set_field(&self, field: Field, reset_control: bool) -> Result<bool, FieldError> {
        self.managers.field.set_field(field, reset_control)
    }

    /// Mutate a copy of the current descriptor and apply it
    ///
    /// # Errors
    /// Construction errors from the rebuild.
    pub fn update_field(&self, mutate: impl FnOnce(&mut Field)) -> Result<bool, FieldError> {
        self.managers.field.update_field(mutate)
    }

    /// Field change stream (revision counter)
    #[must_use]
    pub fn field_changes(&self) -> watch::Receiver<u64> {
        self.managers.field.revision_stream()
    }

    /// Drives the rest of the manager set after a descriptor change
    pub(crate) fn handle_field_change(&self, reset_control: bool) -> Result<(), FieldError> {
        self.managers.config.refresh();
        self.managers.params.refresh();
        self.managers.controls.rebuild(reset_control)?;
        self.managers.value.refresh_sync(true)?;
        self.managers.state.refresh_overrides();
        self.managers.state.schedule_validation();
        self.managers.state.set_pair(PairState::Dirty, true);

        if self.config().reset_form_on_field_changes {
            self.reset()?;
        }
        if let Some(hook) = self.field().hooks.on_changes.clone() {
            hook(&self.this());
        }
        Ok(())
    }

    // ---- value ----

    /// Current value
    #[must_use]
    pub fn value(&self) -> Option<Value> {
        self.managers.value.current()
    }

    /// Resolved params snapshot
    #[must_use]
    pub fn params(&self) -> Option<Value> {
        self.managers.params.current()
    }

    /// Assign a value (replace semantics)
    ///
    /// Children are reconciled against the new value: array entries create
    /// and remove repeating children, object keys push into named children,
    /// absent keys clear theirs.
    ///
    /// # Errors
    /// Construction errors from reconciliation (unknown array templates).
    pub fn set_value(&self, value: impl Into<Value>) -> Result<(), FieldError> {
        self.managers
            .value
            .apply_incoming(Some(value.into()), false, true)?;
        self.managers.state.set_pair(PairState::Dirty, true);
        Ok(())
    }

    /// Assign a value with merge semantics
    ///
    /// Like [`set_value`](Self::set_value) but keys absent from the patch
    /// keep their current child values.
    ///
    /// # Errors
    /// Construction errors from reconciliation.
    pub fn patch_value(&self, value: impl Into<Value>) -> Result<(), FieldError> {
        self.managers
            .value
            .apply_incoming(Some(value.into()), true, true)?;
        self.managers.state.set_pair(PairState::Dirty, true);
        Ok(())
    }

    /// Clear the value
    ///
    /// Repeating children are removed; structurally declared children only
    /// have their values cleared.
    ///
    /// # Errors
    /// Construction errors from reconciliation.
    pub fn clear_value(&self) -> Result<(), FieldError> {
        self.managers.value.apply_incoming(None, false, true)?;
        self.managers.state.set_pair(PairState::Dirty, true);
        Ok(())
    }

    /// Value change stream
    #[must_use]
    pub fn value_changes(&self) -> watch::Receiver<Option<Value>> {
        self.managers.value.changes_stream()
    }

    pub(crate) fn has_child_structure(&self) -> bool {
        self.managers.field.current().fields.is_some() || self.managers.controls.len() > 0
    }

    pub(crate) fn ancestor_uses_storage(&self) -> bool {
        let mut node = self.parent();
        while let Some(current) = node {
            if current.field().use_storage {
                return true;
            }
            node = current.parent();
        }
        false
    }

    pub(crate) fn run_value_change_hooks(&self) {
        if !self.is_initialized() {
            return;
        }
        let this = self.this();
        let hooks = self.field().hooks;
        if let Some(hook) = hooks.on_value_changes {
            hook(&this);
        }
        if let Some(hook) = hooks.on_changes {
            hook(&this);
        }
    }

    // ---- state ----

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> ControlState {
        self.managers.state.snapshot()
    }

    /// State change stream
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ControlState> {
        self.managers.state.changes_stream()
    }

    /// Mark interacted / not interacted
    pub fn set_touched(&self, touched: bool) {
        self.managers.state.set_pair(PairState::Touched, touched);
    }

    /// Mark value changed / pristine
    pub fn set_dirty(&self, dirty: bool) {
        self.managers.state.set_pair(PairState::Dirty, dirty);
    }

    /// Enable or disable, cascading to children
    pub fn set_enabled(&self, enabled: bool) {
        self.managers.state.set_pair(PairState::Enabled, enabled);
    }

    /// Complement of [`set_enabled`](Self::set_enabled)
    pub fn set_disabled(&self, disabled: bool) {
        self.set_enabled(!disabled);
    }

    /// Include or exclude from aggregation and validity
    pub fn set_active(&self, active: bool) {
        self.managers.state.set_pair(PairState::Active, active);
    }

    /// Show or hide for UI bindings
    pub fn set_visible(&self, visible: bool) {
        self.managers.state.set_pair(PairState::Visible, visible);
    }

    /// Allow or forbid edits
    pub fn set_editable(&self, editable: bool) {
        self.managers.state.set_pair(PairState::Editable, editable);
    }

    /// Complement of [`set_editable`](Self::set_editable)
    pub fn set_read_only(&self, read_only: bool) {
        self.set_editable(!read_only);
    }

    /// Focus state (element bindings feed this)
    pub fn set_focus(&self, focus: bool) {
        self.managers.state.set_focus(focus);
    }

    /// Whether error display policies should reveal errors now
    #[must_use]
    pub fn should_show_error(&self) -> bool {
        self.managers.state.should_show_error()
    }

    /// Override error display manually, disabling automatic computation
    pub fn set_should_show_error(&self, value: bool) {
        self.managers.state.set_should_show_error(value);
    }

    pub(crate) fn run_state_change_hooks(&self) {
        if !self.is_initialized() {
            return;
        }
        let this = self.this();
        let hooks = self.field().hooks;
        if let Some(hook) = hooks.on_state_changes {
            hook(&this);
        }
        if let Some(hook) = hooks.on_changes {
            hook(&this);
        }
    }

    // ---- registries ----

    /// Resolvers visible to this control (context ⊕ ancestors ⊕ own)
    #[must_use]
    pub fn effective_resolvers(&self) -> ResolverRegistry {
        let mut layers: Vec<ResolverRegistry> = vec![self.context.resolvers()];
        let mut chain: Vec<ResolverRegistry> = Vec::new();
        let mut node = Some(self.this());
        while let Some(current) = node {
            chain.push(current.field().resolvers.clone());
            node = current.parent();
        }
        chain.reverse();
        layers.extend(chain);
        Registry::layered(layers.iter())
    }

    /// Validators visible to this control (context ⊕ ancestors ⊕ own)
    #[must_use]
    pub fn effective_validators(&self) -> ValidatorRegistry {
        let mut layers: Vec<ValidatorRegistry> = vec![self.context.validators()];
        let mut chain: Vec<ValidatorRegistry> = Vec::new();
        let mut node = Some(self.this());
        while let Some(current) = node {
            chain.push(current.field().validators.clone());
            node = current.parent();
        }
        chain.reverse();
        layers.extend(chain);
        Registry::layered(layers.iter())
    }

    // ---- child controls ----

    /// Snapshot of the child control list
    #[must_use]
    pub fn controls(&self) -> Vec<Arc<Control>> {
        self.managers.controls.children()
    }

    /// Child list change stream (revision counter)
    #[must_use]
    pub fn controls_changes(&self) -> watch::Receiver<u64> {
        self.managers.controls.changed_stream()
    }

    /// Look up a control
    ///
    /// Accepts a child index (negative counts from the end), `"."` (root),
    /// `".."` (parent), a dot-delimited path, or a direct name/key/uid.
    /// Returns `None` on a miss, never errors.
    #[must_use]
    pub fn get_control<'a>(&self, lookup: impl Into<Lookup<'a>>) -> Option<Arc<Control>> {
        self.managers.controls.get(lookup.into())
    }

    /// Add a child control
    ///
    /// For non-array groups an existing same-named child is updated in place
    /// (identity and state preserved) instead of being replaced.
    ///
    /// # Errors
    /// Construction errors from the child build.
    pub fn add_control(&self, field: Field) -> Result<Arc<Control>, FieldError> {
        self.managers.controls.add_control(field)
    }

    /// Append one repeating child built from a template
    ///
    /// With no template given the sole declared template is used.
    ///
    /// # Errors
    /// [`FieldError::NotArrayGrouped`] on non-array controls,
    /// [`FieldError::UnknownTemplate`] when the selector does not resolve.
    pub fn append_repeating_control(
        &self,
        template: Option<TemplateRef>,
    ) -> Result<Arc<Control>, FieldError> {
        self.managers.controls.append_repeating(template)
    }

    /// Remove a child located by index/name/key/uid
    ///
    /// Returns `false` on a lookup miss.
    pub fn remove_control<'a>(&self, lookup: impl Into<Lookup<'a>>) -> bool {
        self.managers.controls.remove(lookup.into())
    }

    /// Move a child to a new index, re-syncing the value
    pub fn move_control<'a>(&self, lookup: impl Into<Lookup<'a>>, to_index: usize) -> bool {
        self.managers.controls.move_to(lookup.into(), to_index)
    }

    /// Remove this control from its parent
    ///
    /// Returns `false` for root controls.
    pub fn remove(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let uid = self.uid.clone();
        parent
            .managers
            .controls
            .remove(Lookup::Query(uid.as_str()))
    }

    // ---- validation & submission ----

    /// Validate this control and every descendant
    ///
    /// Children validate first (in parallel), then the own pass runs to
    /// completion, async validators included. `set_as_touched` marks the
    /// control touched afterwards. Returns the resulting overall validity.
    pub async fn validate(&self, set_as_touched: bool) -> bool {
        crate::managers::StateManager::validate(self.this(), set_as_touched).await
    }

    /// Run one submit attempt
    ///
    /// Handler failures are reflected in `state.submit_result`, not raised;
    /// the returned error covers only the guard conditions.
    ///
    /// # Errors
    /// [`SubmitError::AlreadySubmitting`], [`SubmitError::NoHandler`].
    pub async fn submit(&self) -> Result<SubmitResult, SubmitError> {
        self.managers.events.submit().await
    }

    // ---- reset ----

    /// Reset value and state back to initial
    ///
    /// # Errors
    /// Construction errors from value reconciliation.
    pub fn reset(&self) -> Result<(), FieldError> {
        self.reset_value()?;
        self.reset_state();
        Ok(())
    }

    /// Reset the value to the field's declared initial/default
    ///
    /// # Errors
    /// Construction errors from value reconciliation.
    pub fn reset_value(&self) -> Result<(), FieldError> {
        self.managers.value.reset()
    }

    /// Reset state back to construction defaults
    pub fn reset_state(&self) {
        self.managers.state.reset();
    }

    // ---- element binding ----

    /// Bind an element-like handle to this control
    ///
    /// Validation hints merge into the field, value and disabled/read-only
    /// state reflect onto the element, and element events feed back into
    /// control state until the element detaches.
    pub fn bind_element(&self, binding: Arc<dyn ElementBinding>) {
        let hints = binding.validation_hints();
        if !hints.is_empty() {
            let merged = self.update_field(|field| {
                for (name, param) in &hints {
                    field
                        .validation
                        .entry(name.clone())
                        .or_insert_with(|| param.clone());
                }
            });
            if let Err(error) = merged {
                tracing::warn!(%error, "element validation hints could not be applied");
            }
        }

        binding.write_value(self.value().as_ref());
        let state = self.state();
        binding.set_disabled(state.disabled());
        binding.set_read_only(state.read_only());

        let weak = self.this.clone();
        let mut events = binding.events();
        let mut state_rx = self.state_changes();
        let mut value_rx = self.value_changes();
        self.tasks.spawn(async move {
            loop {
                tokio::select! {
                    event = events.next() => {
                        let Some(control) = weak.upgrade() else { break; };
                        match event {
                            None | Some(ElementEvent::Detached) => break,
                            Some(ElementEvent::Input(value)) => {
                                if let Err(error) = control.set_value(value) {
                                    tracing::warn!(%error, "element input could not be applied");
                                }
                            }
                            Some(ElementEvent::Focus) => control.set_focus(true),
                            Some(ElementEvent::Blur) => {
                                control.set_focus(false);
                                control.set_touched(true);
                            }
                            Some(ElementEvent::Submit) => {
                                if let Err(error) = control.submit().await {
                                    tracing::warn!(%error, "element-initiated submit refused");
                                }
                            }
                            Some(ElementEvent::Reset) => {
                                if let Err(error) = control.reset() {
                                    tracing::warn!(%error, "element-initiated reset failed");
                                }
                            }
                        }
                    }
                    changed = state_rx.changed() => {
                        if changed.is_err() { break; }
                        let Some(control) = weak.upgrade() else { break; };
                        let state = control.state();
                        binding.set_disabled(state.disabled());
                        binding.set_read_only(state.read_only());
                    }
                    changed = value_rx.changed() => {
                        if changed.is_err() { break; }
                        let Some(control) = weak.upgrade() else { break; };
                        binding.write_value(control.value().as_ref());
                    }
                }
            }
        });
    }

    // ---- teardown ----

    /// Release every owned resource, descendants first
    ///
    /// Safe to call more than once; also invoked when the control is removed
    /// from its parent.
    pub fn cleanup(&self) {
        self.tasks.abort_all();
        for manager in self.managers.ordered().iter().rev() {
            manager.cleanup();
        }
        self.context.uid_pool().release(&self.uid);
    }
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("name", &self.name())
            .field("key", &self.key().short())
            .field("uid", &self.uid)
            .field("children", &self.managers.controls.len())
            .finish_non_exhaustive()
    }
}

fn name_matches_case(name: &str, case: NameCase) -> bool {
    match case {
        NameCase::Kebab => !name.contains('_') && name.chars().all(|c| !c.is_ascii_uppercase()),
        NameCase::Snake => !name.contains('-') && name.chars().all(|c| !c.is_ascii_uppercase()),
        NameCase::Camel => !name.contains(['-', '_']),
    }
}
