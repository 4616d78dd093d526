//! Value manager: the synchronization engine
//!
//! A control's value moves in two directions. Upstream, the value is
//! recomputed from active children (aggregation). Downstream, an assigned
//! value determines child structure (reconciliation): array entries create
//! and remove repeating children, object keys find-or-create named children.
//! Both directions meet here without ping-pong: child pushes never hold
//! locks, and upward propagation is a one-step chain that re-aggregates each
//! ancestor exactly once.

use super::{ManagerLifecycle, TaskBag};
use crate::config::{Config, StorageKeySource, StorageStrategy};
use crate::control::Control;
use crate::debounce::Debouncer;
use crate::error::FieldError;
use crate::external::{parse_stored, serialize_for_storage, SyncMessage};
use crate::field::{Field, Grouping};
use crate::managers::controls::Lookup;
use formwork_value::{
    child_slice, entry_name, inject_metadata, is_meta_key, value_exists, Map, Value, META_UID,
};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

const STORAGE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Owns a control's current value and both synchronization directions
pub(crate) struct ValueManager {
    control: Weak<Control>,
    value: RwLock<Option<Value>>,
    changes: watch::Sender<Option<Value>>,
    persist: Debouncer,
    tasks: TaskBag,
}

impl ValueManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        let (changes, _) = watch::channel(None);
        Self {
            control,
            value: RwLock::new(None),
            changes,
            persist: Debouncer::new(),
            tasks: TaskBag::new(),
        }
    }

    /// Current value snapshot
    pub(crate) fn current(&self) -> Option<Value> {
        self.value.read().clone()
    }

    /// Change stream
    pub(crate) fn changes_stream(&self) -> watch::Receiver<Option<Value>> {
        self.changes.subscribe()
    }

    /// Assign a value, reconciling children and propagating one step up
    pub(crate) fn apply_incoming(
        &self,
        incoming: Option<Value>,
        patch: bool,
        update_parent: bool,
    ) -> Result<(), FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Ok(());
        };
        if control.has_child_structure() {
            self.reconcile_children(&control, incoming.as_ref(), patch)?;
            let aggregate = self.aggregate(&control);
            self.store(&control, aggregate, false);
        } else {
            self.store(&control, incoming, false);
        }
        if update_parent {
            if let Some(parent) = control.parent() {
                parent.managers.value.resync_upward();
            }
        }
        Ok(())
    }

    /// Re-aggregate this control and continue the chain to the root
    ///
    /// The one-step bottom-up pass used for ordinary value changes: each
    /// ancestor recomputes its own aggregate once, without touching
    /// unrelated sibling subtrees.
    pub(crate) fn resync_upward(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        if control.has_child_structure() {
            let aggregate = self.aggregate(&control);
            self.store(&control, aggregate, false);
        }
        if let Some(parent) = control.parent() {
            parent.managers.value.resync_upward();
        }
    }

    /// Full top-down-then-bottom-up pass after structural changes
    ///
    /// Pushes an already-present array value into freshly built children,
    /// refreshes every descendant, and only then recomputes the own
    /// aggregate from their final values.
    pub(crate) fn refresh_sync(&self, notify_parent: bool) -> Result<(), FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Ok(());
        };
        if control.grouping() == Grouping::Array {
            let stored = self.current();
            if matches!(stored, Some(Value::Array(_))) {
                self.reconcile_children(&control, stored.as_ref(), false)?;
            }
        }
        for child in control.managers.controls.children() {
            child.managers.value.refresh_sync(false)?;
        }
        if control.has_child_structure() {
            let aggregate = self.aggregate(&control);
            self.store(&control, aggregate, false);
        }
        if notify_parent {
            if let Some(parent) = control.parent() {
                parent.managers.value.resync_upward();
            }
        }
        Ok(())
    }

    /// Reset to the field's declared initial/default value
    pub(crate) fn reset(&self) -> Result<(), FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Ok(());
        };
        let field = control.field();
        let seed = field
            .initial_value
            .clone()
            .or_else(|| field.default_value.clone());
        self.apply_incoming(seed, false, true)
    }

    // ---- aggregation (children → self) ----

    /// Compute the own value from active children
    ///
    /// Inactive children are excluded entirely, not zeroed. Zero active
    /// children aggregate to `None` so a fully hidden group reads as absent,
    /// not empty.
    pub(crate) fn aggregate(&self, control: &Arc<Control>) -> Option<Value> {
        let config = control.config();
        let children = control.managers.controls.children();
        if children.is_empty() && control.field().fields.is_none() {
            return self.current();
        }
        let active: Vec<Arc<Control>> = children
            .into_iter()
            .filter(|child| child.state().active)
            .collect();
        if active.is_empty() {
            return None;
        }

        match control.grouping() {
            Grouping::Array => {
                let mut items = Vec::new();
                for child in &active {
                    let value = child.managers.value.current();
                    if value_exists(value.as_ref(), config.allow_empty_string) {
                        if let Some(value) = value {
                            items.push(value);
                        }
                    } else if config.transform_undefined_to_null {
                        items.push(Value::Null);
                    }
                }
                Some(Value::Array(items))
            }
            Grouping::Group | Grouping::Flat => {
                let mut map = Map::new();
                for child in &active {
                    let value = child.managers.value.current();
                    let exists = value_exists(value.as_ref(), config.allow_empty_string);
                    match value {
                        Some(value) if exists => {
                            if child.grouping() == Grouping::Flat {
                                // Flat children splice their entries in
                                // without nesting under the child's name.
                                if let Value::Object(entries) = value {
                                    for (key, entry) in entries {
                                        map.insert(key, entry);
                                    }
                                } else {
                                    map.insert(child.name(), value);
                                }
                            } else {
                                map.insert(child.name(), value);
                            }
                        }
                        _ if config.transform_undefined_to_null => {
                            map.insert(child.name(), Value::Null);
                        }
                        _ => {}
                    }
                }
                let map = if config.add_metadata {
                    let mut base = map;
                    let previous_uid = self
                        .current()
                        .as_ref()
                        .and_then(Value::as_object)
                        .and_then(|object| object.get(META_UID))
                        .cloned();
                    if let Some(uid) = previous_uid {
                        base.insert(META_UID.to_string(), uid);
                    }
                    inject_metadata(base, &control.key().short(), &control.name())
                } else {
                    map
                };
                Some(Value::Object(map))
            }
        }
    }

    // ---- reconciliation (self → children) ----

    fn reconcile_children(
        &self,
        control: &Arc<Control>,
        incoming: Option<&Value>,
        patch: bool,
    ) -> Result<(), FieldError> {
        let config = control.config();
        let field = control.field();
        let controls = &control.managers.controls;

        if !value_exists(incoming, config.allow_empty_string) {
            if patch {
                return Ok(());
            }
            match control.grouping() {
                // Repeating children only exist while the value says so.
                Grouping::Array => controls.remove_all(),
                // Structurally declared fields survive a clear.
                Grouping::Group | Grouping::Flat => {
                    for child in controls.children() {
                        child.managers.value.apply_incoming(None, false, false)?;
                    }
                }
            }
            return Ok(());
        }

        match incoming {
            Some(Value::Array(entries)) if control.grouping() == Grouping::Array => {
                self.reconcile_array(control, &field, entries, patch)
            }
            Some(Value::Object(entries)) => self.reconcile_object(control, &field, entries, patch),
            Some(_) => {
                tracing::warn!(
                    path = %control.path(),
                    "scalar value assigned to a structured control; children cleared"
                );
                for child in controls.children() {
                    child.managers.value.apply_incoming(None, false, false)?;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn reconcile_array(
        &self,
        control: &Arc<Control>,
        field: &Field,
        entries: &[Value],
        patch: bool,
    ) -> Result<(), FieldError> {
        let controls = &control.managers.controls;
        if field.templates().is_empty() {
            return Err(FieldError::NoTemplate {
                path: control.path().to_string(),
            });
        }
        if !patch {
            controls.truncate(entries.len());
        }
        for (index, entry) in entries.iter().enumerate() {
            match controls.get(Lookup::Index(index as isize)) {
                Some(child) => {
                    child
                        .managers
                        .value
                        .apply_incoming(Some(entry.clone()), patch, false)?;
                }
                None => {
                    let template = self.template_for_entry(control, field, entry)?;
                    let mut child_field = template.clone();
                    child_field.initial_value = Some(entry.clone());
                    controls.construct_and_push(child_field)?;
                }
            }
        }
        Ok(())
    }

    fn reconcile_object(
        &self,
        control: &Arc<Control>,
        field: &Field,
        entries: &Map,
        patch: bool,
    ) -> Result<(), FieldError> {
        let controls = &control.managers.controls;
        for (key, entry_value) in entries {
            if is_meta_key(key) {
                continue;
            }
            if let Some(child) = controls.find_by_name(key) {
                child
                    .managers
                    .value
                    .apply_incoming(Some(entry_value.clone()), patch, false)?;
            } else if let Some(template) = field.template_named(key) {
                let mut child_field = template.clone();
                child_field.initial_value = Some(entry_value.clone());
                controls.construct_and_push(child_field)?;
            } else if let Some(flat) = self.flat_child_owning(control, key) {
                // Keys may target a flattened grandchild instead.
                let mut delta = Map::new();
                delta.insert(key.clone(), entry_value.clone());
                flat.managers
                    .value
                    .apply_incoming(Some(Value::Object(delta)), true, false)?;
            } else {
                tracing::debug!(key = %key, path = %control.path(), "no child accepts incoming key");
            }
        }
        if !patch {
            // Replace semantics: keys absent from the assignment clear their
            // children. Patch keeps them.
            for child in controls.children() {
                let covered =
                    entries.contains_key(&child.name()) || child.grouping() == Grouping::Flat;
                if !covered {
                    child.managers.value.apply_incoming(None, false, false)?;
                }
            }
        }
        Ok(())
    }

    fn template_for_entry<'f>(
        &self,
        control: &Arc<Control>,
        field: &'f Field,
        entry: &Value,
    ) -> Result<&'f Field, FieldError> {
        let templates = field.templates();
        match entry_name(entry) {
            Some(name) => match field.template_named(name) {
                Some(template) => Ok(template),
                None if control.config().allow_unresolved_array_child_names => {
                    tracing::warn!(
                        name = %name,
                        path = %control.path(),
                        "unknown entry name; falling back to the first template"
                    );
                    Ok(&templates[0])
                }
                None => Err(FieldError::UnknownTemplate {
                    path: control.path().to_string(),
                    requested: name.to_string(),
                }),
            },
            None => Ok(&templates[0]),
        }
    }

    fn flat_child_owning(&self, control: &Arc<Control>, key: &str) -> Option<Arc<Control>> {
        control
            .managers
            .controls
            .children()
            .into_iter()
            .find(|child| {
                child.grouping() == Grouping::Flat
                    && (child.managers.controls.find_by_name(key).is_some()
                        || child.field().template_named(key).is_some())
            })
    }

    // ---- storing ----

    /// Store a computed/assigned value and run the change side effects
    fn store(&self, control: &Arc<Control>, value: Option<Value>, initial: bool) {
        let field = control.field();
        let config = control.config();
        let transformed = match &field.transformer {
            Some(transformer) if !initial || config.run_transformers_for_initial_values => {
                value.map(|v| transformer(v))
            }
            _ => value,
        };

        let changed = {
            let mut current = self.value.write();
            if *current == transformed {
                false
            } else {
                *current = transformed.clone();
                true
            }
        };
        if initial {
            self.changes.send_replace(transformed);
            return;
        }
        if !changed {
            return;
        }
        self.changes.send_replace(transformed.clone());
        control.managers.state.schedule_validation();
        self.persist_later(control);
        self.post_sync(control, &field, transformed);
        control.run_value_change_hooks();
    }

    // ---- initial value resolution ----

    fn seed_initial(&self, control: &Arc<Control>) {
        let field = control.field();
        let config = control.config();
        let seed = self
            .inherited_value(control)
            .or_else(|| field.initial_value.clone())
            .or_else(|| self.read_storage(control, &config))
            .or_else(|| self.read_search_params(control, &config))
            .or_else(|| field.default_value.clone());
        self.store(control, seed, true);
    }

    /// Value inherited from the parent's already-set value at this slot
    fn inherited_value(&self, control: &Arc<Control>) -> Option<Value> {
        let parent = control.parent()?;
        let parent_value = parent.managers.value.current()?;
        if control.grouping() == Grouping::Flat {
            // Flat children read their keys straight off the parent object.
            return Some(parent_value);
        }
        let segment = control.slot_segment()?;
        child_slice(&parent_value, &segment).cloned()
    }

    fn read_storage(&self, control: &Arc<Control>, config: &Config) -> Option<Value> {
        if !control.field().use_storage {
            return None;
        }
        if config.storage_strategy == StorageStrategy::Start && control.ancestor_uses_storage() {
            // The nearest enabled ancestor reads and distributes.
            return None;
        }
        let storage = control.context().storage()?;
        let key = self.storage_key(control, config);
        storage.get(&key).map(|raw| parse_stored(&raw))
    }

    fn read_search_params(&self, control: &Arc<Control>, config: &Config) -> Option<Value> {
        if !config.resolve_initial_values_from_search_params {
            return None;
        }
        control
            .context()
            .search_param(&control.name())
            .map(|raw| parse_stored(&raw))
    }

    // ---- collaborator hookups ----

    fn storage_key(&self, control: &Arc<Control>, config: &Config) -> String {
        match config.storage_key {
            StorageKeySource::Key => control.key().short(),
            StorageKeySource::Name => control.name(),
        }
    }

    fn persist_later(&self, control: &Arc<Control>) {
        if !control.field().use_storage || control.context().storage().is_none() {
            return;
        }
        let weak = self.control.clone();
        let scheduled = self.persist.schedule(STORAGE_DEBOUNCE, move || async move {
            if let Some(control) = weak.upgrade() {
                control.managers.value.persist_now(&control);
            }
        });
        if !scheduled {
            self.persist_now(control);
        }
    }

    fn persist_now(&self, control: &Arc<Control>) {
        let config = control.config();
        let Some(storage) = control.context().storage() else {
            return;
        };
        let key = self.storage_key(control, &config);
        match self.current() {
            Some(value) => storage.set(&key, serialize_for_storage(&value)),
            None => storage.remove(&key),
        }
    }

    /// Drop this control's and every descendant's persisted value
    pub(crate) fn clear_storage(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let config = control.config();
        if control.field().use_storage {
            if let Some(storage) = control.context().storage() {
                storage.remove(&self.storage_key(&control, &config));
            }
        }
        for child in control.managers.controls.children() {
            child.managers.value.clear_storage();
        }
    }

    fn post_sync(&self, control: &Arc<Control>, field: &Field, value: Option<Value>) {
        if !field.use_synchronization {
            return;
        }
        let Some(adapter) = control.context().sync_adapter() else {
            return;
        };
        adapter.post(SyncMessage::value(
            control.key().short(),
            control.uid().as_str(),
            value,
        ));
    }

    fn handle_sync_message(&self, message: SyncMessage) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        if message.uid == control.uid().as_str() || message.key != control.key().short() {
            return;
        }
        if message.request_send {
            if let Some(adapter) = control.context().sync_adapter() {
                adapter.post(SyncMessage::value(
                    message.key,
                    control.uid().as_str(),
                    self.current(),
                ));
            }
            return;
        }
        if message.value != self.current() {
            if let Err(error) = self.apply_incoming(message.value, false, true) {
                tracing::warn!(%error, "synchronized value could not be applied");
            }
        }
    }

    fn connect_adapters(&self, control: &Arc<Control>) {
        let field = control.field();
        if field.use_storage {
            if let Some(storage) = control.context().storage() {
                let key = self.storage_key(control, &control.config());
                let mut changes = storage.listen(&key);
                let weak = self.control.clone();
                self.tasks.spawn(async move {
                    while let Some(raw) = changes.next().await {
                        let Some(control) = weak.upgrade() else {
                            break;
                        };
                        let incoming = raw.map(|s| parse_stored(&s));
                        if incoming != control.managers.value.current() {
                            if let Err(error) =
                                control.managers.value.apply_incoming(incoming, false, true)
                            {
                                tracing::warn!(%error, "persisted value could not be applied");
                            }
                        }
                    }
                });
            }
        }
        if field.use_synchronization {
            if let Some(adapter) = control.context().sync_adapter() {
                let mut messages = adapter.listen();
                let weak = self.control.clone();
                self.tasks.spawn(async move {
                    while let Some(message) = messages.next().await {
                        let Some(control) = weak.upgrade() else {
                            break;
                        };
                        control.managers.value.handle_sync_message(message);
                    }
                });
                // Ask peers for their current value.
                adapter.post(SyncMessage::request(
                    control.key().short(),
                    control.uid().as_str(),
                ));
            }
        }
    }
}

impl ManagerLifecycle for ValueManager {
    fn prepare(&self) -> Result<(), FieldError> {
        if let Some(control) = self.control.upgrade() {
            self.seed_initial(&control);
        }
        Ok(())
    }

    fn on_initialize(&self) -> Result<(), FieldError> {
        let Some(control) = self.control.upgrade() else {
            return Ok(());
        };
        if control.has_child_structure() {
            let stored = self.current();
            if stored.is_some() {
                // Merge semantics: children that already seeded their own
                // initial/default values keep them when the parent's seed
                // does not cover their key.
                self.reconcile_children(&control, stored.as_ref(), true)?;
            }
            let aggregate = self.aggregate(&control);
            self.store(&control, aggregate, true);
        }
        self.connect_adapters(&control);
        Ok(())
    }

    fn cleanup(&self) {
        self.persist.cancel();
        self.tasks.abort_all();
    }
}
