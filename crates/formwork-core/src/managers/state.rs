//! State manager: validity and interaction state
//!
//! Boolean pairs share one underlying value; setting either member flips the
//! other. Validation runs debounced on value changes and re-runs when any
//! child's state changes; a parent is valid only when its own validators pass
//! and every *active* child is valid — inactive subtrees never block.

use super::{ManagerLifecycle, TaskBag};
use crate::control::Control;
use crate::debounce::Debouncer;
use crate::error::FieldError;
use crate::state::{override_target, ControlState, PairState, PathErrors};
use formwork_resolver::{
    resolve_exprs, resolve_map, MapResolution, ResolveContext, ResolveOptions, SlotMap, SlotOutput,
    ValidatorOutcome,
};
use formwork_value::{value_exists, Value};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;

const VALIDATION_DEBOUNCE: Duration = Duration::from_millis(10);

/// Owns a control's state snapshot and the validation pass
pub(crate) struct StateManager {
    control: Weak<Control>,
    state: RwLock<ControlState>,
    changes: watch::Sender<ControlState>,
    validation: Debouncer,
    tasks: TaskBag,
    show_error_override: RwLock<Option<bool>>,
    override_warned: AtomicBool,
}

impl StateManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        let (changes, _) = watch::channel(ControlState::default());
        Self {
            control,
            state: RwLock::new(ControlState::default()),
            changes,
            validation: Debouncer::new(),
            tasks: TaskBag::new(),
            show_error_override: RwLock::new(None),
            override_warned: AtomicBool::new(false),
        }
    }

    /// Current state snapshot
    pub(crate) fn snapshot(&self) -> ControlState {
        self.state.read().clone()
    }

    /// Change stream
    pub(crate) fn changes_stream(&self) -> watch::Receiver<ControlState> {
        self.changes.subscribe()
    }

    fn notify(&self, control: &Arc<Control>) {
        self.changes.send_replace(self.snapshot());
        if control.is_initialized() {
            control.run_state_change_hooks();
        }
    }

    /// Mutate plain state and notify on change
    pub(crate) fn update(&self, mutate: impl FnOnce(&mut ControlState)) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let changed = {
            let mut state = self.state.write();
            let before = state.clone();
            mutate(&mut state);
            *state != before
        };
        if changed {
            self.notify(&control);
        }
    }

    /// Set the canonical member of a boolean pair
    ///
    /// Side effects: enabled cascades down, dirty propagates up, an active
    /// flip makes the parent re-aggregate and revalidate.
    pub(crate) fn set_pair(&self, pair: PairState, value: bool) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let changed = {
            let mut state = self.state.write();
            let slot = match pair {
                PairState::Dirty => &mut state.dirty,
                PairState::Touched => &mut state.touched,
                PairState::Enabled => &mut state.enabled,
                PairState::Editable => &mut state.editable,
                PairState::Active => &mut state.active,
                PairState::Visible => &mut state.visible,
            };
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        };
        if !changed {
            return;
        }
        self.notify(&control);

        match pair {
            PairState::Enabled => {
                for child in control.managers.controls.children() {
                    child.managers.state.set_pair(PairState::Enabled, value);
                }
            }
            PairState::Dirty if value => {
                if let Some(parent) = control.parent() {
                    parent.managers.state.set_pair(PairState::Dirty, true);
                }
            }
            PairState::Active => {
                // Inactive children drop out of the parent's aggregate and
                // stop blocking its validity.
                if let Some(parent) = control.parent() {
                    parent.managers.value.resync_upward();
                    parent.managers.state.schedule_validation();
                }
            }
            _ => {}
        }
    }

    /// Set focus state
    pub(crate) fn set_focus(&self, focus: bool) {
        self.update(|state| state.focus = focus);
    }

    // ---- user-overridable state expressions ----

    /// Re-resolve the field's state-override expressions
    pub(crate) fn refresh_overrides(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let field = control.field();
        if field.state_overrides.is_empty() {
            return;
        }
        let registry = control.effective_resolvers();
        let ctx = ResolveContext::new()
            .with_value(control.value())
            .with_params(control.params());
        let options =
            ResolveOptions::new().with_grace_period(control.config().async_function_warning_timeout);

        match resolve_exprs(&field.state_overrides, &registry, &ctx, &options) {
            MapResolution::Ready(map) => self.apply_overrides(map),
            MapResolution::Pending(mut stream) => {
                let weak = self.control.clone();
                self.tasks.spawn(async move {
                    while let Some(map) = stream.next().await {
                        let Some(control) = weak.upgrade() else {
                            break;
                        };
                        control.managers.state.apply_overrides(map);
                    }
                });
            }
        }
    }

    fn apply_overrides(&self, map: SlotMap) {
        for (key, value) in map {
            match override_target(&key) {
                Some((pair, direct)) => {
                    let truthy = value
                        .as_bool()
                        .unwrap_or_else(|| value_exists(Some(&value), false));
                    self.set_pair(pair, if direct { truthy } else { !truthy });
                }
                None => tracing::warn!(key = %key, "unknown state override key"),
            }
        }
    }

    // ---- validation ----

    /// Queue a debounced validation pass
    pub(crate) fn schedule_validation(&self) {
        let weak = self.control.clone();
        let scheduled = self.validation.schedule(VALIDATION_DEBOUNCE, move || async move {
            if let Some(control) = weak.upgrade() {
                StateManager::run_validation(&control).await;
            }
        });
        if !scheduled {
            // No runtime: synchronous best effort for sync-only validators.
            if let Some(control) = self.control.upgrade() {
                Self::run_validation_blocking(&control);
            }
        }
    }

    /// Run one validation pass to completion
    pub(crate) async fn run_validation(control: &Arc<Control>) {
        control
            .managers
            .state
            .update(|state| state.validating = true);
        let slots = Self::validation_slots(control);
        let options =
            ResolveOptions::new().with_grace_period(control.config().async_function_warning_timeout);
        let results = resolve_map(slots, &options).finish().await;
        Self::apply_validation_results(control, results);
    }

    fn run_validation_blocking(control: &Arc<Control>) {
        let slots = Self::validation_slots(control);
        match resolve_map(slots, &ResolveOptions::new()) {
            MapResolution::Ready(results) => Self::apply_validation_results(control, results),
            MapResolution::Pending(_) => {
                tracing::debug!(
                    path = %control.path(),
                    "async validators require a tokio runtime; pass skipped"
                );
            }
        }
    }

    fn validation_slots(control: &Arc<Control>) -> Vec<(String, SlotOutput)> {
        let field = control.field();
        let registry = control.effective_validators();
        let base = ResolveContext::new()
            .with_value(control.value())
            .with_params(control.params());

        let mut slots = Vec::new();
        for (name, param) in &field.validation {
            match registry.get(name) {
                Some(validator) => {
                    let ctx = base
                        .clone()
                        .with_reference(Some(param.clone()), error_message_from(param));
                    slots.push((name.clone(), validator(&ctx)));
                }
                None => {
                    tracing::warn!(validator = %name, "validator not registered; entry skipped");
                }
            }
        }
        slots
    }

    fn apply_validation_results(control: &Arc<Control>, results: SlotMap) {
        let mut errors: IndexMap<String, String> = IndexMap::new();
        for (name, value) in &results {
            let outcome = ValidatorOutcome::from_value(value);
            if !outcome.valid {
                let message = outcome
                    .error
                    .unwrap_or_else(|| "Invalid value".to_string());
                errors.insert(name.clone(), message);
            }
        }
        let own_valid = errors.is_empty();
        let children_valid = control
            .managers
            .controls
            .children()
            .iter()
            .all(|child| {
                let state = child.state();
                !state.active || state.valid
            });
        let valid = own_valid && children_valid;
        let all_errors = Self::collect_all_errors(control, &errors);

        control.managers.state.update(|state| {
            state.valid = valid;
            state.errors = errors.clone();
            state.all_errors = all_errors.clone();
            state.validating = false;
            state.validated = true;
        });

        // A child's result feeds its parent's validity.
        if let Some(parent) = control.parent() {
            parent.managers.state.schedule_validation();
        }
    }

    fn collect_all_errors(
        control: &Arc<Control>,
        own_errors: &IndexMap<String, String>,
    ) -> Vec<PathErrors> {
        let mut all = Vec::new();
        if !own_errors.is_empty() {
            all.push(PathErrors {
                path: control.path().to_string(),
                errors: own_errors.clone(),
            });
        }
        for child in control.managers.controls.children() {
            let state = child.state();
            if state.active {
                all.extend(state.all_errors);
            }
        }
        all
    }

    /// Recursively validate children, re-sync, then finish an own pass
    ///
    /// `set_as_touched` marks the control touched afterwards so error display
    /// policies gated on interaction reveal errors right after an explicit
    /// validate call.
    pub(crate) fn validate(control: Arc<Control>, set_as_touched: bool) -> BoxFuture<'static, bool> {
        async move {
            let children = control.managers.controls.children();
            let passes = children
                .into_iter()
                .map(|child| StateManager::validate(child, false));
            futures::future::join_all(passes).await;

            control.managers.value.resync_upward();
            StateManager::run_validation(&control).await;

            if set_as_touched {
                control.managers.state.set_pair(PairState::Touched, true);
            }
            control.state().valid
        }
        .boxed()
    }

    // ---- derived error display ----

    /// Derived error-display policy
    pub(crate) fn should_show_error(&self) -> bool {
        if let Some(overridden) = *self.show_error_override.read() {
            return overridden;
        }
        let state = self.state.read();
        state.validated && !state.valid && (state.touched || (state.dirty && !state.focus))
    }

    /// Manually override error display, disabling automatic computation
    pub(crate) fn set_should_show_error(&self, value: bool) {
        if !self.override_warned.swap(true, Ordering::SeqCst) {
            tracing::warn!("should_show_error set manually; automatic computation is disabled");
        }
        *self.show_error_override.write() = Some(value);
    }

    /// Reset state back to construction defaults
    pub(crate) fn reset(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        *self.state.write() = ControlState::default();
        *self.show_error_override.write() = None;
        self.notify(&control);
        self.refresh_overrides();
        self.schedule_validation();
    }
}

fn error_message_from(param: &Value) -> Option<String> {
    param
        .as_object()?
        .get("errorMessage")?
        .as_str()
        .map(str::to_string)
}

impl ManagerLifecycle for StateManager {
    fn on_initialize(&self) -> Result<(), FieldError> {
        self.refresh_overrides();
        Ok(())
    }

    fn after_initialize(&self) {
        self.schedule_validation();
    }

    fn cleanup(&self) {
        self.validation.cancel();
        self.tasks.abort_all();
    }
}
