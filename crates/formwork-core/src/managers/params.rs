//! Params manager: resolver-backed field parameters

use super::{ManagerLifecycle, TaskBag};
use crate::control::Control;
use crate::error::FieldError;
use formwork_resolver::{resolve_exprs, MapResolution, ResolveContext, ResolveOptions, SlotMap};
use formwork_value::{Map, Value};
use futures::StreamExt;
use parking_lot::RwLock;
use std::sync::Weak;

/// Resolves the field's `params` mapping into the control's params snapshot
///
/// Re-runs on every field change. Synchronous mappings apply immediately;
/// asynchronous ones apply from a background task that re-publishes the
/// snapshot on every combined emission. State-override expressions and
/// validators read the snapshot through the resolve context.
pub(crate) struct ParamsManager {
    control: Weak<Control>,
    snapshot: RwLock<Option<Value>>,
    tasks: TaskBag,
}

impl ParamsManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        Self {
            control,
            snapshot: RwLock::new(None),
            tasks: TaskBag::new(),
        }
    }

    /// Current params snapshot
    pub(crate) fn current(&self) -> Option<Value> {
        self.snapshot.read().clone()
    }

    /// Re-resolve the field's params
    pub(crate) fn refresh(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let field = control.field();
        if field.params.is_empty() {
            *self.snapshot.write() = None;
            return;
        }

        let registry = control.effective_resolvers();
        let ctx = ResolveContext::new()
            .with_value(control.value())
            .with_params(self.current());
        let options =
            ResolveOptions::new().with_grace_period(control.config().async_function_warning_timeout);

        match resolve_exprs(&field.params, &registry, &ctx, &options) {
            MapResolution::Ready(map) => self.apply(map),
            MapResolution::Pending(mut stream) => {
                let weak = self.control.clone();
                let spawned = self.tasks.spawn(async move {
                    while let Some(map) = stream.next().await {
                        let Some(control) = weak.upgrade() else {
                            break;
                        };
                        control.managers.params.apply(map);
                    }
                });
                if !spawned {
                    tracing::warn!(
                        "async params require a tokio runtime; snapshot left unresolved"
                    );
                }
            }
        }
    }

    fn apply(&self, map: SlotMap) {
        let object: Map = map.into_iter().collect();
        *self.snapshot.write() = Some(Value::Object(object));
        if let Some(control) = self.control.upgrade() {
            // Params feed validators and state expressions.
            control.managers.state.schedule_validation();
        }
    }
}

impl ManagerLifecycle for ParamsManager {
    fn on_initialize(&self) -> Result<(), FieldError> {
        self.refresh();
        Ok(())
    }

    fn cleanup(&self) {
        self.tasks.abort_all();
    }
}
