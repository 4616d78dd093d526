//! The manager set
//!
//! A control is a composition of seven managers, each owning one concern.
//! They are instantiated together and driven through a fixed lifecycle in a
//! fixed dependency order: field, config, params, controls, value, state,
//! events. Within one phase, earlier managers finish before later ones start,
//! which is what guarantees structural rebuild completes before the value
//! aggregation that depends on the new child set.
//!
//! Managers hold only a `Weak` back-reference to their control; the control
//! tree's parent→child direction is the sole ownership direction.

mod config;
mod controls;
mod events;
mod field;
mod params;
mod state;
mod value;

pub use controls::{Lookup, TemplateRef};

pub(crate) use config::ConfigManager;
pub(crate) use controls::ControlsManager;
pub(crate) use events::EventsManager;
pub(crate) use field::FieldManager;
pub(crate) use params::ParamsManager;
pub(crate) use state::StateManager;
pub(crate) use value::ValueManager;

use crate::control::Control;
use crate::error::FieldError;
use crate::field::Field;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Weak;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Lifecycle every manager conforms to
///
/// `prepare` runs for all managers before any `on_initialize`; construction
/// fails on the first error. `cleanup` releases external resources and must
/// be safe to call more than once.
pub(crate) trait ManagerLifecycle {
    fn prepare(&self) -> Result<(), FieldError> {
        Ok(())
    }

    fn on_initialize(&self) -> Result<(), FieldError> {
        Ok(())
    }

    fn after_initialize(&self) {}

    fn cleanup(&self) {}
}

/// The fixed-name manager set of one control
pub(crate) struct Managers {
    pub(crate) field: FieldManager,
    pub(crate) config: ConfigManager,
    pub(crate) params: ParamsManager,
    pub(crate) controls: ControlsManager,
    pub(crate) value: ValueManager,
    pub(crate) state: StateManager,
    pub(crate) events: EventsManager,
}

impl Managers {
    pub(crate) fn new(control: Weak<Control>, field: Field) -> Self {
        Self {
            field: FieldManager::new(control.clone(), field),
            config: ConfigManager::new(control.clone()),
            params: ParamsManager::new(control.clone()),
            controls: ControlsManager::new(control.clone()),
            value: ValueManager::new(control.clone()),
            state: StateManager::new(control.clone()),
            events: EventsManager::new(control),
        }
    }

    /// Managers in lifecycle order
    pub(crate) fn ordered(&self) -> [&dyn ManagerLifecycle; 7] {
        [
            &self.field,
            &self.config,
            &self.params,
            &self.controls,
            &self.value,
            &self.state,
            &self.events,
        ]
    }
}

/// Background tasks owned by a manager
///
/// Tasks hold only `Weak` control references; aborting them on cleanup is
/// what discards late resolver/adapter results instead of applying them to a
/// dead control.
#[derive(Debug, Default)]
pub(crate) struct TaskBag {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskBag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Spawn onto the current runtime; `false` when none is available
    pub(crate) fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        self.handles.lock().push(handle.spawn(future));
        true
    }

    pub(crate) fn abort_all(&self) {
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}
