//! Config manager: effective configuration per control

use super::ManagerLifecycle;
use crate::config::Config;
use crate::control::Control;
use crate::error::FieldError;
use parking_lot::RwLock;
use std::sync::Weak;

/// Computes a control's effective configuration
///
/// Effective = engine defaults ⊕ parent effective ⊕ own field overrides,
/// rightmost wins per key. Recomputed on every field change.
pub(crate) struct ConfigManager {
    control: Weak<Control>,
    effective: RwLock<Config>,
}

impl ConfigManager {
    pub(crate) fn new(control: Weak<Control>) -> Self {
        Self {
            control,
            effective: RwLock::new(Config::default()),
        }
    }

    /// Current effective configuration
    pub(crate) fn current(&self) -> Config {
        self.effective.read().clone()
    }

    /// Recompute from the inheritance chain
    pub(crate) fn refresh(&self) {
        let Some(control) = self.control.upgrade() else {
            return;
        };
        let base = match control.parent() {
            Some(parent) => parent.config(),
            None => control.context().default_config(),
        };
        let merged = base.merged(&control.field().config);
        *self.effective.write() = merged;
    }
}

impl ManagerLifecycle for ConfigManager {
    fn prepare(&self) -> Result<(), FieldError> {
        self.refresh();
        Ok(())
    }
}
