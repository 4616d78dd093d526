//! Field manager: owns the current descriptor

use super::ManagerLifecycle;
use crate::control::Control;
use crate::error::FieldError;
use crate::field::Field;
use parking_lot::RwLock;
use std::sync::Weak;
use tokio::sync::watch;

/// Owns a control's current field descriptor
///
/// `set_field` is the only mutation path: it no-ops on semantically equal
/// descriptors, otherwise stores the new one and drives the rest of the
/// manager set through the control's field-change pipeline.
pub(crate) struct FieldManager {
    control: Weak<Control>,
    field: RwLock<Field>,
    revision: watch::Sender<u64>,
}

impl FieldManager {
    pub(crate) fn new(control: Weak<Control>, field: Field) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            control,
            field: RwLock::new(field),
            revision,
        }
    }

    /// Snapshot of the current descriptor
    pub(crate) fn current(&self) -> Field {
        self.field.read().clone()
    }

    /// The current field name
    pub(crate) fn name(&self) -> String {
        self.field.read().name.clone()
    }

    /// Change stream (revision counter)
    pub(crate) fn revision_stream(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replace the descriptor
    ///
    /// A deep-equal descriptor is a no-op: no change emitted, no rebuild.
    /// `reset_control` asks the controls manager for a full rebuild instead
    /// of an incremental diff. Returns whether anything changed.
    pub(crate) fn set_field(&self, field: Field, reset_control: bool) -> Result<bool, FieldError> {
        if self.field.read().semantic_eq(&field) {
            return Ok(false);
        }
        if field.name.is_empty() {
            let path = self
                .control
                .upgrade()
                .map_or_else(|| ".".to_string(), |c| c.path().to_string());
            return Err(FieldError::MissingName { path });
        }
        *self.field.write() = field;
        self.revision.send_modify(|revision| *revision += 1);

        if let Some(control) = self.control.upgrade() {
            if control.is_initialized() {
                control.handle_field_change(reset_control)?;
            }
        }
        Ok(true)
    }

    /// Mutate a copy of the current descriptor and apply it
    ///
    /// The merge-partial update path: unchanged members keep their current
    /// values, and the result goes through the same no-op detection as
    /// `set_field`.
    pub(crate) fn update_field(
        &self,
        mutate: impl FnOnce(&mut Field),
    ) -> Result<bool, FieldError> {
        let mut next = self.current();
        mutate(&mut next);
        self.set_field(next, false)
    }
}

impl ManagerLifecycle for FieldManager {}
