//! Control state snapshots
//!
//! UI/validity booleans come in complementary pairs sharing one underlying
//! value (`valid`/`invalid`, `pristine`/`dirty`, ...): the snapshot stores the
//! canonical member and derives the other. Plain states (`errors`, submit
//! bookkeeping, `focus`) stand alone.

use indexmap::IndexMap;

/// Outcome of the most recent submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmitResult {
    /// No submit has finished yet
    #[default]
    NotSubmitted,
    /// Handler completed successfully
    Success,
    /// Handler threw, rejected, or returned the submit-error sentinel
    Error,
    /// Validation failed and invalid submits are not allowed
    FormInvalid,
}

/// One control's path-qualified error set
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PathErrors {
    /// Dot-joined path of the erroring control
    pub path: String,
    /// Validator name → message
    pub errors: IndexMap<String, String>,
}

/// Snapshot of a control's UI/validity state
///
/// Cheap to clone; emitted on every state change stream tick.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ControlState {
    /// All own validators passed and every active child is valid
    pub valid: bool,
    /// Value changed since construction/reset
    pub dirty: bool,
    /// The user has interacted with the control
    pub touched: bool,
    /// Accepting input
    pub enabled: bool,
    /// Value may be edited (enabled but possibly read-only)
    pub editable: bool,
    /// Participates in aggregation and validity
    pub active: bool,
    /// Shown by UI bindings
    pub visible: bool,
    /// Currently focused
    pub focus: bool,
    /// A validation pass is in flight
    pub validating: bool,
    /// At least one validation pass has completed
    pub validated: bool,
    /// A submit has completed at least once
    pub submitted: bool,
    /// A submit is in flight
    pub submitting: bool,
    /// Outcome of the most recent submit
    pub submit_result: SubmitResult,
    /// Number of completed submit attempts
    pub submits: u32,
    /// Own failing validator messages
    pub errors: IndexMap<String, String>,
    /// Own and active descendants' errors, path-qualified, depth-first
    pub all_errors: Vec<PathErrors>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            valid: false,
            dirty: false,
            touched: false,
            enabled: true,
            editable: true,
            active: true,
            visible: true,
            focus: false,
            validating: false,
            validated: false,
            submitted: false,
            submitting: false,
            submit_result: SubmitResult::NotSubmitted,
            submits: 0,
            errors: IndexMap::new(),
            all_errors: Vec::new(),
        }
    }
}

impl ControlState {
    /// Complement of [`valid`](Self::valid)
    #[inline]
    #[must_use]
    pub fn invalid(&self) -> bool {
        !self.valid
    }

    /// Complement of [`dirty`](Self::dirty)
    #[inline]
    #[must_use]
    pub fn pristine(&self) -> bool {
        !self.dirty
    }

    /// Complement of [`touched`](Self::touched)
    #[inline]
    #[must_use]
    pub fn untouched(&self) -> bool {
        !self.touched
    }

    /// Complement of [`enabled`](Self::enabled)
    #[inline]
    #[must_use]
    pub fn disabled(&self) -> bool {
        !self.enabled
    }

    /// Complement of [`editable`](Self::editable)
    #[inline]
    #[must_use]
    pub fn read_only(&self) -> bool {
        !self.editable
    }

    /// Complement of [`active`](Self::active)
    #[inline]
    #[must_use]
    pub fn inactive(&self) -> bool {
        !self.active
    }

    /// Complement of [`visible`](Self::visible)
    #[inline]
    #[must_use]
    pub fn hidden(&self) -> bool {
        !self.visible
    }
}

/// Canonical member of each settable boolean state pair
///
/// Validity is engine-computed and not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PairState {
    Dirty,
    Touched,
    Enabled,
    Editable,
    Active,
    Visible,
}

/// Map a user-overridable state key to its pair and polarity
///
/// `("disabled", v)` means `enabled = !v`. Validity and interaction pairs are
/// engine-owned and not overridable from field expressions.
pub(crate) fn override_target(key: &str) -> Option<(PairState, bool)> {
    match key {
        "enabled" => Some((PairState::Enabled, true)),
        "disabled" => Some((PairState::Enabled, false)),
        "editable" => Some((PairState::Editable, true)),
        "readOnly" | "read_only" => Some((PairState::Editable, false)),
        "active" => Some((PairState::Active, true)),
        "inactive" => Some((PairState::Active, false)),
        "visible" => Some((PairState::Visible, true)),
        "hidden" => Some((PairState::Visible, false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_untouched_and_unvalidated() {
        let state = ControlState::default();
        assert!(!state.valid);
        assert!(state.pristine());
        assert!(state.untouched());
        assert!(state.enabled);
        assert!(state.active);
        assert!(!state.validated);
        assert_eq!(state.submit_result, SubmitResult::NotSubmitted);
    }

    #[test]
    fn pair_complements_flip_together() {
        let mut state = ControlState::default();
        state.valid = true;
        assert!(!state.invalid());
        state.enabled = false;
        assert!(state.disabled());
    }

    #[test]
    fn submit_result_serializes_kebab_case() {
        let json = serde_json::to_string(&SubmitResult::FormInvalid).unwrap();
        assert_eq!(json, "\"form-invalid\"");
    }

    #[test]
    fn override_targets_cover_both_pair_members() {
        assert_eq!(override_target("enabled"), Some((PairState::Enabled, true)));
        assert_eq!(override_target("disabled"), Some((PairState::Enabled, false)));
        assert_eq!(override_target("hidden"), Some((PairState::Visible, false)));
        assert_eq!(override_target("valid"), None);
    }
}
