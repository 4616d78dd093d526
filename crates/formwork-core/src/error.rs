//! Error types for the control engine
//!
//! Construction errors are fatal to the control being built and abort the
//! enclosing `create_form`/`add_control` call; everything else in the engine
//! degrades (resolution/validation slots are omitted with a log line, storage
//! and sync failures read as "no value", lookups return `Option`).

/// Errors raised while building or restructuring a control tree
///
/// Every variant names the offending control's path.
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    /// Field descriptor without a name
    #[error("field at `{path}` has no name")]
    MissingName {
        /// Path of the parent that attempted the build
        path: String,
    },

    /// Duplicate sibling names in a non-array group
    #[error("duplicate sibling names under `{path}`: {names:?}")]
    DuplicateNames {
        /// Path of the group control
        path: String,
        /// The offending names
        names: Vec<String>,
    },

    /// Array grouping declared without any field template
    #[error("array-grouped `{path}` has no field template")]
    NoTemplate {
        /// Path of the array control
        path: String,
    },

    /// Heterogeneous array templates require metadata injection
    #[error("array-grouped `{path}` mixes field templates but `add_metadata` is disabled")]
    HeterogeneousWithoutMetadata {
        /// Path of the array control
        path: String,
    },

    /// Heterogeneous array templates must produce group children
    #[error("template `{template}` of array-grouped `{path}` must expect group children")]
    TemplateNotGroup {
        /// Path of the array control
        path: String,
        /// Name of the offending template
        template: String,
    },

    /// Requested template does not exist on the array control
    #[error("array-grouped `{path}` has no template matching `{requested}`")]
    UnknownTemplate {
        /// Path of the array control
        path: String,
        /// The name or index that failed to resolve
        requested: String,
    },

    /// Repeating-control operation on a control that is not array-grouped
    #[error("`{path}` is not array-grouped")]
    NotArrayGrouped {
        /// Path of the control
        path: String,
    },
}

/// Errors surfaced by the submit pipeline
///
/// Handler failures do not appear here: a throwing/rejecting handler is
/// caught, logged, and reflected as `submit_result = Error`. These variants
/// are the conditions that refuse a submit call outright.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// A submit is already in flight and concurrent submits are not allowed
    #[error("submit already in progress")]
    AlreadySubmitting,

    /// No submit handler could be resolved for the control
    #[error("no submit handler configured for `{path}`")]
    NoHandler {
        /// Path of the submitting control
        path: String,
    },
}
