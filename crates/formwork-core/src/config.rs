//! Engine configuration
//!
//! Every control sees one effective [`Config`]: the engine defaults, overlaid
//! by the parent's effective configuration, overlaid by the field's own
//! partial [`FieldConfig`] — rightmost wins per key. The merge is recomputed
//! whenever the field changes.

use std::time::Duration;

/// Policy applied to the form after a successful submit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AfterSubmit {
    /// Leave the form disabled
    #[default]
    Disable,
    /// Reset value and state back to initial
    Reset,
    /// Re-enable for further edits
    Enable,
}

/// Which identifier storage entries are keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKeySource {
    /// The control's structural key (position hash)
    #[default]
    Key,
    /// The control's field name
    Name,
}

/// Which control's storage wins when ancestors and descendants both persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageStrategy {
    /// Nearest ancestor with storage enabled
    #[default]
    Start,
    /// Deepest enabled control overrides
    End,
}

/// Shape of localized field output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocalizationOutput {
    /// Group keyed by locale name
    #[default]
    Object,
    /// Array of locales with injected `_name` metadata
    Array,
}

/// Naming convention enforced on field names
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameCase {
    /// `kebab-case`
    Kebab,
    /// `snake_case`
    Snake,
    /// `camelCase`
    Camel,
}

/// Effective configuration of one control
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Register the built-in validator set on the form context
    pub add_default_validators: bool,
    /// Inject `_key`/`_name`/`_uid` into computed object values
    pub add_metadata: bool,
    /// Fall back to the first template when an array entry's `_name` is unknown
    pub allow_unresolved_array_child_names: bool,
    /// Allow a submit while another is in flight
    pub allow_concurrent_submits: bool,
    /// Grace period before warning about a silent async resolver
    pub async_function_warning_timeout: Duration,
    /// Drop persisted values after a successful submit
    pub clear_storage_on_successful_submit: bool,
    /// Disable the whole form while a submit is in flight
    pub disable_form_while_submitting: bool,
    /// What to do with the form after a successful submit
    pub handle_successful_submit: AfterSubmit,
    /// Reset value and state whenever the field descriptor changes
    pub reset_form_on_field_changes: bool,
    /// Identifier storage entries are keyed by
    pub storage_key: StorageKeySource,
    /// Ancestor-vs-descendant storage precedence
    pub storage_strategy: StorageStrategy,
    /// Run the submit handler even when the control is invalid
    pub allow_invalid_submit: bool,
    /// Represent missing child values as explicit `null`s in aggregates
    pub transform_undefined_to_null: bool,
    /// Treat `""` as an existing value
    pub allow_empty_string: bool,
    /// Shape of localized field output
    pub localization_output: LocalizationOutput,
    /// Naming convention enforced on field names, if any
    pub required_name_case: Option<NameCase>,
    /// Seed initial values from URL search parameters
    pub resolve_initial_values_from_search_params: bool,
    /// Run value transformers for the very first initial-value assignment
    pub run_transformers_for_initial_values: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            add_default_validators: true,
            add_metadata: false,
            allow_unresolved_array_child_names: false,
            allow_concurrent_submits: false,
            async_function_warning_timeout: Duration::from_millis(2000),
            clear_storage_on_successful_submit: true,
            disable_form_while_submitting: true,
            handle_successful_submit: AfterSubmit::Disable,
            reset_form_on_field_changes: false,
            storage_key: StorageKeySource::Key,
            storage_strategy: StorageStrategy::Start,
            allow_invalid_submit: false,
            transform_undefined_to_null: false,
            allow_empty_string: false,
            localization_output: LocalizationOutput::Object,
            required_name_case: None,
            resolve_initial_values_from_search_params: false,
            run_transformers_for_initial_values: true,
        }
    }
}

impl Config {
    /// Engine defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay a partial configuration, returning the merged result
    #[must_use]
    pub fn merged(&self, partial: &FieldConfig) -> Self {
        let mut merged = self.clone();
        macro_rules! take {
            ($($key:ident),* $(,)?) => {
                $(if let Some(value) = partial.$key.clone() { merged.$key = value; })*
            };
        }
        take!(
            add_default_validators,
            add_metadata,
            allow_unresolved_array_child_names,
            allow_concurrent_submits,
            async_function_warning_timeout,
            clear_storage_on_successful_submit,
            disable_form_while_submitting,
            handle_successful_submit,
            reset_form_on_field_changes,
            storage_key,
            storage_strategy,
            allow_invalid_submit,
            transform_undefined_to_null,
            allow_empty_string,
            localization_output,
            resolve_initial_values_from_search_params,
            run_transformers_for_initial_values,
        );
        if partial.required_name_case.is_some() {
            merged.required_name_case = partial.required_name_case;
        }
        merged
    }
}

/// Partial configuration carried by a field descriptor
///
/// Every key is optional; unset keys inherit from the parent's effective
/// configuration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConfig {
    /// See [`Config::add_default_validators`]
    pub add_default_validators: Option<bool>,
    /// See [`Config::add_metadata`]
    pub add_metadata: Option<bool>,
    /// See [`Config::allow_unresolved_array_child_names`]
    pub allow_unresolved_array_child_names: Option<bool>,
    /// See [`Config::allow_concurrent_submits`]
    pub allow_concurrent_submits: Option<bool>,
    /// See [`Config::async_function_warning_timeout`]
    pub async_function_warning_timeout: Option<Duration>,
    /// See [`Config::clear_storage_on_successful_submit`]
    pub clear_storage_on_successful_submit: Option<bool>,
    /// See [`Config::disable_form_while_submitting`]
    pub disable_form_while_submitting: Option<bool>,
    /// See [`Config::handle_successful_submit`]
    pub handle_successful_submit: Option<AfterSubmit>,
    /// See [`Config::reset_form_on_field_changes`]
    pub reset_form_on_field_changes: Option<bool>,
    /// See [`Config::storage_key`]
    pub storage_key: Option<StorageKeySource>,
    /// See [`Config::storage_strategy`]
    pub storage_strategy: Option<StorageStrategy>,
    /// See [`Config::allow_invalid_submit`]
    pub allow_invalid_submit: Option<bool>,
    /// See [`Config::transform_undefined_to_null`]
    pub transform_undefined_to_null: Option<bool>,
    /// See [`Config::allow_empty_string`]
    pub allow_empty_string: Option<bool>,
    /// See [`Config::localization_output`]
    pub localization_output: Option<LocalizationOutput>,
    /// See [`Config::required_name_case`]
    pub required_name_case: Option<NameCase>,
    /// See [`Config::resolve_initial_values_from_search_params`]
    pub resolve_initial_values_from_search_params: Option<bool>,
    /// See [`Config::run_transformers_for_initial_values`]
    pub run_transformers_for_initial_values: Option<bool>,
}

impl FieldConfig {
    /// Empty partial (inherits everything)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable metadata injection
    #[inline]
    #[must_use]
    pub fn with_metadata(mut self) -> Self {
        self.add_metadata = Some(true);
        self
    }

    /// Allow invalid submits
    #[inline]
    #[must_use]
    pub fn with_invalid_submit(mut self) -> Self {
        self.allow_invalid_submit = Some(true);
        self
    }

    /// Set the post-success submit policy
    #[inline]
    #[must_use]
    pub fn with_successful_submit(mut self, policy: AfterSubmit) -> Self {
        self.handle_successful_submit = Some(policy);
        self
    }
}
