//! Field descriptors
//!
//! A [`Field`] is the declarative, mostly-serializable description of one
//! control: its name, how children's values combine ([`Grouping`]), nested
//! child fields, validation, configuration overrides, resolver-backed params
//! and state expressions, lifecycle hooks, and the submit handler.
//!
//! Descriptors are immutable per assignment: replacing a control's field with
//! a semantically equal one is a no-op (see
//! [`FieldManager`](crate::managers::FieldManager)). Semantic equality
//! compares data members by value and every function-valued member by `Arc`
//! pointer identity.

use crate::config::FieldConfig;
use crate::control::Control;
use formwork_resolver::{Expr, ResolverRef, ResolverRegistry, ValidatorRegistry};
use formwork_value::Value;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// How a control's children's values combine into its own value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// Object keyed by child name
    #[default]
    Group,
    /// Ordered sequence keyed by child index
    Array,
    /// Children's values merge into the parent's object without nesting
    Flat,
}

/// Initial children of an array-grouped control
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartWith {
    /// Repeat the first template this many times
    Count(usize),
    /// Explicit sequence of template names
    Templates(Vec<String>),
}

/// Synchronous lifecycle hook
pub type ControlHook = Arc<dyn Fn(&Arc<Control>) + Send + Sync>;

/// Asynchronous lifecycle hook (submit pipeline)
pub type AsyncControlHook = Arc<dyn Fn(&Arc<Control>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Lifecycle hooks carried by a field descriptor
#[derive(Clone, Default)]
pub struct Hooks {
    /// After the control is constructed and initialized
    pub on_create: Option<ControlHook>,
    /// After any change (field, value, or state)
    pub on_changes: Option<ControlHook>,
    /// After the control's value changed
    pub on_value_changes: Option<ControlHook>,
    /// After the control's state changed
    pub on_state_changes: Option<ControlHook>,
    /// Before the control is removed from its parent
    pub on_remove: Option<ControlHook>,
    /// Before the submit handler runs (depth-first across the tree)
    pub on_before_submit: Option<AsyncControlHook>,
    /// After the submit handler ran
    pub on_after_submit: Option<AsyncControlHook>,
}

impl Hooks {
    fn semantic_eq(&self, other: &Self) -> bool {
        arc_opt_eq(&self.on_create, &other.on_create)
            && arc_opt_eq(&self.on_changes, &other.on_changes)
            && arc_opt_eq(&self.on_value_changes, &other.on_value_changes)
            && arc_opt_eq(&self.on_state_changes, &other.on_state_changes)
            && arc_opt_eq(&self.on_remove, &other.on_remove)
            && arc_opt_eq(&self.on_before_submit, &other.on_before_submit)
            && arc_opt_eq(&self.on_after_submit, &other.on_after_submit)
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set: Vec<&str> = Vec::new();
        if self.on_create.is_some() {
            set.push("on_create");
        }
        if self.on_changes.is_some() {
            set.push("on_changes");
        }
        if self.on_value_changes.is_some() {
            set.push("on_value_changes");
        }
        if self.on_state_changes.is_some() {
            set.push("on_state_changes");
        }
        if self.on_remove.is_some() {
            set.push("on_remove");
        }
        if self.on_before_submit.is_some() {
            set.push("on_before_submit");
        }
        if self.on_after_submit.is_some() {
            set.push("on_after_submit");
        }
        f.debug_tuple("Hooks").field(&set).finish()
    }
}

/// Context handed to a submit handler
#[derive(Debug, Clone, Default)]
pub struct SubmitContext {
    /// The submitting control's current value
    pub value: Option<Value>,
    /// The control's resolved params snapshot
    pub params: Option<Value>,
}

/// What a submit handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Handler succeeded; optional response payload
    Success(Option<Value>),
    /// Recoverable submit error with optional payload
    ///
    /// Distinct from a transport/handler failure: the handler ran and chose
    /// to signal an error.
    Failure(Option<Value>),
}

/// Submit handler function
pub type SubmitFn = Arc<dyn Fn(SubmitContext) -> BoxFuture<'static, SubmitOutcome> + Send + Sync>;

/// How a control submits
#[derive(Clone)]
pub enum SubmitHandler {
    /// Call this function with the current value
    Function(SubmitFn),
    /// POST the current value as JSON to this URL
    Url(String),
    /// Separate handlers for the valid and invalid outcomes
    Branch {
        /// Runs when the control is valid
        valid: Option<SubmitFn>,
        /// Runs when the control is invalid
        invalid: Option<SubmitFn>,
    },
    /// Look the handler up in the resolver registry
    Ref(ResolverRef),
}

impl SubmitHandler {
    fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(a, b),
            (Self::Url(a), Self::Url(b)) => a == b,
            (
                Self::Branch { valid: av, invalid: ai },
                Self::Branch { valid: bv, invalid: bi },
            ) => arc_opt_eq(av, bv) && arc_opt_eq(ai, bi),
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for SubmitHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Branch { valid, invalid } => f
                .debug_struct("Branch")
                .field("valid", &valid.is_some())
                .field("invalid", &invalid.is_some())
                .finish(),
            Self::Ref(reference) => f.debug_tuple("Ref").field(reference).finish(),
        }
    }
}

/// Value transformer applied to every computed value before it is stored
pub type Transformer = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Declarative description of one control
#[derive(Clone, Default)]
pub struct Field {
    /// Name, unique among siblings unless array-grouped
    pub name: String,
    /// How children's values combine
    pub grouping: Grouping,
    /// Child field descriptors (array grouping reads these as templates)
    pub fields: Option<Vec<Field>>,
    /// Explicit initial value (beats storage and defaults)
    pub initial_value: Option<Value>,
    /// Fallback value when nothing else provides one
    pub default_value: Option<Value>,
    /// Validator name → param
    pub validation: IndexMap<String, Value>,
    /// Field-local validator registrations, inherited by children
    pub validators: ValidatorRegistry,
    /// Field-local resolver registrations, inherited by children
    pub resolvers: ResolverRegistry,
    /// Configuration overrides
    pub config: FieldConfig,
    /// Named parameter expressions resolved on every field change
    pub params: IndexMap<String, Expr>,
    /// State-override expressions (`active`, `enabled`, `hidden`, ...)
    pub state_overrides: IndexMap<String, Expr>,
    /// Lifecycle hooks
    pub hooks: Hooks,
    /// Submit handler
    pub handle_submit: Option<SubmitHandler>,
    /// Value transformer
    pub transformer: Option<Transformer>,
    /// Initial children for array grouping
    pub start_with: Option<StartWith>,
    /// Persist this control's value through the storage collaborator
    pub use_storage: bool,
    /// Mirror this control's value across instances
    pub use_synchronization: bool,
}

impl Field {
    /// New named field with defaults
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the grouping
    #[inline]
    #[must_use]
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.grouping = grouping;
        self
    }

    /// Set child fields
    #[inline]
    #[must_use]
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Set the initial value
    #[inline]
    #[must_use]
    pub fn with_initial_value(mut self, value: impl Into<Value>) -> Self {
        self.initial_value = Some(value.into());
        self
    }

    /// Set the default value
    #[inline]
    #[must_use]
    pub fn with_default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Add a validation entry (validator name → param)
    #[inline]
    #[must_use]
    pub fn with_validation(mut self, name: impl Into<String>, param: impl Into<Value>) -> Self {
        self.validation.insert(name.into(), param.into());
        self
    }

    /// Register a field-local validator
    #[inline]
    #[must_use]
    pub fn with_validator(mut self, name: impl Into<String>, f: formwork_resolver::ValidatorFn) -> Self {
        self.validators.register(name, f);
        self
    }

    /// Register a field-local resolver
    #[inline]
    #[must_use]
    pub fn with_resolver(mut self, name: impl Into<String>, f: formwork_resolver::ResolverFn) -> Self {
        self.resolvers.register(name, f);
        self
    }

    /// Set configuration overrides
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: FieldConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a param expression
    #[inline]
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.params.insert(name.into(), expr.into());
        self
    }

    /// Add a state-override expression (`"active"`, `"enabled"`, `"hidden"`, ...)
    #[inline]
    #[must_use]
    pub fn with_state_override(mut self, key: impl Into<String>, expr: impl Into<Expr>) -> Self {
        self.state_overrides.insert(key.into(), expr.into());
        self
    }

    /// Set the submit handler
    #[inline]
    #[must_use]
    pub fn with_submit_handler(mut self, handler: SubmitHandler) -> Self {
        self.handle_submit = Some(handler);
        self
    }

    /// Set the value transformer
    #[inline]
    #[must_use]
    pub fn with_transformer(mut self, transformer: Transformer) -> Self {
        self.transformer = Some(transformer);
        self
    }

    /// Set initial array children
    #[inline]
    #[must_use]
    pub fn with_start_with(mut self, start_with: StartWith) -> Self {
        self.start_with = Some(start_with);
        self
    }

    /// Enable storage for this control
    #[inline]
    #[must_use]
    pub fn with_storage(mut self) -> Self {
        self.use_storage = true;
        self
    }

    /// Enable cross-instance synchronization for this control
    #[inline]
    #[must_use]
    pub fn with_synchronization(mut self) -> Self {
        self.use_synchronization = true;
        self
    }

    /// Attach lifecycle hooks
    #[inline]
    #[must_use]
    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Child templates (empty slice when `fields` is unset)
    #[inline]
    #[must_use]
    pub fn templates(&self) -> &[Field] {
        self.fields.as_deref().unwrap_or_default()
    }

    /// Find a child template by name
    #[must_use]
    pub fn template_named(&self, name: &str) -> Option<&Field> {
        self.templates().iter().find(|f| f.name == name)
    }

    /// Distinct template names, in declaration order
    #[must_use]
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for template in self.templates() {
            if !names.contains(&template.name.as_str()) {
                names.push(template.name.as_str());
            }
        }
        names
    }

    /// Semantic equality with another descriptor
    ///
    /// Data members compare by value; function-valued members (hooks,
    /// transformers, registered validators/resolvers, submit functions) by
    /// `Arc` pointer identity.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.grouping == other.grouping
            && fields_eq(&self.fields, &other.fields)
            && self.initial_value == other.initial_value
            && self.default_value == other.default_value
            && self.validation == other.validation
            && self.validators.same_entries(&other.validators)
            && self.resolvers.same_entries(&other.resolvers)
            && self.config == other.config
            && exprs_eq(&self.params, &other.params)
            && exprs_eq(&self.state_overrides, &other.state_overrides)
            && self.hooks.semantic_eq(&other.hooks)
            && submit_eq(&self.handle_submit, &other.handle_submit)
            && arc_opt_eq(&self.transformer, &other.transformer)
            && self.start_with == other.start_with
            && self.use_storage == other.use_storage
            && self.use_synchronization == other.use_synchronization
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("grouping", &self.grouping)
            .field("fields", &self.fields.as_ref().map(Vec::len))
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

fn fields_eq(a: &Option<Vec<Field>>, b: &Option<Vec<Field>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(fa, fb)| fa.semantic_eq(fb))
        }
        _ => false,
    }
}

fn exprs_eq(a: &IndexMap<String, Expr>, b: &IndexMap<String, Expr>) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, ea)| b.get(key).is_some_and(|eb| ea.semantic_eq(eb)))
}

fn submit_eq(a: &Option<SubmitHandler>, b: &Option<SubmitHandler>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.semantic_eq(b),
        _ => false,
    }
}

fn arc_opt_eq<T: ?Sized>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn semantic_eq_detects_data_changes() {
        let a = Field::new("a").with_initial_value(json!(1));
        let b = Field::new("a").with_initial_value(json!(1));
        assert!(a.semantic_eq(&b));

        let c = Field::new("a").with_initial_value(json!(2));
        assert!(!a.semantic_eq(&c));
    }

    #[test]
    fn semantic_eq_recurses_into_fields() {
        let a = Field::new("root").with_fields(vec![Field::new("child")]);
        let b = Field::new("root").with_fields(vec![Field::new("child")]);
        assert!(a.semantic_eq(&b));

        let c = Field::new("root").with_fields(vec![Field::new("other")]);
        assert!(!a.semantic_eq(&c));
    }

    #[test]
    fn semantic_eq_compares_callbacks_by_identity() {
        let transformer: Transformer = Arc::new(|v| v);
        let a = Field::new("a").with_transformer(transformer.clone());
        let b = Field::new("a").with_transformer(transformer);
        assert!(a.semantic_eq(&b));

        let c = Field::new("a").with_transformer(Arc::new(|v| v));
        assert!(!a.semantic_eq(&c));
    }

    #[test]
    fn template_lookup() {
        let field = Field::new("items")
            .with_grouping(Grouping::Array)
            .with_fields(vec![Field::new("x"), Field::new("y"), Field::new("x")]);
        assert_eq!(field.template_names(), vec!["x", "y"]);
        assert!(field.template_named("y").is_some());
        assert!(field.template_named("z").is_none());
    }
}
