//! Evaluation context handed to resolver functions

use formwork_value::Value;

/// Snapshot of the control evaluating a resolver
///
/// Resolvers never get a live control back-reference; they see the current
/// value, the control's resolved params, and — for referenced resolvers —
/// the params and error message carried by the reference itself.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// Current value of the evaluating control
    pub value: Option<Value>,
    /// The control's resolved `params` snapshot
    pub params: Option<Value>,
    /// Params carried by the resolver reference (`"$$name:params"`)
    pub ref_params: Option<Value>,
    /// Error message carried by the resolver reference
    pub error_message: Option<String>,
}

impl ResolveContext {
    /// Empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With the evaluating control's value
    #[inline]
    #[must_use]
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }

    /// With the control's resolved params
    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: Option<Value>) -> Self {
        self.params = params;
        self
    }

    /// With reference-carried params and error message
    #[inline]
    #[must_use]
    pub fn with_reference(mut self, ref_params: Option<Value>, error_message: Option<String>) -> Self {
        self.ref_params = ref_params;
        self.error_message = error_message;
        self
    }
}
