//! Property expressions
//!
//! A field property can be written four ways: a literal value, a function, a
//! string reference `"$$resolverName:params:errorMessage"`, or the object
//! reference `{"resolverName": ..., "params": ..., "errorMessage": ...}`.
//! [`Expr::from_value`] classifies the serializable forms; functions are
//! attached programmatically.

use crate::registry::ResolverFn;
use formwork_value::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Prefix marking a string-encoded resolver reference
pub const RESOLVER_REF_PREFIX: &str = "$$";

const REF_NAME_KEY: &str = "resolverName";
const REF_PARAMS_KEY: &str = "params";
const REF_ERROR_KEY: &str = "errorMessage";

/// Reference to a named resolver
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverRef {
    /// Registry name to look up
    pub name: String,
    /// Params carried by the reference
    pub params: Option<Value>,
    /// Error message carried by the reference
    pub error_message: Option<String>,
}

impl ResolverRef {
    /// Reference by name alone
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: None,
            error_message: None,
        }
    }

    /// With reference params
    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: impl Into<Value>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// With an error message
    #[inline]
    #[must_use]
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// Decode the object reference form, if the map matches it
    #[must_use]
    pub fn from_object(map: &formwork_value::Map) -> Option<Self> {
        let name = map.get(REF_NAME_KEY)?.as_str()?;
        Some(Self {
            name: name.to_string(),
            params: map.get(REF_PARAMS_KEY).cloned(),
            error_message: map
                .get(REF_ERROR_KEY)
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

impl FromStr for ResolverRef {
    type Err = ();

    /// Parse `"$$name:params:errorMessage"`; params and message are optional
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix(RESOLVER_REF_PREFIX).ok_or(())?;
        let mut parts = body.splitn(3, ':');
        let name = parts.next().filter(|n| !n.is_empty()).ok_or(())?;

        let params = parts.next().filter(|p| !p.is_empty()).map(|p| {
            // Params are JSON when they parse as JSON, a plain string otherwise.
            serde_json::from_str(p).unwrap_or_else(|_| Value::String(p.to_string()))
        });
        let error_message = parts
            .next()
            .filter(|m| !m.is_empty())
            .map(str::to_string);

        Ok(Self {
            name: name.to_string(),
            params,
            error_message,
        })
    }
}

/// One field property expression
#[derive(Clone)]
pub enum Expr {
    /// Static value, passed through as-is
    Literal(Value),
    /// Function invoked with the evaluation context
    Func(ResolverFn),
    /// Reference into the resolver registry
    Ref(ResolverRef),
}

impl Expr {
    /// Literal expression
    #[inline]
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Function expression
    #[inline]
    #[must_use]
    pub fn func(f: ResolverFn) -> Self {
        Self::Func(f)
    }

    /// Reference expression
    #[inline]
    #[must_use]
    pub fn reference(r: ResolverRef) -> Self {
        Self::Ref(r)
    }

    /// Classify a serializable value into an expression
    ///
    /// Strings starting with `$$` and objects carrying `resolverName` become
    /// references; everything else is a literal.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Ok(reference) = s.parse::<ResolverRef>() {
                return Self::Ref(reference);
            }
        }
        if let Value::Object(map) = &value {
            if let Some(reference) = ResolverRef::from_object(map) {
                return Self::Ref(reference);
            }
        }
        Self::Literal(value)
    }

    /// Semantic equality: literals and references by value, functions by
    /// pointer identity
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Literal(a), Self::Literal(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            (Self::Func(a), Self::Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
            Self::Ref(reference) => f.debug_tuple("Ref").field(reference).finish(),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_name_only() {
        let r: ResolverRef = "$$lookup".parse().unwrap();
        assert_eq!(r.name, "lookup");
        assert_eq!(r.params, None);
        assert_eq!(r.error_message, None);
    }

    #[test]
    fn parse_with_params_and_message() {
        let r: ResolverRef = "$$lookup:5:not found".parse().unwrap();
        assert_eq!(r.name, "lookup");
        assert_eq!(r.params, Some(json!(5)));
        assert_eq!(r.error_message.as_deref(), Some("not found"));
    }

    #[test]
    fn parse_string_params_stay_strings() {
        let r: ResolverRef = "$$lookup:country".parse().unwrap();
        assert_eq!(r.params, Some(json!("country")));
    }

    #[test]
    fn parse_rejects_plain_strings() {
        assert!("lookup".parse::<ResolverRef>().is_err());
        assert!("$$".parse::<ResolverRef>().is_err());
    }

    #[test]
    fn classify_string_reference() {
        let expr = Expr::from_value(json!("$$lookup:1"));
        assert!(matches!(expr, Expr::Ref(ref r) if r.name == "lookup"));
    }

    #[test]
    fn classify_object_reference() {
        let expr = Expr::from_value(json!({"resolverName": "lookup", "params": {"n": 1}}));
        match expr {
            Expr::Ref(r) => {
                assert_eq!(r.name, "lookup");
                assert_eq!(r.params, Some(json!({"n": 1})));
            }
            other => panic!("expected reference, got {other:?}"),
        }
    }

    #[test]
    fn classify_plain_values_as_literals() {
        assert!(matches!(Expr::from_value(json!(42)), Expr::Literal(_)));
        assert!(matches!(Expr::from_value(json!("plain")), Expr::Literal(_)));
        assert!(matches!(Expr::from_value(json!({"a": 1})), Expr::Literal(_)));
    }

    #[test]
    fn semantic_eq_compares_literals_and_refs() {
        assert!(Expr::literal(json!(1)).semantic_eq(&Expr::literal(json!(1))));
        assert!(!Expr::literal(json!(1)).semantic_eq(&Expr::literal(json!(2))));
        let a = Expr::from_value(json!("$$x:1"));
        let b = Expr::from_value(json!("$$x:1"));
        assert!(a.semantic_eq(&b));
    }
}
