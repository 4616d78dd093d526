//! Built-in validator set
//!
//! Trivial predicate validators registered on every [`FormContext`] unless
//! `add_default_validators` is disabled. All of them resolve synchronously;
//! custom async validators plug in through the same registry.
//!
//! A validator reads the value under validation from the context, the
//! validation param from the reference params, and an optional custom error
//! message from the reference.
//!
//! [`FormContext`]: crate::context::FormContext

use formwork_resolver::{ResolveContext, SlotOutput, ValidatorFn, ValidatorOutcome, ValidatorRegistry};
use formwork_value::{value_exists, Value};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://\S+$").expect("url pattern is valid"));

/// Register the built-in validators
pub fn register_defaults(registry: &mut ValidatorRegistry) {
    registry.register("required", required());
    registry.register("pattern", pattern());
    registry.register("min", min());
    registry.register("max", max());
    registry.register("min_length", min_length());
    registry.register("max_length", max_length());
    registry.register("email", email());
    registry.register("url", url());
}

fn outcome(valid: bool, ctx: &ResolveContext, default_message: &str) -> SlotOutput {
    let result = if valid {
        ValidatorOutcome::valid()
    } else {
        let message = ctx
            .error_message
            .clone()
            .unwrap_or_else(|| default_message.to_string());
        ValidatorOutcome::invalid(message)
    };
    SlotOutput::Ready(result.to_value())
}

/// Param of `false` disables a validator entry without removing it
fn param_enabled(ctx: &ResolveContext) -> bool {
    !matches!(ctx.ref_params, Some(Value::Bool(false)))
}

/// Validators other than `required` pass on missing values
fn missing(ctx: &ResolveContext) -> bool {
    !value_exists(ctx.value.as_ref(), false)
}

/// Value must exist
#[must_use]
pub fn required() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = !param_enabled(ctx) || value_exists(ctx.value.as_ref(), false);
        outcome(valid, ctx, "This field is required")
    })
}

/// String value must match the param regex
#[must_use]
pub fn pattern() -> ValidatorFn {
    Arc::new(|ctx| {
        if missing(ctx) {
            return outcome(true, ctx, "");
        }
        let Some(pattern) = ctx.ref_params.as_ref().and_then(Value::as_str) else {
            return outcome(true, ctx, "");
        };
        let valid = match Regex::new(pattern) {
            Ok(re) => ctx
                .value
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| re.is_match(s)),
            Err(error) => {
                tracing::warn!(%pattern, %error, "invalid pattern param; validator skipped");
                true
            }
        };
        outcome(valid, ctx, "Value does not match the required pattern")
    })
}

/// Numeric value must be at least the param
#[must_use]
pub fn min() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx) || compare_numbers(ctx, |value, limit| value >= limit);
        outcome(valid, ctx, "Value is too small")
    })
}

/// Numeric value must be at most the param
#[must_use]
pub fn max() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx) || compare_numbers(ctx, |value, limit| value <= limit);
        outcome(valid, ctx, "Value is too large")
    })
}

/// String/array length must be at least the param
#[must_use]
pub fn min_length() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx) || compare_length(ctx, |len, limit| len >= limit);
        outcome(valid, ctx, "Value is too short")
    })
}

/// String/array length must be at most the param
#[must_use]
pub fn max_length() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx) || compare_length(ctx, |len, limit| len <= limit);
        outcome(valid, ctx, "Value is too long")
    })
}

/// String value must look like an email address
#[must_use]
pub fn email() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx)
            || !param_enabled(ctx)
            || ctx
                .value
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| EMAIL.is_match(s));
        outcome(valid, ctx, "Value is not a valid email address")
    })
}

/// String value must look like an http(s) URL
#[must_use]
pub fn url() -> ValidatorFn {
    Arc::new(|ctx| {
        let valid = missing(ctx)
            || !param_enabled(ctx)
            || ctx
                .value
                .as_ref()
                .and_then(Value::as_str)
                .is_some_and(|s| URL.is_match(s));
        outcome(valid, ctx, "Value is not a valid URL")
    })
}

fn compare_numbers(ctx: &ResolveContext, ok: impl Fn(f64, f64) -> bool) -> bool {
    let Some(limit) = ctx.ref_params.as_ref().and_then(Value::as_f64) else {
        return true;
    };
    match ctx.value.as_ref().and_then(Value::as_f64) {
        Some(value) => ok(value, limit),
        None => true,
    }
}

fn compare_length(ctx: &ResolveContext, ok: impl Fn(usize, usize) -> bool) -> bool {
    let Some(limit) = ctx.ref_params.as_ref().and_then(Value::as_u64) else {
        return true;
    };
    let length = match ctx.value.as_ref() {
        Some(Value::String(s)) => Some(s.chars().count()),
        Some(Value::Array(items)) => Some(items.len()),
        _ => None,
    };
    match length {
        Some(length) => ok(length, limit as usize),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(f: &ValidatorFn, value: Option<Value>, param: Option<Value>) -> ValidatorOutcome {
        let ctx = ResolveContext::new()
            .with_value(value)
            .with_reference(param, None);
        match f(&ctx) {
            SlotOutput::Ready(v) => ValidatorOutcome::from_value(&v),
            _ => panic!("built-in validators are synchronous"),
        }
    }

    #[test]
    fn required_fails_on_missing_value() {
        let f = required();
        assert!(!run(&f, None, Some(json!(true))).valid);
        assert!(!run(&f, Some(json!("")), Some(json!(true))).valid);
        assert!(run(&f, Some(json!("x")), Some(json!(true))).valid);
        assert!(run(&f, Some(json!(0)), Some(json!(true))).valid);
    }

    #[test]
    fn required_disabled_by_false_param() {
        let f = required();
        assert!(run(&f, None, Some(json!(false))).valid);
    }

    #[test]
    fn required_uses_reference_error_message() {
        let f = required();
        let ctx = ResolveContext::new().with_reference(Some(json!(true)), Some("custom".into()));
        let outcome = match f(&ctx) {
            SlotOutput::Ready(v) => ValidatorOutcome::from_value(&v),
            _ => unreachable!(),
        };
        assert_eq!(outcome.error.as_deref(), Some("custom"));
    }

    #[test]
    fn pattern_matches_param_regex() {
        let f = pattern();
        assert!(run(&f, Some(json!("abc")), Some(json!("^a"))).valid);
        assert!(!run(&f, Some(json!("xyz")), Some(json!("^a"))).valid);
        // Missing values pass; `required` owns presence.
        assert!(run(&f, None, Some(json!("^a"))).valid);
    }

    #[test]
    fn min_max_compare_numbers() {
        assert!(run(&min(), Some(json!(5)), Some(json!(3))).valid);
        assert!(!run(&min(), Some(json!(2)), Some(json!(3))).valid);
        assert!(run(&max(), Some(json!(2)), Some(json!(3))).valid);
        assert!(!run(&max(), Some(json!(5)), Some(json!(3))).valid);
    }

    #[test]
    fn length_validators_cover_strings_and_arrays() {
        assert!(!run(&min_length(), Some(json!("ab")), Some(json!(3))).valid);
        assert!(run(&min_length(), Some(json!("abc")), Some(json!(3))).valid);
        assert!(!run(&max_length(), Some(json!([1, 2, 3])), Some(json!(2))).valid);
    }

    #[test]
    fn email_and_url_formats() {
        assert!(run(&email(), Some(json!("a@b.co")), Some(json!(true))).valid);
        assert!(!run(&email(), Some(json!("not-an-email")), Some(json!(true))).valid);
        assert!(run(&url(), Some(json!("https://example.com")), Some(json!(true))).valid);
        assert!(!run(&url(), Some(json!("example.com")), Some(json!(true))).valid);
    }
}
