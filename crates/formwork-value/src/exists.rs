//! Value existence predicate and slicing helpers
//!
//! Aggregation and reconciliation both hinge on one question: does this value
//! *exist*? `null`, the empty string (unless empty strings are allowed), and
//! an absent value do not; everything else — populated or empty objects and
//! arrays, numbers including zero, booleans — does. NaN cannot occur inside
//! [`serde_json::Value`], so the rule for it is enforced upstream by number
//! construction.

use crate::key::Segment;
use crate::Value;

/// Existence predicate over an optional value
///
/// `allow_empty_string` mirrors the `allow_empty_string` configuration key:
/// when set, `""` counts as an existing value.
#[must_use]
pub fn value_exists(value: Option<&Value>, allow_empty_string: bool) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) if s.is_empty() => allow_empty_string,
        Some(_) => true,
    }
}

/// Apply the `transform_undefined_to_null` policy to a missing value
#[inline]
#[must_use]
pub fn normalize_missing(value: Option<Value>, transform_undefined_to_null: bool) -> Option<Value> {
    match value {
        Some(v) => Some(v),
        None if transform_undefined_to_null => Some(Value::Null),
        None => None,
    }
}

/// Slice one child value out of a composite parent value
///
/// Objects are indexed by name, arrays by position. Scalar parents have no
/// child slices.
#[must_use]
pub fn child_slice<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Name(name)) => map.get(name),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    }
}
