//! Slot outputs: the sync/async-uniform result of one resolver invocation

use formwork_value::Value;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};
use std::fmt;
use std::future::Future;

/// Output of one resolved slot
///
/// Downstream consumption is uniform: [`into_stream`](Self::into_stream)
/// adapts a ready value or a single-shot deferred into a one-emission stream,
/// so code consuming resolver output never branches on how the value arrived.
pub enum SlotOutput {
    /// Resolved synchronously
    Ready(Value),
    /// Resolves once, later
    Deferred(BoxFuture<'static, Value>),
    /// Emits now and on every future update
    Stream(BoxStream<'static, Value>),
}

impl SlotOutput {
    /// Wrap an immediately available value
    #[inline]
    #[must_use]
    pub fn ready(value: impl Into<Value>) -> Self {
        Self::Ready(value.into())
    }

    /// Wrap a single-shot future
    #[must_use]
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Wrap a multi-value stream
    #[must_use]
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Value> + Send + 'static,
    {
        Self::Stream(stream.boxed())
    }

    /// True when the slot resolved synchronously
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Adapt any output into a stream of values
    #[must_use]
    pub fn into_stream(self) -> BoxStream<'static, Value> {
        match self {
            Self::Ready(value) => futures::stream::once(async move { value }).boxed(),
            Self::Deferred(future) => futures::stream::once(future).boxed(),
            Self::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for SlotOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Value> for SlotOutput {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

/// Result of one validator run
///
/// Validators are resolvers whose produced value encodes this outcome: a bare
/// boolean, or an object `{"valid": bool, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidatorOutcome {
    /// Whether the validated value passed
    pub valid: bool,
    /// Error message when invalid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidatorOutcome {
    /// Passing outcome
    #[inline]
    #[must_use]
    pub fn valid() -> Self {
        Self { valid: true, error: None }
    }

    /// Failing outcome with a message
    #[inline]
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }

    /// Decode an outcome from a resolver-produced value
    ///
    /// Unrecognized shapes count as passing; a validator that wants to fail
    /// must say so explicitly.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(valid) => Self { valid: *valid, error: None },
            Value::Object(_) => serde_json::from_value(value.clone()).unwrap_or_else(|_| Self::valid()),
            _ => Self::valid(),
        }
    }

    /// Encode the outcome as a resolver value
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Bool(self.valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn ready_adapts_to_single_emission_stream() {
        let mut stream = SlotOutput::ready(json!(1)).into_stream();
        assert_eq!(stream.next().await, Some(json!(1)));
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn deferred_adapts_to_single_emission_stream() {
        let output = SlotOutput::deferred(async { json!("later") });
        let mut stream = output.into_stream();
        assert_eq!(stream.next().await, Some(json!("later")));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn outcome_from_bool_and_object() {
        assert_eq!(ValidatorOutcome::from_value(&json!(true)), ValidatorOutcome::valid());
        assert_eq!(
            ValidatorOutcome::from_value(&json!({"valid": false, "error": "nope"})),
            ValidatorOutcome::invalid("nope")
        );
        assert_eq!(ValidatorOutcome::from_value(&json!("odd")), ValidatorOutcome::valid());
    }
}
