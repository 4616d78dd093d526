//! Cross-instance synchronization contract
//!
//! Mirrors a control's value between form instances (other tabs, windows,
//! processes). Messages carry the originating control's uid so instances can
//! ignore their own posts; a `request_send` message asks peers to reply with
//! their current value.

use formwork_value::Value;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::broadcast;

/// One synchronization message
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SyncMessage {
    /// Structural key of the control the value belongs to
    pub key: String,
    /// Uid of the posting control (self-originated messages are ignored)
    pub uid: String,
    /// The value being mirrored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Ask peers to reply with their current value
    #[serde(default)]
    pub request_send: bool,
}

impl SyncMessage {
    /// Value-carrying message
    #[must_use]
    pub fn value(key: impl Into<String>, uid: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            uid: uid.into(),
            value,
            request_send: false,
        }
    }

    /// Request peers to send their current value
    #[must_use]
    pub fn request(key: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            uid: uid.into(),
            value: None,
            request_send: true,
        }
    }
}

/// Message transport contract
pub trait SyncAdapter: Send + Sync {
    /// Post a message to every peer (fire-and-forget)
    fn post(&self, message: SyncMessage);

    /// Stream of incoming messages, own posts included
    fn listen(&self) -> BoxStream<'static, SyncMessage>;
}

/// In-process broadcast transport
///
/// Every handle sees every post; used by tests and same-process instances.
#[derive(Debug, Clone)]
pub struct ChannelSync {
    tx: broadcast::Sender<SyncMessage>,
}

impl Default for ChannelSync {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }
}

impl ChannelSync {
    /// Create a new transport
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncAdapter for ChannelSync {
    fn post(&self, message: SyncMessage) {
        let _ = self.tx.send(message);
    }

    fn listen(&self) -> BoxStream<'static, SyncMessage> {
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn posts_reach_listeners() {
        let transport = ChannelSync::new();
        let mut incoming = transport.listen();
        transport.post(SyncMessage::value("k", "uid1", Some(json!(1))));
        let message = incoming.next().await.unwrap();
        assert_eq!(message.key, "k");
        assert_eq!(message.value, Some(json!(1)));
        assert!(!message.request_send);
    }

    #[test]
    fn request_message_shape() {
        let message = SyncMessage::request("k", "uid1");
        assert!(message.request_send);
        assert!(message.value.is_none());
    }
}
