//! Message and queue value types

use bytes::Bytes;
use rsmq_core::{id, StoreTime};
use serde::Serialize;

/// Settings of a queue together with the store time, read at the start of an
/// operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueContext {
    /// Default visibility timeout (seconds)
    pub vt: u64,
    /// Default delay (seconds)
    pub delay: u64,
    /// Maximum body size in bytes, `-1` for unlimited
    pub max_size: i64,
    pub now: StoreTime,
    /// Identifier for a message about to be enqueued
    pub new_message_id: Option<String>,
}

impl QueueContext {
    pub fn now_ms(&self) -> u64 {
        self.now.as_unix_millis()
    }

    /// Whether a body of `len` bytes fits this queue
    pub fn accepts_body(&self, len: usize) -> bool {
        self.max_size == crate::validate::MAX_SIZE_UNLIMITED
            || u64::try_from(len).unwrap_or(u64::MAX)
                <= u64::try_from(self.max_size).unwrap_or(0)
    }
}

/// What a Receive or Pop procedure hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub body: Bytes,
    /// Receive count after this delivery
    pub rc: u64,
    /// First-receive timestamp (ms)
    pub fr: u64,
}

/// A message delivered to a consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub body: Bytes,
    /// Times the message has been received, at least 1
    pub rc: u64,
    /// When the message was first received (ms)
    pub fr: u64,
    /// When the message was sent (ms), decoded from its identifier
    pub sent: u64,
}

impl From<Delivery> for Message {
    fn from(delivery: Delivery) -> Self {
        let sent = id::sent_at(&delivery.id).unwrap_or_default();
        Self {
            id: delivery.id,
            body: delivery.body,
            rc: delivery.rc,
            fr: delivery.fr,
            sent,
        }
    }
}

impl Message {
    /// Body as text, replacing invalid UTF-8
    pub fn body_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Settings and counters of a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueueAttributes {
    /// Visibility timeout (seconds)
    pub vt: u64,
    /// Delay applied to new messages (seconds)
    pub delay: u64,
    pub max_size: i64,
    /// Total number of receives
    pub total_recv: u64,
    /// Total number of messages sent
    pub total_sent: u64,
    /// Creation time (unix seconds)
    pub created: u64,
    /// Last attribute change (unix seconds)
    pub modified: u64,
    /// Messages currently stored, hidden ones included
    pub msgs: u64,
    /// Messages not yet visible
    pub hidden_msgs: u64,
}
