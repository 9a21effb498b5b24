//! Key layout of an rsmq namespace inside the store
//!
//! ```text
//! {ns}:QUEUES           set of queue names
//! {ns}:{queue}          ordered index, member = message id, score = visible_at (ms)
//! {ns}:{queue}:Q        field map: queue settings, counters and message fields
//! {ns}:rt:{queue}       real-time notification channel
//! ```

pub const DEFAULT_NAMESPACE: &str = "rsmq";

const SEPARATOR: &str = ":";

/// Field names inside a queue's field map
pub mod field {
    pub const VT: &str = "vt";
    pub const DELAY: &str = "delay";
    pub const MAX_SIZE: &str = "maxsize";
    pub const CREATED: &str = "created";
    pub const MODIFIED: &str = "modified";
    pub const TOTAL_SENT: &str = "totalsent";
    pub const TOTAL_RECV: &str = "totalrecv";
}

/// A key prefix under which a set of queues lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    prefix: String,
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl Namespace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn queues_set(&self) -> String {
        format!("{}{SEPARATOR}QUEUES", self.prefix)
    }

    pub fn queue_index(&self, queue: &str) -> String {
        format!("{}{SEPARATOR}{queue}", self.prefix)
    }

    pub fn queue_hash(&self, queue: &str) -> String {
        format!("{}{SEPARATOR}{queue}{SEPARATOR}Q", self.prefix)
    }

    pub fn realtime_channel(&self, queue: &str) -> String {
        format!("{}{SEPARATOR}rt{SEPARATOR}{queue}", self.prefix)
    }

    /// Keys owned by one queue
    pub fn queue_keys(&self, queue: &str) -> QueueKeys {
        QueueKeys {
            index: self.queue_index(queue),
            hash: self.queue_hash(queue),
        }
    }
}

/// The two store keys holding a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeys {
    pub index: String,
    pub hash: String,
}

/// Field holding a message's receive count
pub fn message_rc(id: &str) -> String {
    format!("{id}{SEPARATOR}rc")
}

/// Field holding a message's first-receive timestamp
pub fn message_fr(id: &str) -> String {
    format!("{id}{SEPARATOR}fr")
}
