//! Store backend traits

use async_trait::async_trait;
use bytes::Bytes;
use rsmq_core::StoreTime;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WRONGTYPE operation against key holding the wrong kind of value: {0}")]
    WrongType(String),

    #[error("Field is not an integer: {key}/{field}")]
    NotAnInteger { key: String, field: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Commands available to a procedure while it holds the store.
///
/// Sorted-set range queries order members by `(score, member)`, so equal
/// scores resolve to the lexicographically smallest member.
pub trait Transaction {
    /// Store time at the start of the procedure
    fn time(&self) -> StoreTime;

    /// Insert or re-score a member; `true` if it was new
    fn zadd(&mut self, key: &str, score: i64, member: &str) -> Result<bool, StoreError>;

    fn zscore(&self, key: &str, member: &str) -> Result<Option<i64>, StoreError>;

    /// Remove a member; `true` if it was present
    fn zrem(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Lowest-ordered member with a score of at most `max`
    fn zfirst_by_score(&self, key: &str, max: i64) -> Result<Option<String>, StoreError>;

    fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    /// Number of members with `min <= score <= max`
    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<u64, StoreError>;

    fn hget(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError>;

    fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<Bytes>>, StoreError>;

    /// Set a field; `true` if it was new
    fn hset(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError>;

    /// Set a field only if absent; `true` if it was written
    fn hsetnx(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError>;

    /// Add `delta` to an integer field (absent counts as 0) and return the result
    fn hincrby(&mut self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError>;

    /// Remove fields; returns how many existed
    fn hdel(&mut self, key: &str, fields: &[&str]) -> Result<u64, StoreError>;

    fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    fn srem(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Remove whole keys; returns how many existed
    fn del(&mut self, keys: &[&str]) -> Result<u64, StoreError>;
}

/// A short sequence of reads and writes executed as one atomic unit.
///
/// A procedure that fails midway leaves its earlier writes applied, as a
/// server-side script would; procedures perform their fallible reads before
/// their first write.
pub trait Procedure: Send {
    type Output: Send;

    /// Name used in logs
    fn name(&self) -> &'static str;

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError>;
}

/// Abstract store backend.
///
/// `execute` must be serialisable: no other procedure may observe or act on a
/// procedure's intermediate state.
#[async_trait]
pub trait Store: Send + Sync {
    /// Current store time
    async fn time(&self) -> Result<StoreTime, StoreError>;

    /// Run a procedure atomically
    async fn execute<P>(&self, procedure: P) -> Result<P::Output, StoreError>
    where
        P: Procedure + 'static;

    /// Publish to a channel; returns the number of subscribers reached
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, StoreError>;

    /// Subscribe to a channel
    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError>;
}
