//! In-memory ephemeral store backend

use super::traits::*;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use rsmq_core::{Clock, StoreTime, SystemClock};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const CHANNEL_CAPACITY: usize = 1024;

/// Sorted set with members ordered by `(score, member)`
#[derive(Debug, Default)]
struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    fn insert(&mut self, score: i64, member: &str) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(previous) => {
                self.ordered.remove(&(previous, member.to_string()));
                self.ordered.insert((score, member.to_string()));
                false
            }
            None => {
                self.ordered.insert((score, member.to_string()));
                true
            }
        }
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn first_at_most(&self, max: i64) -> Option<&str> {
        self.ordered
            .iter()
            .next()
            .filter(|(score, _)| *score <= max)
            .map(|(_, member)| member.as_str())
    }

    fn count(&self, min: i64, max: i64) -> u64 {
        if min > max {
            return 0;
        }
        self.ordered
            .range((min, String::new())..)
            .take_while(|(score, _)| *score <= max)
            .count() as u64
    }

    fn len(&self) -> usize {
        self.scores.len()
    }
}

/// Stored value
#[derive(Debug)]
enum Value {
    SortedSet(SortedSet),
    Hash(HashMap<String, Bytes>),
    Set(BTreeSet<String>),
}

impl Value {
    fn is_empty(&self) -> bool {
        match self {
            Value::SortedSet(z) => z.len() == 0,
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Value>,
}

impl Keyspace {
    fn sorted_set(&self, key: &str) -> Result<Option<&SortedSet>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::SortedSet(z)) => Ok(Some(z)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn sorted_set_mut(&mut self, key: &str) -> Result<&mut SortedSet, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::SortedSet(SortedSet::default()))
        {
            Value::SortedSet(z) => Ok(z),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn hash(&self, key: &str) -> Result<Option<&HashMap<String, Bytes>>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn hash_mut(&mut self, key: &str) -> Result<&mut HashMap<String, Bytes>, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()))
        {
            Value::Hash(h) => Ok(h),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set(&self, key: &str) -> Result<Option<&BTreeSet<String>>, StoreError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Set(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    fn set_mut(&mut self, key: &str) -> Result<&mut BTreeSet<String>, StoreError> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()))
        {
            Value::Set(s) => Ok(s),
            _ => Err(StoreError::WrongType(key.to_string())),
        }
    }

    /// Drop a key once its collection is empty, like a key-value server does
    fn reap(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(Value::is_empty) {
            self.entries.remove(key);
        }
    }
}

/// Procedure view over the locked keyspace
struct EphemeralTransaction<'a> {
    keyspace: &'a mut Keyspace,
    now: StoreTime,
}

impl Transaction for EphemeralTransaction<'_> {
    fn time(&self) -> StoreTime {
        self.now
    }

    fn zadd(&mut self, key: &str, score: i64, member: &str) -> Result<bool, StoreError> {
        Ok(self.keyspace.sorted_set_mut(key)?.insert(score, member))
    }

    fn zscore(&self, key: &str, member: &str) -> Result<Option<i64>, StoreError> {
        Ok(self
            .keyspace
            .sorted_set(key)?
            .and_then(|z| z.scores.get(member).copied()))
    }

    fn zrem(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        if self.keyspace.sorted_set(key)?.is_none() {
            return Ok(false);
        }
        let removed = self.keyspace.sorted_set_mut(key)?.remove(member);
        self.keyspace.reap(key);
        Ok(removed)
    }

    fn zfirst_by_score(&self, key: &str, max: i64) -> Result<Option<String>, StoreError> {
        Ok(self
            .keyspace
            .sorted_set(key)?
            .and_then(|z| z.first_at_most(max))
            .map(str::to_string))
    }

    fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        Ok(self.keyspace.sorted_set(key)?.map_or(0, |z| z.len() as u64))
    }

    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<u64, StoreError> {
        Ok(self
            .keyspace
            .sorted_set(key)?
            .map_or(0, |z| z.count(min, max)))
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self
            .keyspace
            .hash(key)?
            .and_then(|h| h.get(field).cloned()))
    }

    fn hmget(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<Bytes>>, StoreError> {
        let hash = self.keyspace.hash(key)?;
        Ok(fields
            .iter()
            .map(|field| hash.and_then(|h| h.get(*field).cloned()))
            .collect())
    }

    fn hset(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError> {
        Ok(self
            .keyspace
            .hash_mut(key)?
            .insert(field.to_string(), value)
            .is_none())
    }

    fn hsetnx(&mut self, key: &str, field: &str, value: Bytes) -> Result<bool, StoreError> {
        let hash = self.keyspace.hash_mut(key)?;
        if hash.contains_key(field) {
            return Ok(false);
        }
        hash.insert(field.to_string(), value);
        Ok(true)
    }

    fn hincrby(&mut self, key: &str, field: &str, delta: i64) -> Result<i64, StoreError> {
        let hash = self.keyspace.hash_mut(key)?;
        let current = match hash.get(field) {
            Some(raw) => parse_integer(raw).ok_or_else(|| StoreError::NotAnInteger {
                key: key.to_string(),
                field: field.to_string(),
            })?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            StoreError::Internal(format!("increment would overflow {key}/{field}"))
        })?;
        hash.insert(field.to_string(), Bytes::from(next.to_string()));
        Ok(next)
    }

    fn hdel(&mut self, key: &str, fields: &[&str]) -> Result<u64, StoreError> {
        if self.keyspace.hash(key)?.is_none() {
            return Ok(0);
        }
        let hash = self.keyspace.hash_mut(key)?;
        let removed = fields
            .iter()
            .filter(|field| hash.remove(**field).is_some())
            .count() as u64;
        self.keyspace.reap(key);
        Ok(removed)
    }

    fn sadd(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.keyspace.set_mut(key)?.insert(member.to_string()))
    }

    fn srem(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        if self.keyspace.set(key)?.is_none() {
            return Ok(false);
        }
        let removed = self.keyspace.set_mut(key)?.remove(member);
        self.keyspace.reap(key);
        Ok(removed)
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .keyspace
            .set(key)?
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn del(&mut self, keys: &[&str]) -> Result<u64, StoreError> {
        Ok(keys
            .iter()
            .filter(|key| self.keyspace.entries.remove(**key).is_some())
            .count() as u64)
    }
}

fn parse_integer(raw: &Bytes) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse().ok()
}

/// Ephemeral (in-memory) store backend.
///
/// Procedures run one at a time under a single keyspace lock, which gives the
/// same serialisable execution a key-value server gives its scripts.
pub struct EphemeralStore {
    keyspace: Mutex<Keyspace>,
    clock: Arc<dyn Clock>,
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl Default for EphemeralStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose time comes from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            keyspace: Mutex::new(Keyspace::default()),
            clock,
            channels: DashMap::new(),
        }
    }

    /// Number of keys currently held
    pub fn key_count(&self) -> usize {
        self.keyspace.lock().entries.len()
    }

    /// Remove every key
    pub fn flush(&self) {
        self.keyspace.lock().entries.clear();
    }

    fn channel(&self, name: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Store for EphemeralStore {
    async fn time(&self) -> Result<StoreTime, StoreError> {
        Ok(self.clock.now())
    }

    async fn execute<P>(&self, procedure: P) -> Result<P::Output, StoreError>
    where
        P: Procedure + 'static,
    {
        let name = procedure.name();
        let mut keyspace = self.keyspace.lock();
        let mut tx = EphemeralTransaction {
            keyspace: &mut *keyspace,
            now: self.clock.now(),
        };
        let result = procedure.run(&mut tx);
        trace!(procedure = name, ok = result.is_ok(), "Executed procedure");
        result
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<usize, StoreError> {
        let receivers = match self.channels.get(channel) {
            Some(sender) => sender.send(payload).unwrap_or(0),
            None => 0,
        };
        debug!(channel = %channel, receivers, "Published notification");
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> Result<broadcast::Receiver<String>, StoreError> {
        Ok(self.channel(channel).subscribe())
    }
}
