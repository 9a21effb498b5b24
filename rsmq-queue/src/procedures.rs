//! Atomic procedures run against the store
//!
//! Each procedure is one indivisible unit: the store executes it with no other
//! procedure interleaved. All reads that can fail happen before the first write.

use bytes::Bytes;
use rsmq_core::keys::{field, message_fr, message_rc, QueueKeys};
use rsmq_core::id;

use crate::message::{Delivery, QueueAttributes, QueueContext};
use crate::storage::{Procedure, StoreError, Transaction};

/// Convert a millisecond timestamp to a sorted-set score
pub fn score(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}

fn integer_bytes(value: impl ToString) -> Bytes {
    Bytes::from(value.to_string())
}

fn parse_field(key: &str, name: &str, raw: Option<Bytes>) -> Result<Option<i64>, StoreError> {
    raw.map(|raw| {
        std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| StoreError::NotAnInteger {
                key: key.to_string(),
                field: name.to_string(),
            })
    })
    .transpose()
}

fn non_negative(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// Read a queue's settings and the store time
pub struct LoadContext {
    pub hash: String,
    pub with_message_id: bool,
}

impl Procedure for LoadContext {
    type Output = Option<QueueContext>;

    fn name(&self) -> &'static str {
        "load_context"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let fields = [field::VT, field::DELAY, field::MAX_SIZE];
        let mut values = tx.hmget(&self.hash, &fields)?.into_iter();

        let mut parsed = [0i64; 3];
        for (slot, name) in parsed.iter_mut().zip(fields) {
            match parse_field(&self.hash, name, values.next().flatten())? {
                Some(value) => *slot = value,
                None => return Ok(None),
            }
        }
        let [vt, delay, max_size] = parsed;

        let now = tx.time();
        Ok(Some(QueueContext {
            vt: non_negative(vt),
            delay: non_negative(delay),
            max_size,
            now,
            new_message_id: self.with_message_id.then(|| id::generate_at(now)),
        }))
    }
}

/// Insert a message into the ordered index and store its body
pub struct Enqueue {
    pub keys: QueueKeys,
    pub id: String,
    pub body: Bytes,
    pub visible_at: u64,
}

impl Procedure for Enqueue {
    /// Queue depth after the insert, `None` if the queue is gone
    type Output = Option<u64>;

    fn name(&self) -> &'static str {
        "enqueue"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let mut values = tx
            .hmget(&self.keys.hash, &[field::VT, field::TOTAL_SENT])?
            .into_iter();
        if values.next().flatten().is_none() {
            return Ok(None);
        }
        parse_field(&self.keys.hash, field::TOTAL_SENT, values.next().flatten())?;
        let depth = tx.zcard(&self.keys.index)?;

        let added = tx.zadd(&self.keys.index, score(self.visible_at), &self.id)?;
        tx.hset(&self.keys.hash, &self.id, self.body)?;
        tx.hincrby(&self.keys.hash, field::TOTAL_SENT, 1)?;
        Ok(Some(depth + u64::from(added)))
    }
}

/// State of the first eligible message, read before anything is written
struct Claim {
    id: String,
    body: Bytes,
    rc_field: String,
    fr_field: String,
    /// Receive count before this delivery
    rc: u64,
    fr: Option<u64>,
}

fn find_claim(
    tx: &mut dyn Transaction,
    keys: &QueueKeys,
    now_ms: u64,
) -> Result<Option<Claim>, StoreError> {
    let Some(id) = tx.zfirst_by_score(&keys.index, score(now_ms))? else {
        return Ok(None);
    };

    let rc_field = message_rc(&id);
    let fr_field = message_fr(&id);
    let mut values = tx
        .hmget(
            &keys.hash,
            &[id.as_str(), rc_field.as_str(), fr_field.as_str(), field::TOTAL_RECV],
        )?
        .into_iter();

    let Some(body) = values.next().flatten() else {
        return Err(StoreError::Internal(format!(
            "message {id} is in the index but has no body"
        )));
    };
    let rc = parse_field(&keys.hash, &rc_field, values.next().flatten())?.map_or(0, non_negative);
    let fr = parse_field(&keys.hash, &fr_field, values.next().flatten())?.map(non_negative);
    parse_field(&keys.hash, field::TOTAL_RECV, values.next().flatten())?;

    if rc > 0 && fr.is_none() {
        return Err(StoreError::Internal(format!(
            "message {id} was received {rc} times but has no first-receive time"
        )));
    }

    Ok(Some(Claim {
        id,
        body,
        rc_field,
        fr_field,
        rc,
        fr,
    }))
}

/// Count the delivery and settle `rc` and `fr`
fn record_delivery(
    tx: &mut dyn Transaction,
    keys: &QueueKeys,
    claim: Claim,
    now_ms: u64,
    persist: bool,
) -> Result<Delivery, StoreError> {
    tx.hincrby(&keys.hash, field::TOTAL_RECV, 1)?;

    let rc = if persist {
        non_negative(tx.hincrby(&keys.hash, &claim.rc_field, 1)?)
    } else {
        claim.rc + 1
    };

    let fr = match claim.fr {
        Some(fr) if rc > 1 => fr,
        _ => {
            if persist {
                tx.hset(&keys.hash, &claim.fr_field, integer_bytes(now_ms))?;
            }
            now_ms
        }
    };

    Ok(Delivery {
        id: claim.id,
        body: claim.body,
        rc,
        fr,
    })
}

/// Claim the first eligible message and hide it until `visible_at`
pub struct Receive {
    pub keys: QueueKeys,
    pub now_ms: u64,
    pub visible_at: u64,
}

impl Procedure for Receive {
    type Output = Option<Delivery>;

    fn name(&self) -> &'static str {
        "receive"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let Some(claim) = find_claim(tx, &self.keys, self.now_ms)? else {
            return Ok(None);
        };

        tx.zadd(&self.keys.index, score(self.visible_at), &claim.id)?;
        record_delivery(tx, &self.keys, claim, self.now_ms, true).map(Some)
    }
}

/// Claim the first eligible message and remove it
pub struct Pop {
    pub keys: QueueKeys,
    pub now_ms: u64,
}

impl Procedure for Pop {
    type Output = Option<Delivery>;

    fn name(&self) -> &'static str {
        "pop"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let Some(claim) = find_claim(tx, &self.keys, self.now_ms)? else {
            return Ok(None);
        };

        let fields = [
            claim.id.clone(),
            claim.rc_field.clone(),
            claim.fr_field.clone(),
        ];
        let delivery = record_delivery(tx, &self.keys, claim, self.now_ms, false)?;

        tx.zrem(&self.keys.index, &delivery.id)?;
        tx.hdel(
            &self.keys.hash,
            &[fields[0].as_str(), fields[1].as_str(), fields[2].as_str()],
        )?;
        Ok(Some(delivery))
    }
}

/// Re-score a message if it is still in the index
pub struct ChangeVisibility {
    pub index: String,
    pub id: String,
    pub visible_at: u64,
}

impl Procedure for ChangeVisibility {
    /// `false` if the message is not in the index
    type Output = bool;

    fn name(&self) -> &'static str {
        "change_visibility"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        if tx.zscore(&self.index, &self.id)?.is_none() {
            return Ok(false);
        }
        tx.zadd(&self.index, score(self.visible_at), &self.id)?;
        Ok(true)
    }
}

/// Remove a message from the index and the field map
pub struct Delete {
    pub keys: QueueKeys,
    pub id: String,
}

impl Procedure for Delete {
    /// `false` if the message was not in the index
    type Output = bool;

    fn name(&self) -> &'static str {
        "delete"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let removed = tx.zrem(&self.keys.index, &self.id)?;
        let rc_field = message_rc(&self.id);
        let fr_field = message_fr(&self.id);
        tx.hdel(
            &self.keys.hash,
            &[self.id.as_str(), rc_field.as_str(), fr_field.as_str()],
        )?;
        Ok(removed)
    }
}

/// Register a queue unless the name is taken
pub struct CreateQueue {
    pub keys: QueueKeys,
    pub queues_set: String,
    pub name: String,
    pub vt: u64,
    pub delay: u64,
    pub max_size: i64,
}

impl Procedure for CreateQueue {
    /// `false` if the queue already existed
    type Output = bool;

    fn name(&self) -> &'static str {
        "create_queue"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let now = tx.time().seconds;

        if !tx.hsetnx(&self.keys.hash, field::VT, integer_bytes(self.vt))? {
            return Ok(false);
        }
        tx.hsetnx(&self.keys.hash, field::DELAY, integer_bytes(self.delay))?;
        tx.hsetnx(&self.keys.hash, field::MAX_SIZE, integer_bytes(self.max_size))?;
        tx.hsetnx(&self.keys.hash, field::CREATED, integer_bytes(now))?;
        tx.hsetnx(&self.keys.hash, field::MODIFIED, integer_bytes(now))?;
        tx.sadd(&self.queues_set, &self.name)?;
        Ok(true)
    }
}

/// Remove a queue and every message in it
pub struct DeleteQueue {
    pub keys: QueueKeys,
    pub queues_set: String,
    pub name: String,
}

impl Procedure for DeleteQueue {
    /// `false` if the queue did not exist
    type Output = bool;

    fn name(&self) -> &'static str {
        "delete_queue"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let exists = tx.hget(&self.keys.hash, field::VT)?.is_some();
        tx.del(&[self.keys.index.as_str(), self.keys.hash.as_str()])?;
        tx.srem(&self.queues_set, &self.name)?;
        Ok(exists)
    }
}

/// Names of all registered queues
pub struct ListQueues {
    pub queues_set: String,
}

impl Procedure for ListQueues {
    type Output = Vec<String>;

    fn name(&self) -> &'static str {
        "list_queues"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        tx.smembers(&self.queues_set)
    }
}

/// Settings, counters and depth of a queue
pub struct ReadAttributes {
    pub keys: QueueKeys,
}

impl Procedure for ReadAttributes {
    type Output = Option<QueueAttributes>;

    fn name(&self) -> &'static str {
        "read_attributes"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        let fields = [
            field::VT,
            field::DELAY,
            field::MAX_SIZE,
            field::TOTAL_RECV,
            field::TOTAL_SENT,
            field::CREATED,
            field::MODIFIED,
        ];
        let raw = tx.hmget(&self.keys.hash, &fields)?;

        let mut parsed = Vec::with_capacity(fields.len());
        for (name, value) in fields.iter().zip(raw) {
            parsed.push(parse_field(&self.keys.hash, name, value)?);
        }
        let Some(vt) = parsed[0] else {
            return Ok(None);
        };
        let value = |i: usize| parsed[i].unwrap_or(0);

        // Hidden means not yet eligible: scored strictly after now, at
        // millisecond precision like every other score comparison.
        let now_ms = tx.time().as_unix_millis();
        let msgs = tx.zcard(&self.keys.index)?;
        let hidden_msgs = tx.zcount(&self.keys.index, score(now_ms).saturating_add(1), i64::MAX)?;

        Ok(Some(QueueAttributes {
            vt: non_negative(vt),
            delay: non_negative(value(1)),
            max_size: value(2),
            total_recv: non_negative(value(3)),
            total_sent: non_negative(value(4)),
            created: non_negative(value(5)),
            modified: non_negative(value(6)),
            msgs,
            hidden_msgs,
        }))
    }
}

/// Overwrite some of a queue's settings
pub struct WriteAttributes {
    pub keys: QueueKeys,
    pub vt: Option<u64>,
    pub delay: Option<u64>,
    pub max_size: Option<i64>,
}

impl Procedure for WriteAttributes {
    /// `false` if the queue does not exist
    type Output = bool;

    fn name(&self) -> &'static str {
        "write_attributes"
    }

    fn run(self, tx: &mut dyn Transaction) -> Result<Self::Output, StoreError> {
        if tx.hget(&self.keys.hash, field::VT)?.is_none() {
            return Ok(false);
        }

        let now = tx.time().seconds;
        tx.hset(&self.keys.hash, field::MODIFIED, integer_bytes(now))?;
        if let Some(vt) = self.vt {
            tx.hset(&self.keys.hash, field::VT, integer_bytes(vt))?;
        }
        if let Some(delay) = self.delay {
            tx.hset(&self.keys.hash, field::DELAY, integer_bytes(delay))?;
        }
        if let Some(max_size) = self.max_size {
            tx.hset(&self.keys.hash, field::MAX_SIZE, integer_bytes(max_size))?;
        }
        Ok(true)
    }
}
