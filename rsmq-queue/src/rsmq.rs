//! Queue client: registry, producer and consumer operations

use bytes::Bytes;
use rsmq_core::keys::DEFAULT_NAMESPACE;
use rsmq_core::{id, Namespace, StoreTime};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryEngine;
use crate::error::QueueError;
use crate::message::{Message, QueueAttributes, QueueContext};
use crate::procedures::{CreateQueue, DeleteQueue, ListQueues, LoadContext, ReadAttributes, WriteAttributes};
use crate::storage::Store;
use crate::validate;

/// Client options
#[derive(Debug, Clone, Deserialize)]
pub struct RsmqOptions {
    /// Key prefix for every queue of this client
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Publish the queue depth after every send
    #[serde(default)]
    pub real_time: bool,
}

impl Default for RsmqOptions {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            real_time: false,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Settings of a new queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueSettings {
    /// Visibility timeout (seconds)
    pub vt: u64,
    /// Delay applied to new messages (seconds)
    pub delay: u64,
    /// Maximum body size in bytes, `-1` for unlimited
    pub max_size: i64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            vt: validate::DEFAULT_VT,
            delay: validate::DEFAULT_DELAY,
            max_size: validate::DEFAULT_MAX_SIZE,
        }
    }
}

/// Settings to change on an existing queue; at least one must be set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSettingsUpdate {
    pub vt: Option<u64>,
    pub delay: Option<u64>,
    pub max_size: Option<i64>,
}

impl QueueSettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.vt.is_none() && self.delay.is_none() && self.max_size.is_none()
    }
}

/// Visibility-timeout message queue on top of a shared store
pub struct Rsmq<S> {
    store: Arc<S>,
    namespace: Namespace,
    engine: DeliveryEngine<S>,
    real_time: bool,
}

impl<S: Store + 'static> Rsmq<S> {
    pub fn new(store: Arc<S>, options: RsmqOptions) -> Self {
        let namespace = Namespace::new(options.namespace);
        Self {
            engine: DeliveryEngine::new(store.clone(), namespace.clone()),
            store,
            namespace,
            real_time: options.real_time,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The engine running the delivery procedures
    pub fn engine(&self) -> &DeliveryEngine<S> {
        &self.engine
    }

    /// Current store time
    pub async fn time(&self) -> Result<StoreTime, QueueError> {
        Ok(self.store.time().await?)
    }

    /// Settings of `queue` plus the store time; fails if the queue is missing
    pub async fn context(&self, queue: &str, with_message_id: bool) -> Result<QueueContext, QueueError> {
        self.store
            .execute(LoadContext {
                hash: self.namespace.queue_hash(queue),
                with_message_id,
            })
            .await?
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))
    }

    // === Queue registry ===

    pub async fn create_queue(&self, name: &str, settings: QueueSettings) -> Result<(), QueueError> {
        validate::queue_name(name)?;
        validate::vt(settings.vt)?;
        validate::delay(settings.delay)?;
        validate::max_size(settings.max_size)?;

        let created = self
            .store
            .execute(CreateQueue {
                keys: self.namespace.queue_keys(name),
                queues_set: self.namespace.queues_set(),
                name: name.to_string(),
                vt: settings.vt,
                delay: settings.delay,
                max_size: settings.max_size,
            })
            .await?;

        if !created {
            return Err(QueueError::QueueExists(name.to_string()));
        }
        info!(name = %name, vt = settings.vt, delay = settings.delay, max_size = settings.max_size, "Creating queue");
        Ok(())
    }

    pub async fn delete_queue(&self, name: &str) -> Result<(), QueueError> {
        validate::queue_name(name)?;

        let existed = self
            .store
            .execute(DeleteQueue {
                keys: self.namespace.queue_keys(name),
                queues_set: self.namespace.queues_set(),
                name: name.to_string(),
            })
            .await?;

        if !existed {
            return Err(QueueError::QueueNotFound(name.to_string()));
        }
        info!(name = %name, "Deleting queue");
        Ok(())
    }

    /// Names of all queues in the namespace, sorted
    pub async fn list_queues(&self) -> Result<Vec<String>, QueueError> {
        Ok(self
            .store
            .execute(ListQueues {
                queues_set: self.namespace.queues_set(),
            })
            .await?)
    }

    pub async fn get_queue_attributes(&self, name: &str) -> Result<QueueAttributes, QueueError> {
        validate::queue_name(name)?;

        self.store
            .execute(ReadAttributes {
                keys: self.namespace.queue_keys(name),
            })
            .await?
            .ok_or_else(|| QueueError::QueueNotFound(name.to_string()))
    }

    /// Change some settings of a queue and return its fresh attributes
    pub async fn set_queue_attributes(
        &self,
        name: &str,
        update: QueueSettingsUpdate,
    ) -> Result<QueueAttributes, QueueError> {
        if update.is_empty() {
            return Err(QueueError::NoAttributesSpecified);
        }
        validate::queue_name(name)?;
        update.vt.map(validate::vt).transpose()?;
        update.delay.map(validate::delay).transpose()?;
        update.max_size.map(validate::max_size).transpose()?;

        let found = self
            .store
            .execute(WriteAttributes {
                keys: self.namespace.queue_keys(name),
                vt: update.vt,
                delay: update.delay,
                max_size: update.max_size,
            })
            .await?;

        if !found {
            return Err(QueueError::QueueNotFound(name.to_string()));
        }
        info!(name = %name, ?update, "Updated queue attributes");
        self.get_queue_attributes(name).await
    }

    // === Producer ===

    /// Send a message; `delay` (seconds) overrides the queue default.
    /// Returns the new message's identifier.
    pub async fn send_message(
        &self,
        queue: &str,
        body: impl Into<Bytes>,
        delay: Option<u64>,
    ) -> Result<String, QueueError> {
        let body = body.into();
        validate::queue_name(queue)?;
        delay.map(validate::delay).transpose()?;

        let context = self.context(queue, true).await?;
        if !context.accepts_body(body.len()) {
            return Err(QueueError::InvalidArgument(format!(
                "The maximum message length in bytes is {}.",
                context.max_size
            )));
        }

        let id = context
            .new_message_id
            .clone()
            .unwrap_or_else(|| id::generate_at(context.now));
        let delay_ms = delay.unwrap_or(context.delay) * 1000;
        let visible_at = context.now_ms() + delay_ms;

        let depth = self.engine.enqueue(queue, &id, body, visible_at).await?;

        if self.real_time {
            self.notify(queue, depth).await;
        }
        Ok(id)
    }

    async fn notify(&self, queue: &str, depth: u64) {
        let channel = self.namespace.realtime_channel(queue);
        if let Err(e) = self.store.publish(&channel, depth.to_string()).await {
            warn!(queue = %queue, error = %e, "Failed to publish queue depth");
        }
    }

    /// Subscribe to the depth notifications of `queue`
    pub async fn subscribe(&self, queue: &str) -> Result<broadcast::Receiver<String>, QueueError> {
        validate::queue_name(queue)?;
        Ok(self
            .store
            .subscribe(&self.namespace.realtime_channel(queue))
            .await?)
    }

    // === Consumer ===

    /// Receive a message and hide it for `vt` seconds (queue default if
    /// `None`). `Ok(None)` means the queue has nothing eligible.
    pub async fn receive_message(&self, queue: &str, vt: Option<u64>) -> Result<Option<Message>, QueueError> {
        validate::queue_name(queue)?;
        vt.map(validate::vt).transpose()?;

        let context = self.context(queue, false).await?;
        let now_ms = context.now_ms();
        let visible_at = now_ms + vt.unwrap_or(context.vt) * 1000;

        Ok(self
            .engine
            .receive(queue, now_ms, visible_at)
            .await?
            .map(Message::from))
    }

    /// Receive a message and delete it at once. A popped message is never
    /// delivered again, even if processing it fails.
    pub async fn pop_message(&self, queue: &str) -> Result<Option<Message>, QueueError> {
        validate::queue_name(queue)?;

        let context = self.context(queue, false).await?;
        Ok(self
            .engine
            .pop(queue, context.now_ms())
            .await?
            .map(Message::from))
    }

    /// Hide a message for `vt` seconds from now; `0` exposes it immediately
    pub async fn change_message_visibility(&self, queue: &str, id: &str, vt: u64) -> Result<(), QueueError> {
        validate::queue_name(queue)?;
        validate::message_id(id)?;
        validate::vt(vt)?;

        let context = self.context(queue, false).await?;
        self.engine
            .change_visibility(queue, id, context.now_ms() + vt * 1000)
            .await
    }

    /// Acknowledge a message by removing it
    pub async fn delete_message(&self, queue: &str, id: &str) -> Result<(), QueueError> {
        validate::queue_name(queue)?;
        validate::message_id(id)?;

        debug!(queue = %queue, id = %id, "Deleting message");
        self.engine.delete(queue, id).await
    }
}
