//! Delivery engine
//!
//! Receive, Pop, ChangeVisibility, enqueue and delete, each executed as one
//! atomic procedure. Time is always passed in explicitly; the engine never
//! reads a clock of its own and never retries.

use bytes::Bytes;
use rsmq_core::Namespace;
use std::sync::Arc;
use tracing::debug;

use crate::error::QueueError;
use crate::message::Delivery;
use crate::procedures::{ChangeVisibility, Delete, Enqueue, Pop, Receive};
use crate::storage::Store;

pub struct DeliveryEngine<S> {
    store: Arc<S>,
    namespace: Namespace,
}

impl<S> Clone for DeliveryEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl<S: Store + 'static> DeliveryEngine<S> {
    pub fn new(store: Arc<S>, namespace: Namespace) -> Self {
        Self { store, namespace }
    }

    /// Add a message that becomes eligible at `visible_at` and return the
    /// queue depth afterwards. Nothing is written if the queue is gone.
    pub async fn enqueue(
        &self,
        queue: &str,
        id: &str,
        body: Bytes,
        visible_at: u64,
    ) -> Result<u64, QueueError> {
        let depth = self
            .store
            .execute(Enqueue {
                keys: self.namespace.queue_keys(queue),
                id: id.to_string(),
                body,
                visible_at,
            })
            .await?
            .ok_or_else(|| QueueError::QueueNotFound(queue.to_string()))?;

        debug!(queue = %queue, id = %id, visible_at, depth, "Enqueued message");
        Ok(depth)
    }

    /// Claim the first message eligible at `now_ms` and hide it until
    /// `visible_at`. `None` means nothing was eligible.
    pub async fn receive(
        &self,
        queue: &str,
        now_ms: u64,
        visible_at: u64,
    ) -> Result<Option<Delivery>, QueueError> {
        let delivery = self
            .store
            .execute(Receive {
                keys: self.namespace.queue_keys(queue),
                now_ms,
                visible_at,
            })
            .await?;

        if let Some(d) = &delivery {
            debug!(queue = %queue, id = %d.id, rc = d.rc, visible_at, "Received message");
        }
        Ok(delivery)
    }

    /// Claim the first message eligible at `now_ms` and remove it for good
    pub async fn pop(&self, queue: &str, now_ms: u64) -> Result<Option<Delivery>, QueueError> {
        let delivery = self
            .store
            .execute(Pop {
                keys: self.namespace.queue_keys(queue),
                now_ms,
            })
            .await?;

        if let Some(d) = &delivery {
            debug!(queue = %queue, id = %d.id, rc = d.rc, "Popped message");
        }
        Ok(delivery)
    }

    /// Re-score a message to `visible_at`, whatever its current score
    pub async fn change_visibility(
        &self,
        queue: &str,
        id: &str,
        visible_at: u64,
    ) -> Result<(), QueueError> {
        let found = self
            .store
            .execute(ChangeVisibility {
                index: self.namespace.queue_index(queue),
                id: id.to_string(),
                visible_at,
            })
            .await?;

        if !found {
            return Err(QueueError::MessageNotFound(id.to_string()));
        }
        debug!(queue = %queue, id = %id, visible_at, "Changed message visibility");
        Ok(())
    }

    /// Remove a message; not found if it is absent from the ordered index
    pub async fn delete(&self, queue: &str, id: &str) -> Result<(), QueueError> {
        let found = self
            .store
            .execute(Delete {
                keys: self.namespace.queue_keys(queue),
                id: id.to_string(),
            })
            .await?;

        if !found {
            return Err(QueueError::MessageNotFound(id.to_string()));
        }
        debug!(queue = %queue, id = %id, "Deleted message");
        Ok(())
    }
}
