//! Visibility-timeout message queue for rsmq
//!
//! Provides queues on top of a shared store with support for:
//! - CreateQueue, DeleteQueue, ListQueues, queue attributes
//! - SendMessage with per-message delay
//! - ReceiveMessage (peek and hide), PopMessage (peek and delete)
//! - ChangeMessageVisibility, DeleteMessage
//! - Real-time queue depth notifications

mod delivery;
pub mod error;
pub mod handlers;
pub mod message;
pub mod procedures;
mod rsmq;
pub mod storage;
pub mod validate;

pub use delivery::DeliveryEngine;
pub use error::QueueError;
pub use handlers::{handle_request, TARGET_HEADER};
pub use message::{Delivery, Message, QueueAttributes, QueueContext};
pub use rsmq::{QueueSettings, QueueSettingsUpdate, Rsmq, RsmqOptions};
pub use storage::{EphemeralStore, Store, StoreError};

#[cfg(test)]
mod rsmq_tests;
