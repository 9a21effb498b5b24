//! Queue errors

use rsmq_core::{ErrorCode, RsmqError};
use thiserror::Error;

use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue '{0}' does not exist.")]
    QueueNotFound(String),
    #[error("Queue '{0}' already exists.")]
    QueueExists(String),
    #[error("Message with ID '{0}' does not exist.")]
    MessageNotFound(String),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("At least one queue attribute must be specified.")]
    NoAttributesSpecified,
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

impl QueueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::QueueNotFound(_) => ErrorCode::QueueNotFound,
            Self::QueueExists(_) => ErrorCode::QueueExists,
            Self::MessageNotFound(_) => ErrorCode::MessageNotFound,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NoAttributesSpecified => ErrorCode::NoAttributesSpecified,
            Self::Store(_) => ErrorCode::StoreFailure,
        }
    }
}

impl From<&QueueError> for RsmqError {
    fn from(error: &QueueError) -> Self {
        RsmqError::new(error.code(), error.to_string())
    }
}
