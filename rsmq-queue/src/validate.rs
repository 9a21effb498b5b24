//! Argument validation, applied before any store access

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::QueueError;

pub const DEFAULT_VT: u64 = 30;
pub const DEFAULT_DELAY: u64 = 0;
pub const DEFAULT_MAX_SIZE: i64 = 65_536;

pub const MAX_VT: u64 = 9_999_999;
pub const MAX_DELAY: u64 = 9_999_999;

pub const MIN_MAX_SIZE: i64 = 1_024;
pub const MAX_MAX_SIZE: i64 = 65_536;
pub const MAX_SIZE_UNLIMITED: i64 = -1;

static QUEUE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]{1,160}$").expect("valid queue name pattern"));

static MESSAGE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9:]{32}$").expect("valid message id pattern"));

pub fn queue_name(name: &str) -> Result<(), QueueError> {
    if QUEUE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(QueueError::InvalidArgument(
            "Incorrect format for queue name.".to_string(),
        ))
    }
}

pub fn message_id(id: &str) -> Result<(), QueueError> {
    if MESSAGE_ID.is_match(id) {
        Ok(())
    } else {
        Err(QueueError::InvalidArgument(
            "Incorrect format for message ID.".to_string(),
        ))
    }
}

pub fn vt(vt: u64) -> Result<(), QueueError> {
    if vt <= MAX_VT {
        Ok(())
    } else {
        Err(QueueError::InvalidArgument(
            "Incorrect value for vt parameter.".to_string(),
        ))
    }
}

pub fn delay(delay: u64) -> Result<(), QueueError> {
    if delay <= MAX_DELAY {
        Ok(())
    } else {
        Err(QueueError::InvalidArgument(
            "Incorrect value for delay parameter.".to_string(),
        ))
    }
}

pub fn max_size(max_size: i64) -> Result<(), QueueError> {
    if max_size == MAX_SIZE_UNLIMITED || (MIN_MAX_SIZE..=MAX_MAX_SIZE).contains(&max_size) {
        Ok(())
    } else {
        Err(QueueError::InvalidArgument(
            "Incorrect value for max_size parameter.".to_string(),
        ))
    }
}
