//! Core types for rsmq
//!
//! This crate provides the pieces shared by every rsmq component:
//! - message identifiers that sort by enqueue time
//! - the store clock abstraction
//! - the key layout of a namespace inside the store
//! - wire-level error codes

pub mod error;
pub mod id;
pub mod keys;
pub mod time;

pub use error::{ErrorCode, RsmqError};
pub use keys::Namespace;
pub use time::{Clock, ManualClock, StoreTime, SystemClock};
