//! Wire-level error codes and formatting

use serde::Serialize;
use thiserror::Error;

/// Error codes surfaced to rsmq callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Queue registry
    QueueNotFound,
    QueueExists,
    NoAttributesSpecified,

    // Messages
    MessageNotFound,

    // Caller input
    InvalidArgument,
    MissingParameter,
    UnknownOperation,

    // Store
    StoreFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueNotFound => "QueueNotFound",
            Self::QueueExists => "QueueExists",
            Self::NoAttributesSpecified => "NoAttributesSpecified",
            Self::MessageNotFound => "MessageNotFound",
            Self::InvalidArgument => "InvalidArgument",
            Self::MissingParameter => "MissingParameter",
            Self::UnknownOperation => "UnknownOperation",
            Self::StoreFailure => "StoreFailure",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::QueueNotFound | Self::MessageNotFound => 404,
            Self::QueueExists => 409,
            Self::NoAttributesSpecified
            | Self::InvalidArgument
            | Self::MissingParameter
            | Self::UnknownOperation => 400,
            Self::StoreFailure => 503,
        }
    }
}

/// Error as reported over the wire
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct RsmqError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: String,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RsmqError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Format as a JSON error body
    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            #[serde(rename = "__type")]
            error_type: &'a str,
            message: &'a str,
            #[serde(rename = "RequestId")]
            request_id: &'a str,
        }

        let error = JsonError {
            error_type: self.code.as_str(),
            message: &self.message,
            request_id: &self.request_id,
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(r#"{{"__type":"{}","message":"{}"}}"#, self.code.as_str(), self.message)
        })
    }
}
