//! Error types for the CMS todo client.
//!
//! # Design
//! Status codes the UI reacts to differently get their own variant: 401 ends
//! the session, 404 means the record is gone, 429 asks the user to wait, and
//! a 400 carrying field details is shown as a validation message. Every other
//! non-2xx response lands in `HttpError` with the CMS error name and message.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field-level complaint from the CMS validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub path: Vec<String>,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.join("."), self.message)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by `TodoClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server returned 404. The requested todo does not exist, or it was
    /// deleted by another session.
    #[error("resource not found")]
    NotFound,

    /// The server returned 401. The stored token is missing or expired.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("rate limit exceeded, please try again later")]
    RateLimited,

    /// The server rejected the payload and named the offending fields.
    #[error("validation error: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Any other non-2xx status.
    #[error("HTTP {status}: {name}: {message}")]
    HttpError {
        status: u16,
        name: String,
        message: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// HTTP status behind this error, when it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::NotFound => Some(404),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::RateLimited => Some(429),
            ApiError::Validation(_) => Some(400),
            ApiError::HttpError { status, .. } => Some(*status),
            ApiError::DeserializationError(_) | ApiError::SerializationError(_) => None,
        }
    }
}
