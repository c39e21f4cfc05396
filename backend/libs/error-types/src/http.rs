//! HTTP error response body

use crate::error_codes;
use crate::validation::FieldErrors;
use serde::{Deserialize, Serialize};

/// Standard HTTP error response format
///
/// Exactly one of `error` (a single message) or `errors` (field-level
/// messages) is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status code
    pub status: u16,

    /// Error code for client handling
    pub code: String,

    /// Human-readable error message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Field-level validation messages keyed by JSON field name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            error: Some(message.into()),
            errors: None,
        }
    }

    /// 400 response listing every failed field
    pub fn validation(errors: FieldErrors) -> Self {
        Self {
            status: 400,
            code: error_codes::VALIDATION_FAILED.to_string(),
            error: None,
            errors: Some(errors),
        }
    }
}
