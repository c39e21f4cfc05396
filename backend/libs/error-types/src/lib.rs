//! Shared error payloads for the product platform services
//!
//! Every HTTP-facing service renders failures through [`ErrorResponse`] so
//! clients see a single body shape:
//!
//! ```json
//! { "status": 404, "code": "NOT_FOUND", "error": "Product not found" }
//! { "status": 400, "code": "VALIDATION_FAILED", "errors": { "product_price": "product_price must be greater than 0" } }
//! ```

pub mod http;
pub mod validation;

pub use http::ErrorResponse;
pub use validation::{FieldErrors, MessageTemplate, DEFAULT_TEMPLATES};

/// Machine readable error codes carried in [`ErrorResponse::code`]
pub mod error_codes {
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const CACHE_ERROR: &str = "CACHE_ERROR";
    pub const QUEUE_ERROR: &str = "QUEUE_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}
