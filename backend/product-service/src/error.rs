/// Error types for Product Service
///
/// Every failure a handler can return maps onto one HTTP status and one
/// `error_types::ErrorResponse` body.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use error_types::{error_codes, ErrorResponse, FieldErrors};
use std::fmt;

/// Result type for product-service operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Database operation failed
    DatabaseError(String),

    /// Cache operation failed
    CacheError(String),

    /// Queue publish or consume failed
    QueueError(String),

    /// Blob store operation failed
    StorageError(String),

    /// Request payload failed field validation
    Validation(FieldErrors),

    /// Resource not found
    NotFound(String),

    /// Bad request
    BadRequest(String),

    /// Internal server error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::CacheError(msg) => write!(f, "Cache error: {}", msg),
            AppError::QueueError(msg) => write!(f, "Queue error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::Validation(errors) => {
                write!(f, "Validation failed for {} field(s)", errors.len())
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    /// Message shown to API clients
    ///
    /// Client errors carry their own message; server errors carry the
    /// handler-level summary set at the call site.
    pub fn client_message(&self) -> &str {
        match self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Internal(msg) => msg,
            AppError::DatabaseError(_)
            | AppError::CacheError(_)
            | AppError::QueueError(_)
            | AppError::StorageError(_) => "Internal server error",
            AppError::Validation(_) => "Validation failed",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::DatabaseError(_)
            | AppError::CacheError(_)
            | AppError::QueueError(_)
            | AppError::StorageError(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let code = match self {
            AppError::DatabaseError(_) => error_codes::DATABASE_ERROR,
            AppError::CacheError(_) => error_codes::CACHE_ERROR,
            AppError::QueueError(_) => error_codes::QUEUE_ERROR,
            AppError::StorageError(_) => error_codes::STORAGE_ERROR,
            AppError::Validation(_) => error_codes::VALIDATION_FAILED,
            AppError::NotFound(_) => error_codes::NOT_FOUND,
            AppError::BadRequest(_) => error_codes::INVALID_REQUEST,
            AppError::Internal(_) => error_codes::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            AppError::Validation(errors) => ErrorResponse::validation(errors.clone()),
            other => ErrorResponse::new(status.as_u16(), code, other.client_message()),
        };

        HttpResponse::build(status).json(body)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(FieldErrors::from_validation(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_not_found_body_names_resource() {
        let response = AppError::NotFound("Product not found".to_string()).error_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Product not found");
        assert_eq!(json["code"], "NOT_FOUND");
    }

    #[actix_rt::test]
    async fn test_database_error_hides_details() {
        let response =
            AppError::DatabaseError("relation \"products\" does not exist".into()).error_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let mut errors = FieldErrors::new();
        errors.insert("product_price", "product_price must be greater than 0");
        assert_eq!(
            AppError::Validation(errors).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
