/// HTTP handlers for product endpoints
///
/// Routes:
/// - `POST /products`, `GET /products`, `GET /products/{id}`
/// - `GET /health`, `GET /metrics`
pub mod products;

pub use products::{create_product, get_product, list_products};

use actix_web::{web, HttpResponse};
use tracing::info;

use crate::error::AppError;
use crate::metrics::serve_metrics;

/// Liveness probe
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "ok"}))
}

/// Register every route and extractor config on an app or scope
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(serve_metrics))
        .service(
            web::scope("/products")
                .route("", web::post().to(create_product))
                .route("", web::get().to(list_products))
                .route("/{id}", web::get().to(get_product)),
        );
}

/// Undecodable bodies become a plain 400 "Invalid request"
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        info!(error = %err, "Failed to decode request body");
        AppError::BadRequest("Invalid request".to_string()).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        info!(error = %err, "Failed to decode query string");
        AppError::BadRequest("Invalid request".to_string()).into()
    })
}
