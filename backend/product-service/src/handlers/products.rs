/// Product handlers - HTTP endpoints for product operations
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{CreateProductRequest, ListProductsQuery};
use crate::services::ProductService;

/// Create a product and enqueue its images for compression
pub async fn create_product(
    service: web::Data<Arc<ProductService>>,
    req: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    let product = service.create_product(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

/// List a user's products
pub async fn list_products(
    service: web::Data<Arc<ProductService>>,
    query: web::Query<ListProductsQuery>,
) -> Result<HttpResponse> {
    let products = service.list_products(&query).await?;
    Ok(HttpResponse::Ok().json(products))
}

/// Get a product by id
pub async fn get_product(
    service: web::Data<Arc<ProductService>>,
    product_id: web::Path<String>,
) -> Result<HttpResponse> {
    let product_id: i64 = product_id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid product id".to_string()))?;

    let product = service.get_product(product_id).await?;
    Ok(HttpResponse::Ok().json(product))
}
