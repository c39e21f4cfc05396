/// Data models for product-service
///
/// This module defines structures for:
/// - Product: the API and cache representation, with nested images
/// - Request payloads and query parameters for the HTTP API
/// - Records exchanged between the compression worker and the store
use serde::{Deserialize, Serialize};
use validator::Validate;

// ========================================
// Product Models
// ========================================

/// Source image attached at product creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub url: String,
}

/// JPEG copy of a source image produced by the compression worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompressedImage {
    pub id: i64,
    pub url: String,
    pub image_id: i64,
}

/// Product snapshot as served by the API and stored in the cache
///
/// The JSON form is the cache value, so every field survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: i64,
    pub product_name: String,
    pub product_description: String,
    pub product_price: f64,
    pub user_id: i64,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub compressed_images: Vec<CompressedImage>,
}

/// Product row without its image collections
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub user_id: i64,
}

impl ProductRow {
    pub fn into_product(self, images: Vec<Image>, compressed_images: Vec<CompressedImage>) -> Product {
        Product {
            product_id: self.id,
            product_name: self.name,
            product_description: self.description,
            product_price: self.price,
            user_id: self.user_id,
            images,
            compressed_images,
        }
    }
}

// ========================================
// Request Models
// ========================================

/// `POST /products` payload
///
/// Every field is optional at the serde level so a missing field surfaces as
/// a `required` field error rather than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    /// Ids start at 1, so 0 counts as missing
    #[validate(required, range(min = 1, code = "required"))]
    pub user_id: Option<i64>,

    #[validate(required, length(min = 1, code = "required"))]
    pub product_name: Option<String>,

    #[validate(required, length(min = 1, code = "required"))]
    pub product_description: Option<String>,

    #[validate(required, range(exclusive_min = 0.0, code = "gt"))]
    pub product_price: Option<f64>,

    #[validate(required)]
    pub product_images: Option<Vec<String>>,
}

/// Validated product ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub image_urls: Vec<String>,
}

impl CreateProductRequest {
    /// Run field validation and unwrap into a [`NewProduct`]
    pub fn into_new_product(self) -> Result<NewProduct, validator::ValidationErrors> {
        self.validate()?;

        // validate() guarantees every required field is present
        Ok(NewProduct {
            user_id: self.user_id.unwrap_or_default(),
            name: self.product_name.unwrap_or_default(),
            description: self.product_description.unwrap_or_default(),
            price: self.product_price.unwrap_or_default(),
            image_urls: self.product_images.unwrap_or_default(),
        })
    }
}

/// Raw `GET /products` query parameters
///
/// Kept as strings so each malformed parameter gets its own error message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListProductsQuery {
    pub user_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub product_name: Option<String>,
}

/// Parsed listing filter handed to the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    pub user_id: i64,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub name_contains: Option<String>,
}

// ========================================
// Worker Models
// ========================================

/// Uploaded JPEG paired with the source image it was derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedUpload {
    pub url: String,
    pub image_id: i64,
}
