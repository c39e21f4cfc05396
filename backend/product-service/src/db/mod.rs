/// Database access layer
///
/// This module provides:
/// - The `ProductStore` seam used by the API and the compression worker
/// - The PostgreSQL implementation in `product_repo`
pub mod product_repo;

pub use product_repo::PgProductStore;

use crate::error::Result;
use crate::models::{CompressedImage, CompressedUpload, Image, NewProduct, Product, ProductFilter};
use async_trait::async_trait;

/// Durable product persistence
///
/// Multi-row writes are transactional: either every row of a call is
/// committed or none is.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Whether an owner with this id exists
    async fn user_exists(&self, user_id: i64) -> Result<bool>;

    /// Insert a product and its source images in one transaction
    ///
    /// Returns the committed product with its images in insertion order.
    async fn create_product(&self, product: &NewProduct) -> Result<Product>;

    /// Load a product with images and compressed images
    async fn get_product(&self, product_id: i64) -> Result<Option<Product>>;

    /// Products matching a listing filter, with nested images
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>>;

    /// Source images of a product, ascending by id
    async fn get_product_images(&self, product_id: i64) -> Result<Vec<Image>>;

    /// Insert one compressed image row per upload in one transaction
    async fn insert_compressed_images(
        &self,
        product_id: i64,
        uploads: &[CompressedUpload],
    ) -> Result<Vec<CompressedImage>>;
}
