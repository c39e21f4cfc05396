/// Service layer for products
///
/// This module provides business logic for:
/// - Product service: creation, listing and the cache-aside read path
/// - Compression: the queue-driven image compression worker
pub mod compression;
pub mod products;

pub use products::ProductService;
