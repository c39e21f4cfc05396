/// PostgreSQL product repository
///
/// Tables (see `migrations/0001_products.sql`): `users`, `products`,
/// `images`, `compressed_images`, all with `ON DELETE CASCADE` foreign keys.
use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use super::ProductStore;
use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    CompressedImage, CompressedUpload, Image, NewProduct, Product, ProductFilter, ProductRow,
};

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i64,
    url: String,
    product_id: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct CompressedImageRow {
    id: i64,
    url: String,
    image_id: i64,
    product_id: i64,
}

#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool; fails fast when the database is unreachable
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    async fn load_compressed_images(&self, product_id: i64) -> Result<Vec<CompressedImage>> {
        let compressed = sqlx::query_as::<_, CompressedImage>(
            r#"
            SELECT id, url, image_id
            FROM compressed_images
            WHERE product_id = $1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(compressed)
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (name, description, price, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, price, user_id
            "#,
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut images = Vec::with_capacity(product.image_urls.len());
        for url in &product.image_urls {
            let image = sqlx::query_as::<_, Image>(
                r#"
                INSERT INTO images (url, product_id)
                VALUES ($1, $2)
                RETURNING id, url
                "#,
            )
            .bind(url)
            .bind(row.id)
            .fetch_one(&mut *tx)
            .await?;
            images.push(image);
        }

        tx.commit().await?;

        debug!(product_id = row.id, images = images.len(), "Product committed");
        Ok(row.into_product(images, Vec::new()))
    }

    async fn get_product(&self, product_id: i64) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, description, price, user_id
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let images = self.get_product_images(product_id).await?;
        let compressed = self.load_compressed_images(product_id).await?;

        Ok(Some(row.into_product(images, compressed)))
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT id, name, description, price, user_id FROM products WHERE user_id = ",
        );
        query.push_bind(filter.user_id);

        if let Some(min_price) = filter.min_price {
            query.push(" AND price >= ").push_bind(min_price);
        }
        if let Some(max_price) = filter.max_price {
            query.push(" AND price <= ").push_bind(max_price);
        }
        if let Some(name) = &filter.name_contains {
            query
                .push(" AND name ILIKE ")
                .push_bind(format!("%{}%", escape_like(name)));
        }
        query.push(" ORDER BY id");

        let rows: Vec<ProductRow> = query
            .build_query_as::<ProductRow>()
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();

        let image_rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, url, product_id
            FROM images
            WHERE product_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let compressed_rows = sqlx::query_as::<_, CompressedImageRow>(
            r#"
            SELECT id, url, image_id, product_id
            FROM compressed_images
            WHERE product_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut images: HashMap<i64, Vec<Image>> = HashMap::new();
        for row in image_rows {
            images.entry(row.product_id).or_default().push(Image {
                id: row.id,
                url: row.url,
            });
        }

        let mut compressed: HashMap<i64, Vec<CompressedImage>> = HashMap::new();
        for row in compressed_rows {
            compressed
                .entry(row.product_id)
                .or_default()
                .push(CompressedImage {
                    id: row.id,
                    url: row.url,
                    image_id: row.image_id,
                });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                row.into_product(
                    images.remove(&id).unwrap_or_default(),
                    compressed.remove(&id).unwrap_or_default(),
                )
            })
            .collect())
    }

    async fn get_product_images(&self, product_id: i64) -> Result<Vec<Image>> {
        let images = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, url
            FROM images
            WHERE product_id = $1
            ORDER BY id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(images)
    }

    async fn insert_compressed_images(
        &self,
        product_id: i64,
        uploads: &[CompressedUpload],
    ) -> Result<Vec<CompressedImage>> {
        if uploads.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let record = sqlx::query_as::<_, CompressedImage>(
                r#"
                INSERT INTO compressed_images (url, product_id, image_id)
                VALUES ($1, $2, $3)
                RETURNING id, url, image_id
                "#,
            )
            .bind(&upload.url)
            .bind(product_id)
            .bind(upload.image_id)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(record);
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

/// Escape `ILIKE` wildcards so user input matches literally
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
