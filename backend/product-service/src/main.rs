/// Product Service - HTTP Server
///
/// Serves the product API. Every created product is published to Kafka for
/// the compression worker.
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use product_service::cache::RedisProductCache;
use product_service::db::PgProductStore;
use product_service::handlers;
use product_service::kafka::KafkaProductPublisher;
use product_service::services::ProductService;
use product_service::Config;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    product_service::logging::init("product_service");

    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    info!(env = %config.app.env, address = %bind_address, "Product service starting");

    let store = PgProductStore::connect(&config.database)
        .await
        .context("Failed to connect to database")?;

    let cache = RedisProductCache::connect(&config.cache.redis_url)
        .await
        .context("Failed to connect to Redis")?;

    let publisher =
        KafkaProductPublisher::new(&config.kafka).context("Failed to create Kafka producer")?;

    let service = Arc::new(ProductService::new(
        Arc::new(store),
        Arc::new(cache),
        Arc::new(publisher),
        config.cache.timeout(),
    ));

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .wrap(TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("HTTP server error")?;

    info!("Product service shutting down");
    Ok(())
}
