use affinity_feed_service::{
    services::{catalog::CatalogProvider, session::RedisProfileStore},
    Config, FeedScheduler, IdleFlushJob, InMemoryCatalog, SessionStore,
};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    info!(
        service = %config.service.service_name,
        vocabulary_size = config.affinity.vocabulary_size,
        "Starting service"
    );

    // Load catalog
    let catalog = match &config.feed.catalog_path {
        Some(path) => InMemoryCatalog::from_json_file(path, config.affinity.vocabulary_size)
            .with_context(|| format!("Failed to load catalog from {}", path))?,
        None => {
            warn!("FEED_CATALOG_PATH not set - starting with an empty catalog");
            InMemoryCatalog::new()
        }
    };
    let catalog: Arc<dyn CatalogProvider> = Arc::new(catalog);

    // Initialize Redis client
    let redis_client =
        redis::Client::open(config.redis.url.clone()).context("Failed to create Redis client")?;
    let profile_store = Arc::new(RedisProfileStore::new(
        redis_client,
        config.redis.key_prefix.clone(),
    ));

    let scheduler = FeedScheduler::new(catalog.clone(), &config.affinity, &config.feed);
    let sessions = Arc::new(SessionStore::new(
        scheduler,
        profile_store,
        config.affinity.clone(),
        config.feed.clone(),
    ));

    let flush_job = tokio::spawn(IdleFlushJob::new(sessions.clone(), &config.session).run());

    info!(catalog_size = catalog.len(), "Service ready");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!(online = sessions.online_count(), "Shutting down, flushing sessions");
    flush_job.abort();
    let flushed = sessions.flush_all().await;
    info!(flushed = flushed, "Shutdown complete");

    Ok(())
}
