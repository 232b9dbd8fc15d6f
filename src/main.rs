use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use wayfarer_api::config::Config;
use wayfarer_api::db;
use wayfarer_api::error;
use wayfarer_api::events::EventPublisher;
use wayfarer_api::repos::{
    ActivityRepository, CatalogRepository, HistoryStore, HttpHistoryStore, PgActivityRepository,
    PgCatalogRepository,
};
use wayfarer_api::routes::{create_router, AppState};
use wayfarer_api::services::collaborative::CollaborativeRecommender;
use wayfarer_api::services::content_based::ContentBasedRecommender;
use wayfarer_api::services::profile::ProfileBuilder;
use wayfarer_api::services::profile_cache::ProfileCache;
use wayfarer_api::services::search_intent::SearchClassifier;
use wayfarer_api::services::trending::TrendingRecommender;
use wayfarer_api::services::RecommendationEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    error::expose_internal_errors(config.expose_internal_errors);

    let db_pool = Arc::new(db::create_pool(&config.database_url).await?);
    let redis_client = db::create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = db::Cache::new(redis_client).await;

    let activity: Arc<dyn ActivityRepository> =
        Arc::new(PgActivityRepository::new(db_pool.clone()));
    let catalog: Arc<dyn CatalogRepository> = Arc::new(PgCatalogRepository::new(db_pool));
    let history: Arc<dyn HistoryStore> = Arc::new(HttpHistoryStore::new(
        config.history_api_url.clone(),
        config.history_api_key.clone(),
    ));

    let builder = ProfileBuilder::new(activity.clone(), config.persona_rules()?);
    let profiles = ProfileCache::new(
        builder,
        Some(cache.clone()),
        Duration::from_secs(config.profile_ttl_secs),
    );

    let engine = RecommendationEngine::new(
        profiles.clone(),
        ContentBasedRecommender::new(catalog.clone()),
        CollaborativeRecommender::new(
            activity,
            catalog.clone(),
            profiles,
            config.peer_pool_size,
            config.peer_concurrency,
        ),
        TrendingRecommender::new(catalog.clone(), Some(cache), config.trending_ttl_secs),
        SearchClassifier::with_catalog(catalog.clone()),
        catalog,
        history,
        EventPublisher::default(),
    );

    let state = AppState {
        engine: Arc::new(engine),
    };
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "wayfarer-api listening");
    axum::serve(listener, app).await?;

    cache_writer.shutdown().await;
    Ok(())
}
