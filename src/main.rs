use anyhow::{Context, Result};
use axum::Router;
use services::{
    bucket_registry::BucketRegistry,
    carousel_repository::SqliteCarouselRepository,
    ingestion_service::IngestionService,
    key_generator::SystemKeyGenerator,
    metadata_repository::SqliteMetadataRepository,
    object_store::LocalObjectStore,
};
use state::AppState;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting media-ingest with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = db::connect(
        &cfg.database_url,
        cfg.db_max_connections,
        cfg.db_acquire_timeout,
    )
    .await?;

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Wire the pipeline ---
    let registry =
        BucketRegistry::new(cfg.buckets.clone()).context("validating bucket configuration")?;
    for bucket in registry.ids() {
        match registry.base_url(bucket).flatten() {
            Some(url) => tracing::info!("Managing bucket {} at {}", bucket, url),
            None => tracing::warn!(
                "Bucket {} has no public base URL; uploads to it will fail",
                bucket
            ),
        }
    }
    let objects = Arc::new(LocalObjectStore::new(
        cfg.storage_dir.clone(),
        registry,
        cfg.access_level,
    ));
    let ingestion = IngestionService::new(
        Arc::new(SystemKeyGenerator::new()),
        objects.clone(),
        Arc::new(SqliteMetadataRepository::new(db.clone(), cfg.access_level)),
        Arc::new(SqliteCarouselRepository::new(db.clone(), cfg.access_level)),
    );
    tracing::info!("Storage running with {} access", cfg.access_level);

    let state = AppState {
        ingestion,
        objects,
        db,
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
