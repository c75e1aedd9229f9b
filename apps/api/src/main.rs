mod activities;
mod config;
mod db;
mod errors;
mod feed;
mod llm_client;
mod models;
mod routes;
mod sessions;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::activities::catalog::load_catalog;
use crate::activities::ActivityLibrary;
use crate::config::Config;
use crate::db::{create_pool, ensure_schema};
use crate::feed::categorize::Categorizer;
use crate::feed::ingest::FeedIngestor;
use crate::feed::poller::spawn_poller;
use crate::feed::sources::default_sources;
use crate::feed::store::{ArticleStore, PgArticleStore};
use crate::llm_client::breaker::{BreakerConfig, CircuitBreaker, GuardedGenerator};
use crate::llm_client::{LlmClient, TextGenerator};
use crate::routes::build_router;
use crate::sessions::mirror::S3Mirror;
use crate::sessions::store::SessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Wellness API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    ensure_schema(&db).await?;

    // Activity catalog; a missing or unreadable file leaves the service running on top-up only
    let catalog = match load_catalog(&config.activities_csv) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Activity catalog unavailable, recommendations will be generated: {e}");
            Default::default()
        }
    };
    let library = Arc::new(ActivityLibrary::new(catalog));
    info!("Keyword index holds {} terms", library.index.term_count());

    // Initialize LLM client behind the circuit breaker
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let breaker = Arc::new(CircuitBreaker::new(BreakerConfig {
        failure_threshold: config.breaker_failure_threshold,
        cooldown: Duration::from_secs(config.breaker_cooldown_secs),
    }));
    let generator: Arc<dyn TextGenerator> = Arc::new(GuardedGenerator::new(llm, breaker.clone()));

    // Session documents, optionally mirrored to S3 / MinIO
    let mirror = match &config.s3 {
        Some(s3) => Some(S3Mirror::connect(s3).await),
        None => None,
    };
    let sessions = SessionStore::new(&config.sessions_dir, mirror);
    info!("Session store at {}", config.sessions_dir);

    // Article feed
    let articles: Arc<dyn ArticleStore> = Arc::new(PgArticleStore::new(db));
    let categorizer = if config.feed_ai_categorize {
        Categorizer::with_ai(generator.clone())
    } else {
        Categorizer::source_only()
    };
    let ingestor = Arc::new(FeedIngestor::new(
        default_sources(),
        categorizer,
        articles.clone(),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = (config.feed_poll_secs > 0).then(|| {
        spawn_poller(
            ingestor.clone(),
            Duration::from_secs(config.feed_poll_secs),
            shutdown_rx,
        )
    });

    // Build app state
    let state = AppState {
        library,
        generator,
        breaker,
        sessions,
        articles,
        ingestor,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    if let Some(poller) = poller {
        poller.await.ok();
    }
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
