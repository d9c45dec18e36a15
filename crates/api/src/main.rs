mod config;
mod metrics;
mod routes;

use anyhow::Context;
use axum::http::HeaderValue;
use scoring::{InMemoryStatusStore, SnapshotStore};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, CorsConfig, LoggingConfig};
use crate::metrics::{Metrics, ReloadOutcome, TimedOperation};
use crate::routes::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().await?;
    init_tracing(&config.logging);

    info!(
        preset = ?config.data.preset,
        corpus = ?config.data.corpus,
        "Starting fraud network API"
    );

    let store = SnapshotStore::new(
        config.pipeline.clone(),
        config.data.clone(),
        Arc::new(InMemoryStatusStore::new()),
    )?;
    let state = AppState {
        store: Arc::new(store),
        metrics: Metrics::new(),
    };

    // Serve even if the first run fails; data routes answer 503 until a reload succeeds.
    let timer = TimedOperation::start();
    match state.store.reload().await {
        Ok(snapshot) => {
            state.metrics.record_reload(ReloadOutcome::Succeeded, timer.elapsed());
            info!(
                entities = snapshot.metadata.entity_count,
                communities = snapshot.metadata.community_count,
                "Initial analysis complete"
            );
        }
        Err(e) => {
            state.metrics.record_reload(ReloadOutcome::Failed, timer.elapsed());
            error!(error = %e, "Initial analysis failed");
        }
    }

    let app = routes::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config.cors)),
    );

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {}", address))?;

    info!("Server listening on http://{}", address);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if cors.allowed_origins.is_empty() || cors.allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
