//! camwatch - Scheduled camera object detection relay
//!
//! Main entry point.

use camwatch::{
    detection_pipeline::DetectionPipeline,
    detector::InferenceClient,
    image_fetcher::ImageFetcher,
    keepalive_worker::KeepaliveWorker,
    polling_worker::{CycleCounter, PollingWorker},
    publisher::{DisabledStore, Publisher, RealtimeDbStore, ResultStore},
    state::{AppConfig, AppState, ReadinessHandle},
    web_api,
};
use chrono::Local;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        camera_source = %config.camera_source,
        manual_source = %config.manual_source,
        detector_url = %config.detector_url,
        store_configured = config.store_url.is_some(),
        self_url = %config.self_url,
        temp_dir = %config.temp_dir.display(),
        "Configuration loaded"
    );

    if config.keepalive_is_loopback() {
        tracing::warn!(
            self_url = %config.self_url,
            "SELF_URL points at this host; keepalive pings will not reach the hosting proxy"
        );
    }

    let fetcher = ImageFetcher::new(config.temp_dir.clone(), config.fetch_timeout).await?;

    let detector = Arc::new(InferenceClient::new(config.detector_url.clone())?);

    let store: Arc<dyn ResultStore> = match &config.store_url {
        Some(url) => Arc::new(RealtimeDbStore::new(url.clone(), config.store_auth.clone())?),
        None => {
            tracing::warn!("STORE_URL not set, results will not be published");
            Arc::new(DisabledStore)
        }
    };

    let pipeline = Arc::new(DetectionPipeline::new(
        fetcher,
        detector,
        Publisher::new(store),
        config.thresholds,
        config.detect_concurrency,
    ));

    // Startup readiness checks
    let initial = pipeline.probe_readiness().await;
    if initial.model_ready {
        tracing::info!("Detection model ready");
    } else {
        tracing::error!(detector_url = %config.detector_url, "Detection model not ready");
    }
    if initial.store_ready {
        tracing::info!("Result store ready");
    } else {
        tracing::error!("Result store not ready");
    }
    let readiness = ReadinessHandle::new(initial);

    let cycles = CycleCounter::new();

    let state = AppState {
        config: config.clone(),
        pipeline: pipeline.clone(),
        readiness: readiness.clone(),
        cycles: cycles.clone(),
        started_at: Local::now(),
    };

    // Start detection worker
    PollingWorker::new(
        pipeline,
        config.camera_source.clone(),
        readiness,
        cycles,
        config.polling.clone(),
    )
    .spawn();
    tracing::info!("Detection worker spawned");

    // Start keepalive worker
    KeepaliveWorker::new(&config.self_url, config.keepalive.clone())?.spawn();
    tracing::info!("Keepalive worker spawned");

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
