mod common;

use camwatch::detection_pipeline::DetectionPipeline;
use camwatch::detector::{InferenceClient, Thresholds};
use camwatch::image_fetcher::{ImageFetcher, ImageSource};
use camwatch::polling_worker::{CycleCounter, CycleResult, PollingWorker};
use camwatch::publisher::{MemoryStore, Publisher};
use camwatch::state::{AppConfig, AppState, PollingConfig, Readiness, ReadinessHandle};
use camwatch::web_api;
use chrono::Local;
use common::{fake_camera, fake_detector, scratch_dir, serve};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Service {
    base: String,
    state: AppState,
    store: Arc<MemoryStore>,
}

async fn start_service(camera_path: &str, readiness: Readiness) -> Service {
    let camera = fake_camera().await;
    let detector_url = fake_detector(json!([{ "class": 1, "confidence": 0.919 }])).await;
    let source = ImageSource::Url(format!("{}{}", camera, camera_path));

    let config = AppConfig {
        camera_source: source.clone(),
        manual_source: source,
        temp_dir: scratch_dir(),
        ..AppConfig::default()
    };

    let detector = Arc::new(InferenceClient::new(detector_url).unwrap());
    detector.load_labels().await.unwrap();
    let store = Arc::new(MemoryStore::new());
    let fetcher = ImageFetcher::new(config.temp_dir.clone(), Duration::from_secs(2))
        .await
        .unwrap();
    let pipeline = Arc::new(DetectionPipeline::new(
        fetcher,
        detector,
        Publisher::new(store.clone()),
        Thresholds::default(),
        1,
    ));

    let state = AppState {
        config,
        pipeline,
        readiness: ReadinessHandle::new(readiness),
        cycles: CycleCounter::new(),
        started_at: Local::now(),
    };
    let base = serve(web_api::create_router(state.clone())).await;

    Service { base, state, store }
}

async fn get_json(url: String) -> (u16, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_ping() {
    let svc = start_service("/capture", Readiness::ready()).await;

    let (status, body) = get_json(format!("{}/ping", svc.base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "pong");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_health_reports_readiness() {
    let svc = start_service(
        "/capture",
        Readiness {
            model_ready: true,
            store_ready: false,
        },
    )
    .await;

    let (status, body) = get_json(format!("{}/health", svc.base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_ready"], true);
    assert_eq!(body["store_ready"], false);
}

#[tokio::test]
async fn test_manual_detect_publishes_record() {
    let svc = start_service("/capture", Readiness::ready()).await;

    let (status, body) = get_json(format!("{}/detect", svc.base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "Detected");
    assert_eq!(body["detections_count"], 1);
    assert_eq!(body["first_label"], "bicycle");
    assert_eq!(body["all_detections"][0]["confidence"], 0.92);
    assert_eq!(body["published"], true);

    assert_eq!(svc.store.history().await.len(), 1);
    assert_eq!(
        svc.store.latest().await.unwrap().first_label.as_deref(),
        Some("bicycle")
    );
}

#[tokio::test]
async fn test_manual_detect_fetch_failure_is_error_record() {
    let svc = start_service("/missing", Readiness::ready()).await;

    let (status, body) = get_json(format!("{}/detect", svc.base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "Error");
    assert_eq!(body["error"], "Image fetch failed with HTTP 404");
    assert_eq!(body["detections_count"], 0);
    assert!(body.get("first_label").is_none());
    assert!(body.get("all_detections").is_none());
}

#[tokio::test]
async fn test_manual_detect_not_ready() {
    let svc = start_service(
        "/capture",
        Readiness {
            model_ready: false,
            store_ready: true,
        },
    )
    .await;

    let (status, body) = get_json(format!("{}/detect", svc.base)).await;
    assert_eq!(status, 503);
    assert_eq!(body["error_code"], "NOT_READY");
    assert_eq!(body["message"], "Not ready: Detection model not loaded");
    assert!(svc.store.history().await.is_empty());
}

#[tokio::test]
async fn test_status_reports_worker_cycles() {
    let svc = start_service("/capture", Readiness::ready()).await;

    let worker = PollingWorker::new(
        svc.state.pipeline.clone(),
        svc.state.config.camera_source.clone(),
        svc.state.readiness.clone(),
        svc.state.cycles.clone(),
        PollingConfig::default(),
    );
    let (result, delay) = worker.run_cycle().await;
    assert!(matches!(result, CycleResult::Completed { published: true, .. }));
    assert_eq!(delay, Duration::from_secs(30));

    let (status, body) = get_json(format!("{}/status", svc.base)).await;
    assert_eq!(status, 200);
    assert_eq!(body["service"], "Object Detection");
    assert_eq!(body["status"], "running");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["store_connected"], true);
    assert_eq!(body["detection_cycle_count"], 1);
}

#[tokio::test]
async fn test_home_lists_endpoints() {
    let svc = start_service("/capture", Readiness::ready()).await;

    let body = reqwest::get(format!("{}/", svc.base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("/detect"));
    assert!(body.contains("/health"));
}
