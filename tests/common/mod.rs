//! Throwaway HTTP servers standing in for the camera, detector and store

#![allow(dead_code)]

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use camwatch::models::ResultRecord;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(w, h, Rgb([200, 20, 20]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

pub fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("camwatch-it-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn dir_is_empty(dir: &PathBuf) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

/// Camera with `/capture` (PNG), `/slow` (sleeps), `/missing` (404), `/garbage` (not an image)
pub async fn fake_camera() -> String {
    let app = Router::new()
        .route("/capture", get(|| async { png_bytes(320, 240) }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                png_bytes(8, 8)
            }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/garbage", get(|| async { b"<html>oops</html>".to_vec() }));
    serve(app).await
}

/// Inference server answering `/healthz`, `/v1/labels` and `/v1/detect`
pub async fn fake_detector(detections: Value) -> String {
    let app = Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route(
            "/v1/labels",
            get(|| async { Json(json!({ "names": ["person", "bicycle", "car", "cat"] })) }),
        )
        .route(
            "/v1/detect",
            post(move || {
                let detections = detections.clone();
                async move { Json(json!({ "detections": detections })) }
            }),
        );
    serve(app).await
}

#[derive(Debug, Clone)]
pub struct StoreWrite {
    pub method: &'static str,
    pub path: &'static str,
    pub auth: Option<String>,
    pub record: ResultRecord,
}

pub type StoreLog = Arc<Mutex<Vec<StoreWrite>>>;

/// Realtime-Database-shaped store recording every write
pub async fn fake_store() -> (String, StoreLog) {
    let log: StoreLog = Arc::new(Mutex::new(Vec::new()));

    async fn put_latest(
        State(log): State<StoreLog>,
        Query(q): Query<HashMap<String, String>>,
        Json(record): Json<ResultRecord>,
    ) -> Json<Value> {
        log.lock().await.push(StoreWrite {
            method: "PUT",
            path: "detections/latest",
            auth: q.get("auth").cloned(),
            record: record.clone(),
        });
        Json(serde_json::to_value(record).unwrap())
    }

    async fn post_history(
        State(log): State<StoreLog>,
        Query(q): Query<HashMap<String, String>>,
        Json(record): Json<ResultRecord>,
    ) -> Json<Value> {
        let mut log = log.lock().await;
        log.push(StoreWrite {
            method: "POST",
            path: "detections/history",
            auth: q.get("auth").cloned(),
            record,
        });
        Json(json!({ "name": format!("-N{}", log.len()) }))
    }

    let app = Router::new()
        .route(
            "/detections/latest.json",
            put(put_latest).get(|| async { Json(json!(true)) }),
        )
        .route("/detections/history.json", post(post_history))
        .with_state(log.clone());

    (serve(app).await, log)
}
