//! End-to-end tests for the HTTP surface
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`,
//! no sockets involved.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use framerelay::server::{self, AppState};
use framerelay::{BufferMode, Config};

// ── Shared helpers ───────────────────────────────────────────────────

const FORM_BOUNDARY: &str = "relaytestboundary";

fn app(config: &Config) -> (Router, AppState) {
    let state = AppState::from_config(config, CancellationToken::new()).unwrap();
    (server::router(state.clone(), config.server.max_body_bytes), state)
}

fn latest_config() -> Config {
    let mut config = Config::default();
    config.stream.interval_ms = Some(10);
    config
}

fn fifo_config(capacity: usize) -> Config {
    let mut config = Config::default();
    config.buffer.mode = BufferMode::Fifo;
    config.buffer.capacity = capacity;
    config.stream.interval_ms = Some(10);
    config.stream.dequeue_timeout_ms = 50;
    config
}

fn multipart_request(field: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{FORM_BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"frame.jpg\"\r\n\
         Content-Type: image/jpeg\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{FORM_BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload_frame")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={FORM_BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn batch_request(json: serde_json::Value) -> Request<Body> {
    Request::post("/upload_batch")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn feed_request() -> Request<Body> {
    Request::get("/video_feed").body(Body::empty()).unwrap()
}

async fn text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn segment(payload: &[u8]) -> Bytes {
    let mut part = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    part.extend_from_slice(payload);
    part.extend_from_slice(b"\r\n");
    Bytes::from(part)
}

/// Next data chunk of a streaming body; each chunk is one segment.
async fn next_segment(body: &mut Body) -> Bytes {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("stream stalled")
            .expect("stream ended")
            .unwrap();
        if let Ok(data) = frame.into_data() {
            return data;
        }
    }
}

// ── Page + health ────────────────────────────────────────────────────

#[tokio::test]
async fn index_embeds_video_feed() {
    let (router, _) = app(&latest_config());
    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await.contains(r#"<img src="/video_feed""#));
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (router, _) = app(&latest_config());
    let response = router
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "ok");
}

// ── Single-frame uploads ─────────────────────────────────────────────

#[tokio::test]
async fn uploaded_frame_is_first_streamed_segment() {
    let (router, _) = app(&latest_config());
    let f1 = b"\xff\xd8\xff\xe0frame-one\xff\xd9";

    let response = router
        .clone()
        .oneshot(multipart_request("frame", f1))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Frame received");

    let response = router.oneshot(feed_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );

    let mut body = response.into_body();
    assert_eq!(next_segment(&mut body).await, segment(f1));
    // latest-only keeps re-sending the stored frame
    assert_eq!(next_segment(&mut body).await, segment(f1));
}

#[tokio::test]
async fn missing_frame_field_is_rejected() {
    let (router, state) = app(&latest_config());
    let response = router
        .clone()
        .oneshot(multipart_request("image", b"jpeg"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "No frame found");

    let not_multipart = Request::post("/upload_frame")
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(Body::from("jpeg"))
        .unwrap();
    let response = router.oneshot(not_multipart).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "No frame found");

    assert!(state.gateway().buffer().is_empty());
}

#[tokio::test]
async fn empty_frame_field_is_rejected() {
    let (router, state) = app(&latest_config());
    let response = router.oneshot(multipart_request("frame", b"")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "No frame found");
    assert!(state.gateway().buffer().is_empty());
}

// ── Batch uploads ────────────────────────────────────────────────────

#[tokio::test]
async fn batch_streams_valid_entries_in_order() {
    let (router, _) = app(&fifo_config(300));
    let batch = serde_json::json!({
        "frames": [STANDARD.encode(b"F1"), "<invalid>", STANDARD.encode(b"F2")]
    });

    let response = router.clone().oneshot(batch_request(batch)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Batch received");

    let response = router.oneshot(feed_request()).await.unwrap();
    let mut body = response.into_body();
    assert_eq!(next_segment(&mut body).await, segment(b"F1"));
    assert_eq!(next_segment(&mut body).await, segment(b"F2"));
}

#[tokio::test]
async fn batch_without_frames_key_is_invalid() {
    let (router, state) = app(&fifo_config(300));
    let response = router
        .clone()
        .oneshot(batch_request(serde_json::json!({ "images": [] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid payload");

    let garbage = Request::post("/upload_batch")
        .body(Body::from("frames=abc"))
        .unwrap();
    let response = router.oneshot(garbage).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid payload");

    assert!(state.gateway().buffer().is_empty());
}

#[tokio::test]
async fn overflowing_batch_still_succeeds() {
    let (router, state) = app(&fifo_config(300));
    let frames: Vec<String> = (0..301u32)
        .map(|i| STANDARD.encode(i.to_be_bytes()))
        .collect();

    let response = router
        .oneshot(batch_request(serde_json::json!({ "frames": frames })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "Batch received");

    let buffer = state.gateway().buffer();
    assert_eq!(buffer.len(), 300);
    assert_eq!(buffer.stats().frames_dropped, 1);
}

#[tokio::test]
async fn single_upload_feeds_fifo_too() {
    let (router, _) = app(&fifo_config(4));
    let response = router
        .clone()
        .oneshot(multipart_request("frame", b"solo"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router.oneshot(feed_request()).await.unwrap();
    let mut body = response.into_body();
    assert_eq!(next_segment(&mut body).await, segment(b"solo"));
}

// ── Session lifecycle ────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_ends_open_streams() {
    let config = latest_config();
    let shutdown = CancellationToken::new();
    let state = AppState::from_config(&config, shutdown.clone()).unwrap();
    let router = server::router(state, config.server.max_body_bytes);

    let response = router.oneshot(feed_request()).await.unwrap();
    let mut body = response.into_body();

    shutdown.cancel();
    let end = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .expect("stream did not close");
    assert!(end.is_none());
}
