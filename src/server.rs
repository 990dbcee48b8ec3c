//! HTTP surface: upload endpoints, viewer page, MJPEG feed

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::NO_FRAME_FOUND;
use crate::stream::CONTENT_TYPE;
use crate::{Config, IngestionGateway, RelayError, Result, StreamPacer};

const INDEX_HTML: &str = r#"<html>
  <head><title>Stream</title></head>
  <body>
    <h1>Live Bounding-Boxed Video</h1>
    <img src="/video_feed" width="640" height="480" />
  </body>
</html>
"#;

/// Handles shared by every request
#[derive(Clone)]
pub struct AppState {
    gateway: IngestionGateway,
    pacer: StreamPacer,
    /// Counter for session log ids only; viewers coordinate through the buffer alone.
    sessions: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(gateway: IngestionGateway, pacer: StreamPacer) -> Self {
        Self {
            gateway,
            pacer,
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wire buffer, gateway and pacer from configuration.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Result<Self> {
        let buffer = Arc::new(config.build_buffer()?);
        let gateway = IngestionGateway::new(Arc::clone(&buffer));
        let pacer = StreamPacer::new(buffer, config.tick_interval(), shutdown);
        Ok(Self::new(gateway, pacer))
    }

    pub fn gateway(&self) -> &IngestionGateway {
        &self.gateway
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/upload_frame", post(upload_frame))
        .route("/upload_batch", post(upload_batch))
        .route("/video_feed", get(video_feed))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(config: &Config, shutdown: CancellationToken) -> Result<()> {
    let state = AppState::from_config(config, shutdown.clone())?;
    let app = router(state, config.server.max_body_bytes);

    let bind: SocketAddr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(
        mode = ?config.buffer.mode,
        interval = ?config.tick_interval(),
        "Relay listening on http://{}",
        bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> &'static str {
    "ok"
}

/// POST /upload_frame: multipart field `frame` with raw JPEG bytes
async fn upload_frame(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<&'static str, RelayError> {
    let mut multipart = multipart.map_err(|e| {
        warn!("upload is not multipart: {}", e);
        RelayError::InvalidPayload(NO_FRAME_FOUND)
    })?;
    let data = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("frame") => match field.bytes().await {
                Ok(data) => break data,
                Err(e) => {
                    warn!("failed to read frame field: {}", e);
                    return Err(RelayError::InvalidPayload(NO_FRAME_FOUND));
                }
            },
            Ok(Some(_)) => continue,
            Ok(None) => return Err(RelayError::InvalidPayload(NO_FRAME_FOUND)),
            Err(e) => {
                warn!("malformed multipart upload: {}", e);
                return Err(RelayError::InvalidPayload(NO_FRAME_FOUND));
            }
        }
    };

    state.gateway.accept_single(data).await?;
    Ok("Frame received")
}

/// POST /upload_batch: `{"frames": [base64, ...]}`
async fn upload_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, RelayError> {
    state.gateway.accept_batch(&body).await?;
    Ok("Batch received")
}

/// GET /video_feed: endless multipart/x-mixed-replace stream
async fn video_feed(State(state): State<AppState>) -> Response {
    let session = state.sessions.fetch_add(1, Ordering::Relaxed) + 1;
    let segments = ReceiverStream::new(state.pacer.spawn(session)).map(Ok::<_, Infallible>);

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(segments),
    )
        .into_response()
}
