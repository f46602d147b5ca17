//! Loopback HTTP ingest endpoint: `POST /review`.
//!
//! Status mapping:
//! - 200: review stored, empty body.
//! - 400: body is not a review (parser message in the body), or the ingest
//!   service rejected the payload.
//! - 405: any method other than POST.
//! - 413: body larger than [`MAX_BODY_BYTES`].
//! - 500: the store failed.
//!
//! Connections are served by hyper directly so the header-read timeout can be
//! set; it also bounds how long an idle keep-alive connection is held.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::ingest::{IngestError, IngestService, Validation};
use crate::types::Review;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(2);
const BODY_READ_TIMEOUT: Duration = Duration::from_secs(5);
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid review JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Json(_) => StatusCode::BAD_REQUEST,
            Self::Ingest(e) if e.is_producer_error() => StatusCode::BAD_REQUEST,
            Self::Ingest(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "review ingest failed");
        } else {
            warn!(error = %self, "review rejected");
        }
        (status, self.to_string()).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    ingest: IngestService,
    validation: Validation,
}

/// Builds the ingest router.
///
/// `validation` is [`Validation::Lenient`] unless strict HTTP ingest is
/// configured.
pub fn router(ingest: IngestService, validation: Validation) -> Router {
    Router::new()
        .route("/review", post(submit_review))
        .with_state(AppState { ingest, validation })
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyTimeoutLayer::new(BODY_READ_TIMEOUT))
        .layer(TimeoutLayer::new(RESPONSE_TIMEOUT))
        .layer(TraceLayer::new_for_http())
}

async fn submit_review(State(state): State<AppState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let review: Review = serde_json::from_slice(&body).map_err(ApiError::Json)?;
    // Detached so a client disconnect cannot interrupt a write halfway.
    let task = tokio::spawn(async move { state.ingest.submit(review, state.validation).await });
    task.await.map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(StatusCode::OK)
}

/// A bound, not yet serving, ingest server.
pub struct HttpServer {
    listener: TcpListener,
    router: Router,
    addr: SocketAddr,
}

impl HttpServer {
    /// Binds `127.0.0.1:<port>`; port `0` picks an ephemeral port.
    ///
    /// # Errors
    ///
    /// Returns the bind error, e.g. when the port is taken.
    pub async fn bind(port: u16, router: Router) -> io::Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "HTTP ingest listening");
        Ok(Self { listener, router, addr })
    }

    /// The port actually bound.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepts connections until `shutdown` fires, then lets in-flight
    /// requests finish before returning.
    ///
    /// # Errors
    ///
    /// Never fails today; accept errors are logged and skipped.
    pub async fn serve(self, shutdown: CancellationToken) -> io::Result<()> {
        let tracker = TaskTracker::new();

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        continue;
                    }
                },
            };

            let service = TowerToHyperService::new(self.router.clone());
            let shutdown = shutdown.clone();
            tracker.spawn(async move {
                let mut builder = http1::Builder::new();
                builder.timer(TokioTimer::new()).header_read_timeout(HEADER_READ_TIMEOUT);
                let conn = builder.serve_connection(TokioIo::new(stream), service);
                tokio::pin!(conn);

                let result = tokio::select! {
                    result = conn.as_mut() => result,
                    _ = shutdown.cancelled() => {
                        conn.as_mut().graceful_shutdown();
                        conn.await
                    }
                };
                if let Err(e) = result {
                    debug!(%peer, error = %e, "connection closed with error");
                }
            });
        }

        tracker.close();
        tracker.wait().await;
        info!(addr = %self.addr, "HTTP ingest stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::PathError;
    use crate::store::StoreError;

    #[test]
    fn status_mapping() {
        let missing = ApiError::Ingest(IngestError::MissingWorkingDirectory);
        assert_eq!(missing.status_code(), StatusCode::BAD_REQUEST);

        let invalid = ApiError::Ingest(IngestError::InvalidWorkingDirectory(PathError::Invalid {
            path: "a\0b".into(),
            reason: "contains NUL".into(),
        }));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let store = ApiError::Ingest(IngestError::Store(StoreError::Io {
            op: "write",
            path: "/x".into(),
            source: io::Error::other("disk full"),
        }));
        assert_eq!(store.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
