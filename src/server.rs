//! Record stream server
//!
//! HTTP server that exposes the tee's live records to remote viewers as
//! server-sent events. Each connection gets its own subscriber and sees every
//! record emitted after it connected.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::tee::Interceptor;

/// Shared state of the stream routes
#[derive(Clone)]
pub struct StreamState {
    tee: Arc<Interceptor>,
    shutdown: CancellationToken,
    keep_alive: Duration,
}

impl StreamState {
    pub fn new(tee: Arc<Interceptor>, keep_alive: Duration) -> Self {
        Self {
            tee,
            shutdown: CancellationToken::new(),
            keep_alive,
        }
    }

    /// Token that ends every open stream when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Handle to control the running server
pub struct ServerHandle {
    shutdown: CancellationToken,
    addr: SocketAddr,
}

impl ServerHandle {
    /// Get the address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// End all open streams and shut the server down gracefully
    pub fn shutdown(self) {
        self.shutdown.cancel();
    }
}

/// Build the router serving `/logs/stream` and `/health`
pub fn router(state: StreamState) -> Router {
    Router::new()
        .route("/logs/stream", get(stream_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the stream server on 127.0.0.1
///
/// # Arguments
/// * `port` - Port to listen on (0 lets the OS choose)
/// * `tee` - Interceptor whose records are streamed
/// * `keep_alive` - Interval between SSE keep-alive comments
///
/// # Returns
/// A `ServerHandle` that can be used to shut down the server
pub async fn start(port: u16, tee: Arc<Interceptor>, keep_alive: Duration) -> Result<ServerHandle> {
    let state = StreamState::new(tee, keep_alive);
    let shutdown = state.shutdown_token();
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Record stream server listening on {}", bound_addr);

    let signal = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                signal.cancelled().await;
                info!("Record stream server shutting down");
            })
            .await
            .ok();
    });

    Ok(ServerHandle {
        shutdown,
        addr: bound_addr,
    })
}

/// GET /logs/stream handler
///
/// One SSE `data` event per record. The stream ends when the server shuts down.
async fn stream_handler(
    State(state): State<StreamState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let records = state.tee.stream_to_consumer(state.shutdown.child_token());
    debug!(subscribers = state.tee.subscriber_count(), "Record stream opened");

    let events =
        records.map(|record| Ok::<_, Infallible>(Event::default().data(sse_data(&record))));

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive).text("ping"))
}

/// GET /health handler
async fn health_handler(State(state): State<StreamState>) -> String {
    format!("ok subscribers={}", state.tee.subscriber_count())
}

/// Record text as a single SSE data line
///
/// SSE frames end at a newline and cannot carry carriage returns.
fn sse_data(record: &str) -> String {
    record.trim_end_matches('\n').replace('\r', "")
}
