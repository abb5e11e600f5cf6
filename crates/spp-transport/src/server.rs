//! HTTP transport server using Axum.
//!
//! Each client opens a long-lived `GET /events` connection; the server
//! allocates a session for it and streams that session's outbox as SSE
//! events. Requests arrive out-of-band on `POST /rpc?session=<id>` and are
//! answered in the HTTP response. The SSE task is the only writer on a
//! session's push channel, so outbound payloads never interleave.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Json, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use spp_protocol::{Events, SppError, SppErrorCode, SppNotification, SppResponse};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

/// Trait implemented by the SPP server to handle incoming requests.
/// The transport layer calls this for every decoded POST body.
pub trait RequestHandler: Send + Sync + 'static {
    /// Handle a raw request envelope and return a response envelope.
    /// Protocol-level failures come back as error envelopes, never panics.
    fn handle_request(
        &self,
        session_id: &str,
        payload: serde_json::Value,
    ) -> impl std::future::Future<Output = SppResponse> + Send;
}

/// Registry-side counterpart of [`RequestHandler`]: the transport opens a
/// session when a push connection arrives and closes it when the stream ends.
pub trait SessionHost: Send + Sync + 'static {
    /// Allocate a session and hand back its push-channel receiver.
    fn open_session(&self) -> Result<SessionTicket, SppError>;

    /// Release a session. Must be a no-op if the id is already gone.
    fn close_session(&self, session_id: &str);

    /// Number of live sessions (for the health endpoint).
    fn session_count(&self) -> usize;
}

/// A freshly opened session: its id plus the receiving end of its outbox.
#[derive(Debug)]
pub struct SessionTicket {
    pub session_id: String,
    pub outbox: mpsc::Receiver<SppNotification>,
}

/// Transport server configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Port to listen on (0 for OS-assigned)
    pub port: u16,
    /// Hostname to bind to
    pub hostname: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// SSE keep-alive comment interval, seconds
    pub keep_alive_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: 9000,
            hostname: "127.0.0.1".into(),
            enable_cors: false,
            keep_alive_secs: 15,
        }
    }
}

/// Shared state for the transport server.
struct AppState<S> {
    server: Arc<S>,
    config: TransportConfig,
}

/// The transport server — owns the listening socket and routes messages.
pub struct TransportServer {
    /// Shutdown signal
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    handle: Option<tokio::task::JoinHandle<()>>,
    /// Actual bound port
    port: u16,
}

impl TransportServer {
    /// Bind the listening endpoint and start serving.
    /// A bind failure is returned to the caller and aborts startup.
    pub async fn start<S>(
        config: TransportConfig,
        server: Arc<S>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>>
    where
        S: RequestHandler + SessionHost,
    {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        let state = Arc::new(AppState {
            server,
            config: config.clone(),
        });

        let mut app = Router::new()
            .route("/events", get(events_handler::<S>))
            .route("/rpc", post(rpc_handler::<S>))
            .route("/health", get(health_handler::<S>))
            .with_state(state);

        if config.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }

        let addr: SocketAddr = format!("{}:{}", config.hostname, config.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_port = listener.local_addr()?.port();

        info!(
            "SPP transport listening on http://{}:{} (SSE: /events, POST: /rpc)",
            config.hostname, actual_port
        );

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            port: actual_port,
        })
    }

    /// Get the actual bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Stop accepting connections and wait for the serve task to finish,
    /// up to `deadline`. Returns true if the task had to be aborted.
    pub async fn stop(&mut self, deadline: Duration) -> bool {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
        let mut forced = false;
        if let Some(mut handle) = self.handle.take() {
            if tokio::time::timeout(deadline, &mut handle).await.is_err() {
                warn!("transport did not stop within {deadline:?}, aborting");
                handle.abort();
                forced = true;
            }
        }
        info!("SPP transport server stopped");
        forced
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Unregisters the session when the SSE stream is dropped — whether the
/// client went away or the server closed the push channel.
struct PushChannelGuard<S: SessionHost> {
    host: Arc<S>,
    session_id: String,
}

impl<S: SessionHost> Drop for PushChannelGuard<S> {
    fn drop(&mut self) {
        debug!("Push channel closed: {}", self.session_id);
        self.host.close_session(&self.session_id);
    }
}

async fn events_handler<S>(State(state): State<Arc<AppState<S>>>) -> Response
where
    S: RequestHandler + SessionHost,
{
    let ticket = match state.server.open_session() {
        Ok(ticket) => ticket,
        Err(err) if err.error_code() == SppErrorCode::RegistryFull => {
            warn!("Connection rejected: session registry is full");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        Err(err) => {
            warn!("Connection rejected: {err}");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    let session_id = ticket.session_id;
    info!("Client connected: {session_id}");

    // First event tells the client its session id and where to POST requests.
    let connected = SppNotification::new(
        Events::SERVER_CONNECTED,
        Some(json!({
            "sessionId": &session_id,
            "serverVersion": env!("CARGO_PKG_VERSION"),
            "endpoint": format!("/rpc?session={session_id}"),
        })),
    );
    let first = serde_json::to_string(&connected).unwrap();

    let guard = PushChannelGuard {
        host: state.server.clone(),
        session_id,
    };

    // The guard lives inside the outbox stream closure: when the client
    // disconnects or the outbox sender is dropped, axum drops the stream
    // and the session is unregistered.
    let outbox = ReceiverStream::new(ticket.outbox).filter_map(move |note| {
        let _keep_alive = &guard;
        match serde_json::to_string(&note) {
            Ok(json) => Some(Ok::<_, Infallible>(Event::default().data(json))),
            Err(e) => {
                error!("Failed to serialize notification: {e}");
                None
            }
        }
    });

    let stream = tokio_stream::once(Ok(Event::default().data(first))).chain(outbox);

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(state.config.keep_alive_secs))
                .text("keep-alive"),
        )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct RpcQuery {
    session: Option<String>,
}

async fn rpc_handler<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<RpcQuery>,
    body: String,
) -> (StatusCode, Json<SppResponse>)
where
    S: RequestHandler + SessionHost,
{
    let Some(session_id) = query.session else {
        let resp = SppResponse::error(
            None,
            SppError::invalid_request("Missing session query parameter"),
        );
        return (StatusCode::BAD_REQUEST, Json(resp));
    };

    let payload: serde_json::Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => {
            let resp = SppResponse::error(None, SppError::parse_error("Failed to parse JSON"));
            return (StatusCode::BAD_REQUEST, Json(resp));
        }
    };

    let resp = state.server.handle_request(&session_id, payload).await;

    // Session-correlation failures are the one error surfaced in the
    // status line; everything else is an ordinary envelope.
    let status = match &resp {
        SppResponse::Error(e) if e.error.error_code() == SppErrorCode::SessionNotFound => {
            StatusCode::NOT_FOUND
        }
        _ => StatusCode::OK,
    };
    (status, Json(resp))
}

async fn health_handler<S>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse
where
    S: RequestHandler + SessionHost,
{
    Json(json!({
        "status": "ok",
        "sessions": state.server.session_count(),
    }))
}
