//! Lifecycle coordination — owns the listening transport and background
//! producers, and drives the orderly shutdown sequence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use spp_protocol::Events;
use spp_transport::{TransportConfig, TransportServer};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::hub::SessionHub;
use crate::notify::Notifier;

/// Coordinator states, in order. Stopped is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Listening,
    Draining,
    Stopped,
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub transport: TransportConfig,
    /// How long Draining may take before remaining work is cut off
    pub grace: Duration,
    /// Interval for the periodic tick producer (None to disable)
    pub tick_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            grace: Duration::from_secs(5),
            tick_interval: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to bind listening endpoint: {0}")]
    Bind(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// What shutdown actually did. A deadline overrun is reported here, never
/// raised as an error — resources are released regardless.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownReport {
    /// True if in-flight work or connections had to be cut off
    pub forced: bool,
    /// Sessions force-closed when Draining ended
    pub sessions_closed: usize,
}

/// Owns the transport, the background producers, and the state machine
/// Idle → Listening → Draining → Stopped.
pub struct Coordinator {
    hub: Arc<SessionHub>,
    transport: TransportServer,
    producers: Vec<JoinHandle<()>>,
    state_tx: watch::Sender<LifecycleState>,
    state_rx: watch::Receiver<LifecycleState>,
    grace: Duration,
}

impl Coordinator {
    /// Bind the listening endpoint and start background producers.
    /// On success the server is Listening; a bind failure aborts startup.
    pub async fn start(config: ServerConfig, hub: SessionHub) -> Result<Self, StartError> {
        let hub = Arc::new(hub);
        let (state_tx, state_rx) = watch::channel(LifecycleState::Idle);

        let transport = TransportServer::start(config.transport, hub.clone())
            .await
            .map_err(StartError::Bind)?;

        let mut producers = Vec::new();
        if let Some(interval) = config.tick_interval {
            let ticker = Ticker::new(hub.notifier(), interval, hub.shutdown_signal());
            producers.push(tokio::spawn(ticker.run()));
        }

        state_tx.send_replace(LifecycleState::Listening);
        info!("Server listening on port {}", transport.port());

        Ok(Self {
            hub,
            transport,
            producers,
            state_tx,
            state_rx,
            grace: config.grace,
        })
    }

    pub fn state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    /// Observe state transitions (useful for tests and embedders).
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_rx.clone()
    }

    pub fn port(&self) -> u16 {
        self.transport.port()
    }

    pub fn hub(&self) -> &Arc<SessionHub> {
        &self.hub
    }

    /// Drive the shutdown sequence: stop accepting sessions, cancel
    /// producers, drain in-flight requests up to the grace deadline, then
    /// force-close remaining sessions and release the listening endpoint.
    pub async fn shutdown(mut self) -> ShutdownReport {
        let deadline = Instant::now() + self.grace;
        let mut forced = false;

        info!("Draining (grace {:?})", self.grace);
        self.state_tx.send_replace(LifecycleState::Draining);
        self.hub.begin_drain();

        // Producers observe the shutdown signal; give them a moment, then cut.
        for mut producer in self.producers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut producer).await.is_err() {
                warn!("Background producer did not stop in time, aborting");
                producer.abort();
                forced = true;
            }
        }

        // Wait for in-flight handlers, bounded by the deadline.
        while self.hub.dispatcher().inflight() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "Drain deadline exceeded with {} requests in flight",
                    self.hub.dispatcher().inflight()
                );
                forced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // A last notice for connected clients; it is flushed before the
        // push channels close because closing only drops the senders.
        self.hub.notifier().broadcast(
            Events::SERVER_SHUTTING_DOWN,
            Some(json!({ "time": Utc::now().to_rfc3339() })),
        );

        let sessions_closed = self.hub.registry().shutdown_all();
        debug!("Closed {sessions_closed} remaining sessions");

        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(Duration::from_millis(250));
        forced |= self.transport.stop(remaining).await;

        self.state_tx.send_replace(LifecycleState::Stopped);
        info!("Server stopped (forced: {forced})");

        ShutdownReport {
            forced,
            sessions_closed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Background producers
// ─────────────────────────────────────────────────────────────────────────────

/// Periodic broadcast producer. An explicit struct with an injected
/// interval and shutdown signal, so tests can drive it deterministically.
pub struct Ticker {
    notifier: Notifier,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl Ticker {
    pub fn new(notifier: Notifier, interval: Duration, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            notifier,
            interval,
            shutdown,
        }
    }

    /// Broadcast a tick every interval until cancelled.
    pub async fn run(mut self) {
        let mut ticks = tokio::time::interval(self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; consume it so the first
        // broadcast lands one full interval after start.
        ticks.tick().await;

        let mut seq: u64 = 0;
        loop {
            tokio::select! {
                _ = ticks.tick() => {
                    seq += 1;
                    let delivered = self.notifier.broadcast(
                        Events::SERVER_TICK,
                        Some(json!({ "seq": seq, "time": Utc::now().to_rfc3339() })),
                    );
                    debug!("Tick {seq} delivered to {delivered} sessions");
                }
                _ = self.shutdown.wait_for(|stop| *stop) => break,
            }
        }
        debug!("Ticker stopped");
    }
}
