//! SessionHub — composes registry, dispatcher, and notifier, and implements
//! the transport-facing traits.

use std::sync::Arc;

use spp_protocol::{SppError, SppResponse};
use spp_transport::{RequestHandler, SessionHost, SessionTicket};
use tokio::sync::watch;

use crate::dispatch::{Dispatcher, HandlerRegistry};
use crate::notify::Notifier;
use crate::registry::{RegisterError, SessionRegistry};

/// The server core behind the transport: opens and closes sessions,
/// dispatches requests, and owns the shutdown signal that handlers and
/// background producers observe.
pub struct SessionHub {
    registry: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    notifier: Notifier,
    shutdown_tx: watch::Sender<bool>,
}

impl SessionHub {
    /// Build a hub from an explicitly constructed registry and the
    /// application's handler table.
    pub fn new(registry: SessionRegistry, handlers: HandlerRegistry) -> Self {
        let registry = Arc::new(registry);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(handlers, registry.clone(), shutdown_rx);
        let notifier = Notifier::new(registry.clone());

        Self {
            registry,
            dispatcher,
            notifier,
            shutdown_tx,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A notifier handle for producers outside the request path.
    pub fn notifier(&self) -> Notifier {
        self.notifier.clone()
    }

    /// A receiver that flips to true when draining begins.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Stop accepting sessions and signal cancellation to everything
    /// holding a shutdown receiver. Idempotent.
    pub fn begin_drain(&self) {
        self.registry.close();
        let _ = self.shutdown_tx.send(true);
    }
}

impl RequestHandler for SessionHub {
    async fn handle_request(&self, session_id: &str, payload: serde_json::Value) -> SppResponse {
        self.dispatcher.dispatch_for(session_id, payload).await
    }
}

impl SessionHost for SessionHub {
    fn open_session(&self) -> Result<SessionTicket, SppError> {
        let (session, outbox) = self.registry.register().map_err(|e| match e {
            RegisterError::Full(_) => SppError::registry_full(),
            RegisterError::ShuttingDown => SppError::shutting_down(),
        })?;

        Ok(SessionTicket {
            session_id: session.id().to_string(),
            outbox,
        })
    }

    fn close_session(&self, session_id: &str) {
        self.registry.unregister(session_id);
    }

    fn session_count(&self) -> usize {
        self.registry.len()
    }
}
