//! The Session value object — one connected client.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use spp_protocol::SppNotification;
use tokio::sync::mpsc;

/// Opaque session identifier. Unique for the life of the process.
pub type SessionId = String;

/// One logical connected client: an opaque id, a creation timestamp, and
/// the sending half of its outbound queue. The receiving half is the push
/// channel itself — a single task drains it onto the wire, which is what
/// serializes all writes for this session.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    outbox: Mutex<Option<mpsc::Sender<SppNotification>>>,
}

/// Why a payload did not make it onto the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EnqueueError {
    #[error("session outbox is full")]
    Full,
    #[error("session push channel is closed")]
    Closed,
}

impl Session {
    pub(crate) fn new(id: SessionId, outbox_capacity: usize) -> (Self, mpsc::Receiver<SppNotification>) {
        let (tx, rx) = mpsc::channel(outbox_capacity);
        let session = Self {
            id,
            created_at: Utc::now(),
            outbox: Mutex::new(Some(tx)),
        };
        (session, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Queue a payload for delivery, preserving enqueue order.
    /// Never blocks: a full outbox or a closed channel is an error the
    /// caller decides how to report.
    pub fn enqueue(&self, note: SppNotification) -> Result<(), EnqueueError> {
        let outbox = self.outbox.lock();
        match outbox.as_ref() {
            Some(tx) => tx.try_send(note).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
                mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
            }),
            None => Err(EnqueueError::Closed),
        }
    }

    /// Close the push channel. Idempotent — later calls are no-ops.
    /// Payloads already queued are still delivered before the receiving
    /// stream ends.
    pub fn close(&self) {
        self.outbox.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.outbox.lock().is_none()
    }
}
