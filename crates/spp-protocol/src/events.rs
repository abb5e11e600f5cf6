//! SPP notification event name constants.
//!
//! Notifications are server-to-client messages with no response expected.
//! Clients receive these on their push channel.

/// All SPP notification names emitted by the server core.
pub struct Events;

impl Events {
    // ── Server lifecycle ────────────────────────────────────────────────
    pub const SERVER_CONNECTED: &str = "server/connected";
    pub const SERVER_SHUTTING_DOWN: &str = "server/shuttingDown";

    // ── Background producers ────────────────────────────────────────────
    pub const SERVER_TICK: &str = "server/tick";
}

/// Type alias for notification names.
pub type EventName = &'static str;
