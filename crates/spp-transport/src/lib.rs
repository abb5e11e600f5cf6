//! SPP Transport Layer
//!
//! HTTP transport for the SPP server:
//! - a long-lived `GET /events` endpoint carrying the per-session SSE push
//!   channel,
//! - a `POST /rpc` endpoint for request envelopes, correlated to a session
//!   by the `session` query parameter,
//! - a `GET /health` endpoint reporting live session count.
//!
//! The transport is decoupled from the server logic via the
//! `RequestHandler` and `SessionHost` traits.

pub mod server;

pub use server::{
    RequestHandler, SessionHost, SessionTicket, TransportConfig, TransportServer,
};
