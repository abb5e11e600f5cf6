//! SPP (Session Push Protocol) - Protocol Types
//!
//! JSON-RPC 2.0 compatible types for the Session Push Protocol.
//! This crate is the single source of truth for all envelope types,
//! notification event names, and error codes.

pub mod envelope;
pub mod error;
pub mod events;

pub use envelope::{
    HandlerResult, RequestId, SppErrorResponse, SppNotification, SppRequest, SppResponse,
    SppSuccessResponse,
};
pub use error::{SppError, SppErrorCode};
pub use events::{EventName, Events};
