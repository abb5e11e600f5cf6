//! SPP Server Core
//!
//! The session side of the Session Push Protocol: a concurrency-safe
//! session registry with lifecycle observers, a request dispatcher backed
//! by an application-supplied handler table, notification fan-out
//! (broadcast and unicast), and a lifecycle coordinator that owns the
//! transport and drives graceful shutdown.

pub mod dispatch;
pub mod hub;
pub mod lifecycle;
pub mod notify;
pub mod registry;
pub mod session;

pub use dispatch::{Dispatcher, Handler, HandlerContext, HandlerRegistry};
pub use hub::SessionHub;
pub use lifecycle::{
    Coordinator, LifecycleState, ServerConfig, ShutdownReport, StartError, Ticker,
};
pub use notify::Notifier;
pub use registry::{RegisterError, RegistryConfig, SessionObserver, SessionRegistry};
pub use session::{EnqueueError, Session, SessionId};
