//! Request dispatch — turns a decoded inbound envelope into a response
//! envelope by routing to an application-supplied handler.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use spp_protocol::{HandlerResult, RequestId, SppError, SppRequest, SppResponse};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::notify::Notifier;
use crate::registry::SessionRegistry;
use crate::session::Session;

/// Everything a handler may need besides its params: the calling session,
/// a notifier for push side-effects, and the shutdown signal so long
/// operations can observe cancellation promptly.
pub struct HandlerContext {
    pub session: Arc<Session>,
    pub notifier: Notifier,
    shutdown: watch::Receiver<bool>,
}

impl HandlerContext {
    pub fn session_id(&self) -> &str {
        self.session.id()
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves when draining begins. Handlers doing long work should
    /// select against this rather than running unbounded.
    pub async fn cancelled(&self) {
        let mut rx = self.shutdown.clone();
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Trait implemented by request handlers (the application's tool logic —
/// opaque to this core).
pub trait Handler: Send + Sync {
    fn call(
        &self,
        ctx: HandlerContext,
        params: Option<Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send;
}

/// Object-safe wrapper for the Handler trait.
trait HandlerDyn: Send + Sync {
    fn call_dyn<'a>(
        &'a self,
        ctx: HandlerContext,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>>;
}

impl<T: Handler> HandlerDyn for T {
    fn call_dyn<'a>(
        &'a self,
        ctx: HandlerContext,
        params: Option<Value>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = HandlerResult> + Send + 'a>> {
        Box::pin(self.call(ctx, params))
    }
}

struct FnHandler<F>(F);

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerContext, Option<Value>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = HandlerResult> + Send,
{
    fn call(
        &self,
        ctx: HandlerContext,
        params: Option<Value>,
    ) -> impl std::future::Future<Output = HandlerResult> + Send {
        (self.0)(ctx, params)
    }
}

/// Mapping of method name to handler, supplied by the application layer.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn HandlerDyn>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a method name. Re-registering a name
    /// replaces the previous handler.
    pub fn register<H: Handler + 'static>(&mut self, method: impl Into<String>, handler: H) {
        self.handlers.insert(method.into(), Box::new(handler));
    }

    /// Register a plain async closure taking raw params.
    pub fn register_fn<F, Fut>(&mut self, method: impl Into<String>, f: F)
    where
        F: Fn(HandlerContext, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        self.register(method, FnHandler(f));
    }

    /// Register a handler whose params are decoded into a typed structure
    /// before it runs. Malformed params never reach the handler — they
    /// become an invalid-params error envelope.
    pub fn register_typed<P, F, Fut>(&mut self, method: impl Into<String>, f: F)
    where
        P: DeserializeOwned + Send + 'static,
        F: Fn(HandlerContext, P) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = HandlerResult> + Send + 'static,
    {
        let f = Arc::new(f);
        self.register_fn(method, move |ctx, params| {
            let f = f.clone();
            async move {
                match serde_json::from_value::<P>(params.unwrap_or(Value::Null)) {
                    Ok(parsed) => f(ctx, parsed).await,
                    Err(e) => Err(SppError::invalid_params(format!("Invalid params: {e}"))),
                }
            }
        });
    }

    pub fn contains(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn get(&self, method: &str) -> Option<&dyn HandlerDyn> {
        self.handlers.get(method).map(|h| h.as_ref())
    }
}

/// The request dispatcher. Every inbound envelope goes through here; every
/// failure mode comes out as an error envelope, never a transport fault.
pub struct Dispatcher {
    handlers: HandlerRegistry,
    registry: Arc<SessionRegistry>,
    notifier: Notifier,
    shutdown: watch::Receiver<bool>,
    inflight: Arc<AtomicUsize>,
}

struct InflightGuard(Arc<AtomicUsize>);

impl InflightGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl Dispatcher {
    pub fn new(
        handlers: HandlerRegistry,
        registry: Arc<SessionRegistry>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let notifier = Notifier::new(registry.clone());
        Self {
            handlers,
            registry,
            notifier,
            shutdown,
            inflight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Requests currently inside a handler. The lifecycle coordinator
    /// polls this while draining.
    pub fn inflight(&self) -> usize {
        self.inflight.load(Ordering::Acquire)
    }

    /// Resolve the session id, then dispatch. An unknown id yields a
    /// session-not-found error envelope.
    pub async fn dispatch_for(&self, session_id: &str, payload: Value) -> SppResponse {
        match self.registry.lookup(session_id) {
            Some(session) => self.dispatch(session, payload).await,
            None => SppResponse::error(extract_id(&payload), SppError::session_not_found(session_id)),
        }
    }

    /// Decode the envelope, resolve the handler, invoke it, and encode the
    /// result or error. Handler failures and panics are wrapped — they
    /// never propagate past this boundary.
    pub async fn dispatch(&self, session: Arc<Session>, payload: Value) -> SppResponse {
        let id = extract_id(&payload);

        if *self.shutdown.borrow() {
            return SppResponse::error(id, SppError::shutting_down());
        }

        let request: SppRequest = match serde_json::from_value(payload) {
            Ok(req) => req,
            Err(e) => {
                return SppResponse::error(id, SppError::invalid_request(format!("Invalid request envelope: {e}")));
            }
        };
        if !request.is_valid() {
            return SppResponse::error(Some(request.id), SppError::invalid_request("Invalid request envelope"));
        }

        let Some(handler) = self.handlers.get(&request.method) else {
            debug!("Method not found: {} (session {})", request.method, session.id());
            return SppResponse::error(Some(request.id), SppError::method_not_found(&request.method));
        };

        let _guard = InflightGuard::new(self.inflight.clone());
        let ctx = HandlerContext {
            session: session.clone(),
            notifier: self.notifier.clone(),
            shutdown: self.shutdown.clone(),
        };

        match AssertUnwindSafe(handler.call_dyn(ctx, request.params)).catch_unwind().await {
            Ok(Ok(result)) => SppResponse::success(request.id, result),
            Ok(Err(err)) => SppResponse::error(Some(request.id), err),
            Err(_) => {
                error!("Handler panicked for method {} (session {})", request.method, session.id());
                SppResponse::error(Some(request.id), SppError::internal("Handler panicked"))
            }
        }
    }
}

fn extract_id(payload: &Value) -> Option<RequestId> {
    payload
        .get("id")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
}
