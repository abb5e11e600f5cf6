//! JSON-RPC 2.0 base envelopes for SPP.

use serde::{Deserialize, Serialize};

use crate::error::SppError;

/// JSON-RPC 2.0 request ID — either a string or integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

fn default_version() -> String {
    "2.0".into()
}

/// JSON-RPC 2.0 request.
///
/// The `jsonrpc` field is optional on the wire — the POST endpoint accepts
/// bare `{id, method, params}` envelopes and fills in "2.0".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SppRequest {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// JSON-RPC 2.0 success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SppSuccessResponse {
    pub jsonrpc: String,
    pub id: RequestId,
    pub result: serde_json::Value,
}

/// JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SppErrorResponse {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    pub error: SppError,
}

/// JSON-RPC 2.0 response (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SppResponse {
    Success(SppSuccessResponse),
    Error(SppErrorResponse),
}

/// JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SppNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

/// Result from a request handler.
pub type HandlerResult = Result<serde_json::Value, SppError>;

// ─────────────────────────────────────────────────────────────────────────────
// Helper constructors
// ─────────────────────────────────────────────────────────────────────────────

impl SppRequest {
    /// Validate that this is a well-formed request envelope.
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == "2.0" && !self.method.is_empty()
    }
}

impl SppSuccessResponse {
    pub fn new(id: RequestId, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result,
        }
    }
}

impl SppErrorResponse {
    pub fn new(id: Option<RequestId>, error: SppError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            error,
        }
    }
}

impl SppNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
        }
    }
}

impl SppResponse {
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self::Success(SppSuccessResponse::new(id, result))
    }

    pub fn error(id: Option<RequestId>, error: SppError) -> Self {
        Self::Error(SppErrorResponse::new(id, error))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
