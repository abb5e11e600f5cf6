//! SPP error types and standard JSON-RPC 2.0 error codes.

use serde::{Deserialize, Serialize};

/// Standard JSON-RPC 2.0 error codes plus SPP server errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SppErrorCode {
    // JSON-RPC 2.0 standard errors
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,

    // Server errors
    ServerError,
    ServerShuttingDown,
    SessionNotFound,
    RegistryFull,

    // Custom code
    Custom(i32),
}

impl SppErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError => -32000,
            Self::ServerShuttingDown => -32002,
            Self::SessionNotFound => -32010,
            Self::RegistryFull => -32011,
            Self::Custom(c) => *c,
        }
    }

    pub fn from_code(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32000 => Self::ServerError,
            -32002 => Self::ServerShuttingDown,
            -32010 => Self::SessionNotFound,
            -32011 => Self::RegistryFull,
            c => Self::Custom(c),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SppError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl SppError {
    pub fn new(code: SppErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(SppErrorCode::ParseError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SppErrorCode::InvalidRequest, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(SppErrorCode::MethodNotFound, format!("Method not found: {method}"))
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(SppErrorCode::InvalidParams, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(SppErrorCode::InternalError, message)
    }

    pub fn server_error(message: impl Into<String>) -> Self {
        Self::new(SppErrorCode::ServerError, message)
    }

    pub fn shutting_down() -> Self {
        Self::new(SppErrorCode::ServerShuttingDown, "Server is shutting down")
    }

    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(
            SppErrorCode::SessionNotFound,
            format!("Session not found: {session_id}"),
        )
    }

    pub fn registry_full() -> Self {
        Self::new(SppErrorCode::RegistryFull, "Session registry is full")
    }

    pub fn error_code(&self) -> SppErrorCode {
        SppErrorCode::from_code(self.code)
    }
}

impl std::fmt::Display for SppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SPP Error [{}]: {}", self.code, self.message)
    }
}

impl std::error::Error for SppError {}
