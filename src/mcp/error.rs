//! Error types for the Microsoft Graph MCP implementation.
//!
//! This module contains the custom error types and conversions needed for the Graph API.
//! It provides:
//! - `GraphError`: The main error enum that covers all possible error cases
//! - Conversions from various error types (`reqwest`, `serde_json`, `url`, etc.)
//! - Conversion to RMCP's `ErrorData` for MCP protocol compliance
//!
//! Directory tools never surface a `GraphError` as a protocol error; the
//! directory facade folds them into a `ToolFailure` envelope instead.

use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A non-success response from Microsoft Graph itself.
    #[error("Microsoft Graph returned {status}: {message}")]
    Service {
        status: u16,
        code: Option<String>,
        message: String,
        body: String,
    },

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP middleware error: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GraphError {
    /// Short, stable name of the fault, reported as `type` in
    /// `unexpected_error` envelopes.
    #[must_use]
    pub const fn classification(&self) -> &'static str {
        match self {
            Self::InvalidParams(_) => "invalid_params",
            Self::MissingConfig(_) => "configuration",
            Self::Authentication(_) => "authentication",
            Self::Service { .. } => "graph_service",
            Self::Url(_) => "url",
            Self::Http(_) => "http",
            Self::HttpMiddleware(_) => "http_middleware",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// Full fault text: the display message plus, for Graph faults, the
    /// service error code and raw response body.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::Service { code, body, .. } => format!(
                "{self}; code: {}; response: {body}",
                code.as_deref().unwrap_or("unknown")
            ),
            other => format!("{other:?}"),
        }
    }
}

impl From<GraphError> for ErrorData {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::InvalidParams(msg) => Self::new(ErrorCode::INVALID_PARAMS, msg, None),
            GraphError::MissingConfig(msg) => Self::new(ErrorCode::INTERNAL_ERROR, msg, None),
            GraphError::Http(e) => Self::new(ErrorCode::INTERNAL_ERROR, format!("HTTP error: {e}"), None),
            GraphError::HttpMiddleware(e) => Self::new(ErrorCode::INTERNAL_ERROR, format!("HTTP middleware error: {e}"), None),
            other => Self::new(ErrorCode::INTERNAL_ERROR, other.to_string(), None),
        }
    }
}
