//! The JSON contract every directory tool returns: either the payload itself
//! or `{error, message, ...context}`.

use serde::Serialize;

use crate::mcp::{auth::GRAPH_DEFAULT_SCOPE, error::GraphError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ToolOutcome<T> {
    Success(T),
    Failure(ToolFailure),
}

impl<T> ToolOutcome<T> {
    #[must_use]
    pub const fn failure(&self) -> Option<&ToolFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

impl<T> From<ToolFailure> for ToolOutcome<T> {
    fn from(failure: ToolFailure) -> Self {
        Self::Failure(failure)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotConfigured,
    InvalidInput,
    NotFound,
    GraphApiError,
    UnexpectedError,
}

/// Placeholder values telling an operator what to configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationHint {
    pub client_id: &'static str,
    pub tenant_id: &'static str,
    pub client_secret: &'static str,
    pub scopes: Vec<&'static str>,
}

impl Default for ConfigurationHint {
    fn default() -> Self {
        Self {
            client_id: "Your Azure AD application client ID",
            tenant_id: "Your Azure AD tenant ID",
            client_secret: "Your Azure AD application client secret (for app-only access)",
            scopes: vec![GRAPH_DEFAULT_SCOPE],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolFailure {
    pub error: FailureKind,
    pub message: String,
    /// HTTP status of a Graph fault.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub fault_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration_required: Option<ConfigurationHint>,
}

impl ToolFailure {
    fn new(error: FailureKind, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            code: None,
            details: None,
            fault_type: None,
            configuration_required: None,
        }
    }

    #[must_use]
    pub fn not_configured() -> Self {
        Self {
            configuration_required: Some(ConfigurationHint::default()),
            ..Self::new(
                FailureKind::NotConfigured,
                "Microsoft Graph client not configured: authentication needs to be properly configured to access Microsoft Graph API",
            )
        }
    }

    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidInput, message)
    }

    #[must_use]
    pub fn not_found(user_id: &str) -> Self {
        Self::new(
            FailureKind::NotFound,
            format!("No user found with ID or UPN: {user_id}"),
        )
    }
}

impl From<&GraphError> for ToolFailure {
    fn from(err: &GraphError) -> Self {
        match err {
            GraphError::Service {
                status, message, ..
            } => Self {
                code: Some(*status),
                details: Some(err.details()),
                ..Self::new(FailureKind::GraphApiError, message.clone())
            },
            other => Self {
                fault_type: Some(other.classification()),
                ..Self::new(FailureKind::UnexpectedError, other.to_string())
            },
        }
    }
}
