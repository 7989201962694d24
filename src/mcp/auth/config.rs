//! Credential configuration loaded from the environment.
//!
//! `GRAPH_AUTH_FLOW` picks exactly one OAuth flow; every flow except
//! `environment` fails fast when one of its variables is missing.

use std::{env, fmt, path::PathBuf, str::FromStr, sync::LazyLock};

use secrecy::SecretString;
use url::Url;

use crate::mcp::error::GraphError;

pub const AUTH_FLOW_VAR: &str = "GRAPH_AUTH_FLOW";
pub const TENANT_ID_VAR: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_VAR: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_VAR: &str = "AZURE_CLIENT_SECRET";
pub const CERTIFICATE_PATH_VAR: &str = "AZURE_CLIENT_CERTIFICATE_PATH";
pub const CERTIFICATE_PASSWORD_VAR: &str = "AZURE_CLIENT_CERTIFICATE_PASSWORD";
pub const REDIRECT_URI_VAR: &str = "AZURE_REDIRECT_URI";
/// Name used by earlier deployments of this server; still honoured.
pub const LEGACY_REDIRECT_URI_VAR: &str = "redirectUri";

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

pub static AUTHORITY_HOST: LazyLock<String> = LazyLock::new(|| {
    env::var("AZURE_AUTHORITY_HOST").unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string())
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthFlow {
    #[default]
    InteractiveBrowser,
    ClientSecret,
    ClientCertificate,
    DeviceCode,
    Environment,
}

impl AuthFlow {
    /// Reads `GRAPH_AUTH_FLOW`, defaulting to the interactive browser flow.
    ///
    /// # Errors
    /// `MissingConfig` when the variable names an unknown flow.
    pub fn from_env() -> Result<Self, GraphError> {
        optional(AUTH_FLOW_VAR).map_or_else(|| Ok(Self::default()), |value| value.parse())
    }
}

impl FromStr for AuthFlow {
    type Err = GraphError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "interactive" | "interactive_browser" | "browser" => Ok(Self::InteractiveBrowser),
            "client_secret" | "secret" => Ok(Self::ClientSecret),
            "client_certificate" | "certificate" => Ok(Self::ClientCertificate),
            "device_code" | "device" => Ok(Self::DeviceCode),
            "environment" | "env" => Ok(Self::Environment),
            other => Err(GraphError::MissingConfig(format!(
                "{AUTH_FLOW_VAR} must be one of interactive, client_secret, client_certificate, device_code, environment; got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InteractiveBrowser => "interactive",
            Self::ClientSecret => "client_secret",
            Self::ClientCertificate => "client_certificate",
            Self::DeviceCode => "device_code",
            Self::Environment => "environment",
        })
    }
}

/// Everything one OAuth flow needs. Exactly one variant is active per process.
#[derive(Debug, Clone)]
pub enum CredentialConfig {
    InteractiveBrowser {
        tenant_id: String,
        client_id: String,
        redirect_uri: String,
    },
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
    },
    ClientCertificate {
        tenant_id: String,
        client_id: String,
        certificate_path: PathBuf,
        certificate_password: Option<SecretString>,
    },
    DeviceCode {
        tenant_id: String,
        client_id: String,
    },
}

impl CredentialConfig {
    /// Resolves the configuration for `flow` from the environment.
    ///
    /// Returns `Ok(None)` only for [`AuthFlow::Environment`] when its
    /// variables are incomplete: the server then runs without a Graph client.
    ///
    /// # Errors
    /// `MissingConfig` or `Url` when a variable required by `flow` is unset
    /// or malformed.
    pub fn resolve(flow: AuthFlow) -> Result<Option<Self>, GraphError> {
        let config = match flow {
            AuthFlow::InteractiveBrowser => {
                let redirect_uri = optional(REDIRECT_URI_VAR)
                    .or_else(|| optional(LEGACY_REDIRECT_URI_VAR))
                    .ok_or_else(|| {
                        GraphError::MissingConfig(format!(
                            "{REDIRECT_URI_VAR} (or {LEGACY_REDIRECT_URI_VAR}) must be set for the {flow} flow"
                        ))
                    })?;
                Url::parse(&redirect_uri)?;
                Self::InteractiveBrowser {
                    tenant_id: required(TENANT_ID_VAR, flow)?,
                    client_id: required(CLIENT_ID_VAR, flow)?,
                    redirect_uri,
                }
            }
            AuthFlow::ClientSecret => Self::ClientSecret {
                tenant_id: required(TENANT_ID_VAR, flow)?,
                client_id: required(CLIENT_ID_VAR, flow)?,
                client_secret: SecretString::from(required(CLIENT_SECRET_VAR, flow)?),
            },
            AuthFlow::ClientCertificate => Self::ClientCertificate {
                tenant_id: required(TENANT_ID_VAR, flow)?,
                client_id: required(CLIENT_ID_VAR, flow)?,
                certificate_path: PathBuf::from(required(CERTIFICATE_PATH_VAR, flow)?),
                certificate_password: optional(CERTIFICATE_PASSWORD_VAR).map(SecretString::from),
            },
            AuthFlow::DeviceCode => Self::DeviceCode {
                tenant_id: required(TENANT_ID_VAR, flow)?,
                client_id: required(CLIENT_ID_VAR, flow)?,
            },
            AuthFlow::Environment => return Ok(Self::from_environment()),
        };
        Ok(Some(config))
    }

    /// Client-secret configuration from `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`
    /// and `AZURE_CLIENT_SECRET`, or `None` if any of them is missing.
    #[must_use]
    pub fn from_environment() -> Option<Self> {
        Some(Self::ClientSecret {
            tenant_id: optional(TENANT_ID_VAR)?,
            client_id: optional(CLIENT_ID_VAR)?,
            client_secret: SecretString::from(optional(CLIENT_SECRET_VAR)?),
        })
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        match self {
            Self::InteractiveBrowser { tenant_id, .. }
            | Self::ClientSecret { tenant_id, .. }
            | Self::ClientCertificate { tenant_id, .. }
            | Self::DeviceCode { tenant_id, .. } => tenant_id,
        }
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        match self {
            Self::InteractiveBrowser { client_id, .. }
            | Self::ClientSecret { client_id, .. }
            | Self::ClientCertificate { client_id, .. }
            | Self::DeviceCode { client_id, .. } => client_id,
        }
    }

    #[must_use]
    pub const fn flow(&self) -> AuthFlow {
        match self {
            Self::InteractiveBrowser { .. } => AuthFlow::InteractiveBrowser,
            Self::ClientSecret { .. } => AuthFlow::ClientSecret,
            Self::ClientCertificate { .. } => AuthFlow::ClientCertificate,
            Self::DeviceCode { .. } => AuthFlow::DeviceCode,
        }
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &str, flow: AuthFlow) -> Result<String, GraphError> {
    optional(name)
        .ok_or_else(|| GraphError::MissingConfig(format!("{name} must be set for the {flow} flow")))
}
