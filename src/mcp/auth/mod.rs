//! Credential provider for Microsoft Graph.
//!
//! A `CredentialConfig` (one variant per OAuth flow) goes through
//! [`build_credential`] and comes out as a shared [`TokenCredential`]. Nothing
//! downstream of this module knows which flow produced the token.

pub mod certificate;
pub mod config;
mod flows;
mod interactive;

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use oauth2::{RefreshToken, TokenResponse, TokenUrl, basic::BasicTokenResponse};
use secrecy::SecretString;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::mcp::error::GraphError;

pub use certificate::ClientCertificate;
pub use config::{AUTHORITY_HOST, AuthFlow, CredentialConfig};
pub use flows::GRAPH_DEFAULT_SCOPE;

/// Used when the token endpoint omits `expires_in`.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens this close to expiry are renewed instead of reused.
const EXPIRY_SKEW: Duration = Duration::from_secs(120);

/// Source of bearer tokens for Graph requests. Safe to share across
/// concurrent tool calls.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, GraphError>;
}

/// Microsoft identity platform v2.0 endpoints of one tenant.
#[derive(Debug, Clone)]
pub struct Authority {
    pub authorize: String,
    pub token: String,
    pub device_code: String,
}

impl Authority {
    /// # Errors
    /// `Url` when `host` does not yield valid endpoint URLs.
    pub fn new(host: &str, tenant_id: &str) -> Result<Self, GraphError> {
        let base = format!("{}/{tenant_id}/oauth2/v2.0", host.trim_end_matches('/'));
        let authority = Self {
            authorize: format!("{base}/authorize"),
            token: format!("{base}/token"),
            device_code: format!("{base}/devicecode"),
        };
        TokenUrl::new(authority.token.clone())?;
        Ok(authority)
    }
}

enum Grant {
    InteractiveBrowser {
        client_id: String,
        redirect_uri: String,
    },
    ClientSecret {
        client_id: String,
        client_secret: SecretString,
    },
    ClientCertificate {
        client_id: String,
        certificate: ClientCertificate,
    },
    DeviceCode {
        client_id: String,
    },
}

impl Grant {
    /// Delegated grants may hold a refresh token worth trying first.
    const fn is_delegated(&self) -> bool {
        matches!(self, Self::InteractiveBrowser { .. } | Self::DeviceCode { .. })
    }

    fn client_id(&self) -> &str {
        match self {
            Self::InteractiveBrowser { client_id, .. }
            | Self::ClientSecret { client_id, .. }
            | Self::ClientCertificate { client_id, .. }
            | Self::DeviceCode { client_id } => client_id,
        }
    }
}

struct CachedToken {
    access_token: SecretString,
    refresh_token: Option<RefreshToken>,
    expires_at: Instant,
}

impl CachedToken {
    fn from_response(response: &BasicTokenResponse) -> Self {
        let lifetime = response.expires_in().unwrap_or(DEFAULT_TOKEN_LIFETIME);
        Self {
            access_token: SecretString::from(response.access_token().secret().clone()),
            refresh_token: response.refresh_token().cloned(),
            expires_at: Instant::now() + lifetime,
        }
    }

    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_SKEW < self.expires_at
    }
}

pub struct OAuthCredential {
    grant: Grant,
    authority: Authority,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

/// Turns a `CredentialConfig` into the shared token source.
///
/// Certificates are loaded here, so an unreadable bundle stops startup
/// instead of failing the first tool call.
///
/// # Errors
/// `Url`, `MissingConfig` or `Authentication` when the configuration cannot
/// produce a usable credential.
pub fn build_credential(
    config: CredentialConfig,
    authority_host: &str,
) -> Result<Arc<dyn TokenCredential>, GraphError> {
    let authority = Authority::new(authority_host, config.tenant_id())?;
    let flow = config.flow();
    let grant = match config {
        CredentialConfig::InteractiveBrowser {
            client_id,
            redirect_uri,
            ..
        } => Grant::InteractiveBrowser {
            client_id,
            redirect_uri,
        },
        CredentialConfig::ClientSecret {
            client_id,
            client_secret,
            ..
        } => Grant::ClientSecret {
            client_id,
            client_secret,
        },
        CredentialConfig::ClientCertificate {
            client_id,
            certificate_path,
            certificate_password,
            ..
        } => Grant::ClientCertificate {
            client_id,
            certificate: ClientCertificate::from_pkcs12_file(
                &certificate_path,
                certificate_password.as_ref(),
            )?,
        },
        CredentialConfig::DeviceCode { client_id, .. } => Grant::DeviceCode { client_id },
    };

    // Token endpoints must not be followed through redirects.
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    info!(%flow, client_id = grant.client_id(), token_endpoint = %authority.token, "Microsoft Graph credential configured");
    Ok(Arc::new(OAuthCredential {
        grant,
        authority,
        http,
        cache: Mutex::new(None),
    }))
}

impl OAuthCredential {
    async fn acquire(&self) -> Result<BasicTokenResponse, GraphError> {
        let http = &self.http;
        let authority = &self.authority;
        match &self.grant {
            Grant::InteractiveBrowser {
                client_id,
                redirect_uri,
            } => interactive::authorization_code(http, authority, client_id, redirect_uri).await,
            Grant::ClientSecret {
                client_id,
                client_secret,
            } => flows::client_secret(http, authority, client_id, client_secret).await,
            Grant::ClientCertificate {
                client_id,
                certificate,
            } => flows::client_assertion(http, authority, client_id, certificate).await,
            Grant::DeviceCode { client_id } => flows::device_code(http, authority, client_id).await,
        }
    }
}

#[async_trait]
impl TokenCredential for OAuthCredential {
    async fn access_token(&self) -> Result<SecretString, GraphError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref().filter(|token| token.is_fresh()) {
            return Ok(cached.access_token.clone());
        }

        let refresh_token = cache
            .take()
            .and_then(|token| token.refresh_token)
            .filter(|_| self.grant.is_delegated());

        let response = match refresh_token {
            Some(refresh_token) => {
                match flows::refresh(&self.http, &self.authority, self.grant.client_id(), &refresh_token).await {
                    Ok(response) => response,
                    Err(err) => {
                        warn!(%err, "refresh token rejected, signing in again");
                        self.acquire().await?
                    }
                }
            }
            None => self.acquire().await?,
        };

        let token = CachedToken::from_response(&response);
        debug!(
            expires_in = ?token.expires_at.saturating_duration_since(Instant::now()),
            refreshable = token.refresh_token.is_some(),
            "acquired Microsoft Graph access token"
        );
        let access_token = token.access_token.clone();
        *cache = Some(token);
        Ok(access_token)
    }
}
