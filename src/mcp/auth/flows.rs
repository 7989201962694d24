//! Token requests for the non-interactive OAuth2 grants against the
//! Microsoft identity platform v2.0 endpoints.

use oauth2::{
    AuthType, ClientId, ClientSecret, DeviceAuthorizationUrl, ErrorResponse, RefreshToken,
    RequestTokenError, Scope, StandardDeviceAuthorizationResponse, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::mcp::{
    auth::{Authority, certificate::ClientCertificate},
    error::GraphError,
};

pub const GRAPH_DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";
const DELEGATED_GRAPH_SCOPES: [&str; 2] = [
    "https://graph.microsoft.com/User.Read",
    "https://graph.microsoft.com/User.ReadBasic.All",
];
const OFFLINE_ACCESS_SCOPE: &str = "offline_access";
const JWT_BEARER_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Scopes for app-only grants: whatever application permissions were consented.
pub(super) fn application_scopes() -> Vec<Scope> {
    vec![Scope::new(GRAPH_DEFAULT_SCOPE.to_string())]
}

/// Scopes for delegated grants; `offline_access` asks for a refresh token.
pub(super) fn delegated_scopes() -> Vec<Scope> {
    DELEGATED_GRAPH_SCOPES
        .iter()
        .chain(std::iter::once(&OFFLINE_ACCESS_SCOPE))
        .map(|scope| Scope::new((*scope).to_string()))
        .collect()
}

pub(super) async fn client_secret(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
    secret: &SecretString,
) -> Result<BasicTokenResponse, GraphError> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_client_secret(ClientSecret::new(secret.expose_secret().to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(authority.token.clone())?);

    client
        .exchange_client_credentials()
        .add_scopes(application_scopes())
        .request_async(http)
        .await
        .map_err(token_error)
}

pub(super) async fn client_assertion(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
    certificate: &ClientCertificate,
) -> Result<BasicTokenResponse, GraphError> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(authority.token.clone())?);
    let assertion = certificate.assertion(client_id, &authority.token)?;

    client
        .exchange_client_credentials()
        .add_scopes(application_scopes())
        .add_extra_param("client_assertion_type", JWT_BEARER_ASSERTION_TYPE)
        .add_extra_param("client_assertion", assertion)
        .request_async(http)
        .await
        .map_err(token_error)
}

pub(super) async fn device_code(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
) -> Result<BasicTokenResponse, GraphError> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(authority.token.clone())?)
        .set_device_authorization_url(DeviceAuthorizationUrl::new(authority.device_code.clone())?);

    let details: StandardDeviceAuthorizationResponse = client
        .exchange_device_code()
        .add_scopes(delegated_scopes())
        .request_async(http)
        .await
        .map_err(token_error)?;

    let verification_uri = details.verification_uri().as_str();
    let user_code = details.user_code().secret();
    info!(%verification_uri, "waiting for device code sign-in");
    eprintln!("Go to {verification_uri} and enter code: {user_code}");

    client
        .exchange_device_access_token(&details)
        .request_async(http, tokio::time::sleep, None)
        .await
        .map_err(token_error)
}

pub(super) async fn refresh(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
    refresh_token: &RefreshToken,
) -> Result<BasicTokenResponse, GraphError> {
    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(authority.token.clone())?);

    client
        .exchange_refresh_token(refresh_token)
        .add_scopes(delegated_scopes())
        .request_async(http)
        .await
        .map_err(token_error)
}

pub(super) fn token_error<RE, T>(err: RequestTokenError<RE, T>) -> GraphError
where
    RE: std::error::Error,
    T: ErrorResponse,
{
    GraphError::Authentication(match err {
        RequestTokenError::ServerResponse(response) => response.to_string(),
        RequestTokenError::Request(inner) => format!("token request failed: {inner}"),
        RequestTokenError::Parse(inner, _) => format!("unreadable token response: {inner}"),
        RequestTokenError::Other(message) => message,
    })
}
