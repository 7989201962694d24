//! Interactive browser sign-in: authorization code grant with PKCE, answered
//! by a short-lived axum server bound to the configured redirect URI.

use std::{process::Command, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, CsrfToken, PkceCodeChallenge, RedirectUrl,
    TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use serde::Deserialize;
use tokio::{
    net::TcpListener,
    sync::{Mutex, oneshot},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::mcp::{
    auth::{
        Authority,
        flows::{delegated_scopes, token_error},
    },
    error::GraphError,
};

const SIGNED_IN_PAGE: &str = "<html><body><h1>Signed in</h1><p>You can close this window and return to the application.</p></body></html>";

/// How long a user has to finish signing in before the attempt fails.
const SIGN_IN_TIMEOUT: Duration = Duration::from_secs(300);
/// Grace period for the signed-in page to flush before the server is dropped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Default, PartialEq, Eq, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

type RedirectSlot = Arc<Mutex<Option<oneshot::Sender<RedirectParams>>>>;

pub(super) async fn authorization_code(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
    redirect_uri: &str,
) -> Result<BasicTokenResponse, GraphError> {
    sign_in(http, authority, client_id, redirect_uri, SIGN_IN_TIMEOUT, |url| {
        eprintln!("Open this URL in a browser to sign in to Microsoft Graph:\n{url}");
        open_browser(url.as_str());
    })
    .await
}

async fn sign_in(
    http: &reqwest::Client,
    authority: &Authority,
    client_id: &str,
    redirect_uri: &str,
    timeout: Duration,
    launch: impl FnOnce(&Url) + Send,
) -> Result<BasicTokenResponse, GraphError> {
    let redirect = Url::parse(redirect_uri)?;
    let host = redirect
        .host_str()
        .ok_or_else(|| GraphError::MissingConfig(format!("redirect URI {redirect_uri} has no host")))?;
    let port = redirect
        .port_or_known_default()
        .ok_or_else(|| GraphError::MissingConfig(format!("redirect URI {redirect_uri} has no port")))?;
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|e| GraphError::Authentication(format!("cannot listen on {redirect_uri}: {e}")))?;

    let client = BasicClient::new(ClientId::new(client_id.to_string()))
        .set_auth_type(AuthType::RequestBody)
        .set_auth_uri(AuthUrl::new(authority.authorize.clone())?)
        .set_token_uri(TokenUrl::new(authority.token.clone())?)
        .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
    let (authorize_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scopes(delegated_scopes())
        .set_pkce_challenge(pkce_challenge)
        .url();

    info!(%redirect_uri, "waiting for interactive sign-in");
    let redirect_params = wait_for_redirect(listener, redirect.path(), timeout);
    launch(&authorize_url);
    let code = authorization_code_from(redirect_params.await?, csrf_state.secret())?;

    client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(pkce_verifier)
        .request_async(http)
        .await
        .map_err(token_error)
}

/// Checks the redirect against the CSRF state and extracts the code.
fn authorization_code_from(
    params: RedirectParams,
    expected_state: &str,
) -> Result<String, GraphError> {
    if params.state.as_deref() != Some(expected_state) {
        return Err(GraphError::Authentication(
            "authorization response state does not match the request".to_string(),
        ));
    }
    match (params.code, params.error) {
        (_, Some(error)) => Err(GraphError::Authentication(match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        })),
        (Some(code), None) => Ok(code),
        (None, None) => Err(GraphError::Authentication(
            "authorization response carried no code".to_string(),
        )),
    }
}

fn open_browser(url: &str) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else if cfg!(target_os = "windows") {
        "explorer"
    } else {
        "xdg-open"
    };
    if let Err(err) = Command::new(opener).arg(url).spawn() {
        debug!(%err, opener, "could not launch a browser");
    }
}

/// Serves `redirect_path` until the first redirect arrives or `timeout`
/// elapses. Other paths get axum's 404.
async fn wait_for_redirect(
    listener: TcpListener,
    redirect_path: &str,
    timeout: Duration,
) -> Result<RedirectParams, GraphError> {
    let (redirect_tx, redirect_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let slot: RedirectSlot = Arc::new(Mutex::new(Some(redirect_tx)));
    let router = Router::new()
        .route(redirect_path, get(receive_redirect))
        .with_state(slot);

    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let received = tokio::time::timeout(timeout, redirect_rx).await;

    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
        debug!("redirect server still has open connections, aborting it");
        server.abort();
    }

    match received {
        Ok(Ok(params)) => Ok(params),
        Ok(Err(_)) => Err(GraphError::Authentication(
            "redirect server stopped before sign-in completed".to_string(),
        )),
        Err(_) => {
            warn!(?timeout, "interactive sign-in timed out");
            Err(GraphError::Authentication(format!(
                "no authorization redirect received within {}s",
                timeout.as_secs()
            )))
        }
    }
}

async fn receive_redirect(
    State(slot): State<RedirectSlot>,
    Query(params): Query<RedirectParams>,
) -> Html<&'static str> {
    if let Some(sender) = slot.lock().await.take() {
        debug!("received authorization redirect");
        let _ = sender.send(params);
    }
    Html(SIGNED_IN_PAGE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use oauth2::TokenResponse;
    use serde_json::json;
    use std::net::SocketAddr;
    use tokio::{io::AsyncWriteExt, net::TcpStream};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        std::net::TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn free_port() -> Result<u16> {
        Ok(std::net::TcpListener::bind("127.0.0.1:0")?.local_addr()?.port())
    }

    fn query_value(url: &Url, key: &str) -> Option<String> {
        url.query_pairs()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.into_owned())
    }

    /// Plays the browser: follows the redirect URI with the given query.
    fn redirect_with(redirect_uri: &str, query: String) -> impl FnOnce(&Url) {
        let target = format!("{redirect_uri}?{query}");
        move |_| {
            tokio::spawn(async move {
                let _ = reqwest::get(target).await;
            });
        }
    }

    #[test]
    fn matching_state_yields_code() -> Result<()> {
        let params = RedirectParams {
            code: Some("abc".to_string()),
            state: Some("xyz".to_string()),
            ..RedirectParams::default()
        };
        assert_eq!(authorization_code_from(params, "xyz")?, "abc");
        Ok(())
    }

    #[test]
    fn mismatched_or_missing_state_is_rejected() {
        for state in [Some("forged"), None] {
            let params = RedirectParams {
                code: Some("abc".to_string()),
                state: state.map(str::to_string),
                ..RedirectParams::default()
            };
            assert!(matches!(
                authorization_code_from(params, "xyz"),
                Err(GraphError::Authentication(message)) if message.contains("state")
            ));
        }
    }

    #[test]
    fn error_redirect_reports_description() {
        let params = RedirectParams {
            state: Some("xyz".to_string()),
            error: Some("access_denied".to_string()),
            error_description: Some("User cancelled".to_string()),
            ..RedirectParams::default()
        };
        assert!(matches!(
            authorization_code_from(params, "xyz"),
            Err(GraphError::Authentication(message)) if message == "access_denied: User cancelled"
        ));
    }

    #[test]
    fn redirect_without_code_is_rejected() {
        let params = RedirectParams {
            state: Some("xyz".to_string()),
            ..RedirectParams::default()
        };
        assert!(authorization_code_from(params, "xyz").is_err());
    }

    #[tokio::test]
    async fn idle_connection_does_not_block_redirect() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let waiter = tokio::spawn(async move {
            wait_for_redirect(listener, "/callback", Duration::from_secs(10)).await
        });

        // A speculative preconnect that never sends a request.
        let _idle = TcpStream::connect(addr).await?;

        let stray = reqwest::get(format!("http://{addr}/favicon.ico")).await?;
        assert_eq!(stray.status(), reqwest::StatusCode::NOT_FOUND);

        let response = tokio::time::timeout(
            Duration::from_secs(3),
            reqwest::get(format!("http://{addr}/callback?code=the-code&state=the-state")),
        )
        .await??;
        assert!(response.status().is_success());
        assert!(response.text().await?.contains("Signed in"));

        let params = tokio::time::timeout(Duration::from_secs(10), waiter).await???;
        assert_eq!(params.code.as_deref(), Some("the-code"));
        assert_eq!(params.state.as_deref(), Some("the-state"));
        Ok(())
    }

    #[tokio::test]
    async fn wait_gives_up_after_timeout() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let mut idle = TcpStream::connect(addr).await?;
        idle.write_all(b"GET /callback HTTP/1.1\r\n").await?;

        let result = wait_for_redirect(listener, "/callback", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(GraphError::Authentication(message)) if message.contains("within")));
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_rejects_forged_state_without_exchanging_code() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let authority = Authority::new(&server.uri(), "tenant")?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", free_port()?);
        let result = sign_in(
            &reqwest::Client::new(),
            &authority,
            "public-client",
            &redirect_uri,
            Duration::from_secs(10),
            redirect_with(&redirect_uri, "code=the-code&state=forged".to_string()),
        )
        .await;

        assert!(matches!(
            result,
            Err(GraphError::Authentication(message)) if message.contains("state")
        ));
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_reports_error_redirect() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        let authority = Authority::new(&server.uri(), "tenant")?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", free_port()?);

        let result = sign_in(
            &reqwest::Client::new(),
            &authority,
            "public-client",
            &redirect_uri,
            Duration::from_secs(10),
            |url: &Url| {
                let state = query_value(url, "state").unwrap_or_default();
                redirect_with(
                    &redirect_uri,
                    format!("error=access_denied&error_description=User+cancelled&state={state}"),
                )(url);
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(GraphError::Authentication(message)) if message == "access_denied: User cancelled"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn sign_in_exchanges_code_with_pkce_verifier() -> Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier="))
            .and(body_string_contains("client_id=public-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "token_type": "Bearer",
                "access_token": "browser-token",
                "expires_in": 3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let authority = Authority::new(&server.uri(), "tenant")?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", free_port()?);
        let response = sign_in(
            &reqwest::Client::new(),
            &authority,
            "public-client",
            &redirect_uri,
            Duration::from_secs(10),
            |url: &Url| {
                assert!(query_value(url, "code_challenge").is_some());
                assert!(
                    query_value(url, "scope")
                        .is_some_and(|scope| scope.contains("User.ReadBasic.All"))
                );
                let state = query_value(url, "state").unwrap_or_default();
                redirect_with(&redirect_uri, format!("code=the-code&state={state}"))(url);
            },
        )
        .await
        .map_err(|err| anyhow!("sign-in failed: {err}"))?;

        assert_eq!(response.access_token().secret(), "browser-token");
        Ok(())
    }
}
