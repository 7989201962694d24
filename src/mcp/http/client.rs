//! HTTP client configuration and the shared Graph transport.
//!
//! This module provides:
//! - Environment-based configuration (Graph base URL)
//! - The `GraphTransport` seam the directory facade talks to
//! - `GraphHttpClient`, the reqwest-backed transport with bearer authentication
//! - Tracing integration for every outbound Graph request

use std::{env, sync::Arc, sync::LazyLock};

use async_trait::async_trait;
use http::Extensions;
use reqwest::{Request, Response, StatusCode, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Result as MiddlewareResult};
use reqwest_tracing::{
    ReqwestOtelSpanBackend, TracingMiddleware, default_on_request_end, reqwest_otel_span,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Span, debug};

use crate::mcp::{auth::TokenCredential, error::GraphError, http::GraphRequest};

const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

pub static GRAPH_BASE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("GRAPH_BASE_URL").unwrap_or_else(|_| DEFAULT_GRAPH_BASE_URL.to_string())
});

/// Anything able to issue an authenticated GET against Graph.
///
/// `Ok(None)` means the service answered successfully with an empty body.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    async fn get(&self, request: &GraphRequest) -> Result<Option<Value>, GraphError>;
}

// Request headers are not recorded: they carry the bearer token.
#[allow(dead_code)]
struct GraphTracing;

impl ReqwestOtelSpanBackend for GraphTracing {
    fn on_request_start(req: &Request, _extension: &mut Extensions) -> Span {
        reqwest_otel_span!(name = "graph-api-request", req)
    }

    fn on_request_end(
        span: &Span,
        outcome: &MiddlewareResult<Response>,
        _extension: &mut Extensions,
    ) {
        default_on_request_end(span, outcome);
    }
}

#[derive(Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Deserialize)]
struct GraphErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

pub struct GraphHttpClient {
    http: ClientWithMiddleware,
    credential: Arc<dyn TokenCredential>,
    base_url: Url,
}

impl GraphHttpClient {
    /// Builds the transport. One instance is shared by every tool call.
    ///
    /// # Errors
    /// * `Url` - `base_url` is not an absolute URL
    /// * `Http` - the underlying reqwest client could not be built
    pub fn new(credential: Arc<dyn TokenCredential>, base_url: &str) -> Result<Self, GraphError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(GraphError::MissingConfig(format!(
                "GRAPH_BASE_URL must be an absolute http(s) URL, got {base_url}"
            )));
        }

        let http = ClientBuilder::new(reqwest::Client::builder().build()?)
            .with(TracingMiddleware::<GraphTracing>::new())
            .build();

        Ok(Self {
            http,
            credential,
            base_url,
        })
    }

    fn endpoint(&self, request: &GraphRequest) -> Result<Url, GraphError> {
        // `.` and `..` would be resolved away by the URL and retarget the request.
        if let Some(segment) = request.segments.iter().find(|s| is_dot_segment(s)) {
            return Err(GraphError::InvalidParams(format!(
                "path segment {segment:?} is not a valid Graph resource identifier"
            )));
        }
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GraphError::MissingConfig(format!("cannot extend base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(&request.segments);
        Ok(url)
    }
}

#[async_trait]
impl GraphTransport for GraphHttpClient {
    async fn get(&self, request: &GraphRequest) -> Result<Option<Value>, GraphError> {
        let url = self.endpoint(request)?;
        let token = self.credential.access_token().await?;

        let mut request_builder = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .query(&request.query_pairs());

        for (name, value) in &request.headers {
            request_builder = request_builder.header(*name, *value);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(path = %request.path(), %status, bytes = body.len(), "graph response");

        if !status.is_success() {
            return Err(service_error(status, body));
        }
        if body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&body)?))
    }
}

pub(crate) fn is_dot_segment(segment: &str) -> bool {
    matches!(segment, "." | "..")
}

fn service_error(status: StatusCode, body: String) -> GraphError {
    let (code, message) = serde_json::from_str::<GraphErrorBody>(&body)
        .map(|parsed| (parsed.error.code, parsed.error.message))
        .unwrap_or_default();

    GraphError::Service {
        status: status.as_u16(),
        code,
        message: message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        }),
        body,
    }
}
