//! Microsoft Graph directory Model Context Protocol implementation.
//!
//! The implementation is organized into:
//!
//! - `auth`: OAuth credential flows and token caching
//! - `directory`: the directory facade and its JSON result envelope
//! - `error`: Error types and conversions
//! - `http`: Graph HTTP transport
//! - `tools`: MCP tool handlers
//!
//! The main entry point is the `GraphMCPFactory` which provides the MCP server
//! implementation and manages all tools.

pub mod auth;
pub mod directory;
pub mod error;
pub mod http;
pub mod tools;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::request;
use rmcp::{
    ErrorData, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult, Implementation, InitializeRequestParam, InitializeResult,
        ProtocolVersion, ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use tracing::{info, warn};

use crate::mcp::{
    auth::{AUTHORITY_HOST, AuthFlow, CredentialConfig, build_credential},
    directory::DirectoryClient,
    http::{GRAPH_BASE_URL, GraphHttpClient},
    tools::{
        demo::{self, ItalyCitiesRequest, RandomNumberRequest},
        users::{self, GetUserByIdRequest, GetUsersRequest},
    },
};

/// Builds the directory facade from the process environment.
///
/// Only the `environment` flow may come back unconfigured; every other flow
/// fails here when its variables are missing or its certificate is unreadable.
///
/// # Errors
/// Misconfiguration of the selected credential flow or Graph base URL.
pub fn directory_from_env() -> Result<DirectoryClient> {
    let flow = AuthFlow::from_env().context("Failed to read the Graph authentication flow")?;
    let Some(config) = CredentialConfig::resolve(flow)
        .with_context(|| format!("Failed to load credentials for the {flow} flow"))?
    else {
        warn!(%flow, "Graph credentials incomplete, directory tools will report not_configured");
        return Ok(DirectoryClient::unconfigured());
    };

    info!(%flow, tenant_id = config.tenant_id(), client_id = config.client_id(), "configuring Graph credential");
    let credential = build_credential(config, &AUTHORITY_HOST)
        .context("Failed to build the Graph credential")?;
    let transport = GraphHttpClient::new(credential, &GRAPH_BASE_URL)
        .with_context(|| format!("Failed to build the Graph client for {}", *GRAPH_BASE_URL))?;

    Ok(DirectoryClient::new(Arc::new(transport)))
}

#[derive(Clone)]
pub struct GraphMCPFactory {
    directory: Arc<DirectoryClient>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GraphMCPFactory {
    pub fn new(directory: Arc<DirectoryClient>) -> Self {
        Self {
            directory,
            tool_router: Self::tool_router(),
        }
    }

    // Thin delegating methods so the `tool_router` proc-macro (which scans
    // this impl block) can register the tools implemented in `mcp::tools::*`.

    #[tool(description = "Get the current user's profile information from Microsoft Graph")]
    async fn get_user_profile(&self) -> Result<CallToolResult, ErrorData> {
        users::get_user_profile(&self.directory).await
    }

    #[tool(
        description = "Get users from Microsoft Graph with optional filtering and search. Supports OData filter expressions and search queries."
    )]
    async fn get_users(
        &self,
        params: Parameters<GetUsersRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        users::get_users(&self.directory, params).await
    }

    #[tool(description = "Get a specific user by their ID or User Principal Name from Microsoft Graph")]
    async fn get_user_by_id(
        &self,
        params: Parameters<GetUserByIdRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        users::get_user_by_id(&self.directory, params).await
    }

    #[tool(description = "Get authentication setup information for Microsoft Graph API")]
    async fn get_graph_authentication_info(&self) -> Result<CallToolResult, ErrorData> {
        Ok(users::get_graph_authentication_info())
    }

    #[tool(description = "Generates a random number between the specified minimum and maximum values.")]
    async fn get_random_number(
        &self,
        params: Parameters<RandomNumberRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        demo::get_random_number(params)
    }

    #[tool(description = "Get representing an Italian city.")]
    async fn get_italy_cities(
        &self,
        params: Parameters<ItalyCitiesRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        Ok(demo::get_italy_cities(params))
    }
}

#[tool_handler]
impl ServerHandler for GraphMCPFactory {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Microsoft Graph directory MCP Server: look up the signed-in user, search and list users, and fetch users by ID or UPN"
                    .to_string(),
            ),
            ..Default::default()
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, ErrorData> {
        if let Some(http_request_part) = context.extensions.get::<request::Parts>() {
            let initialize_headers = &http_request_part.headers;
            let initialize_uri = &http_request_part.uri;
            info!(?initialize_headers, %initialize_uri, graph_configured = self.directory.is_configured(), "initialize from http server");
        }
        Ok(self.get_info())
    }
}
