//! Directory tools: signed-in profile, user listing and single-user lookup.
//!
//! Every handler returns `Ok`: directory faults travel inside the result
//! payload so the calling agent can read them.

use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mcp::{
    directory::{DEFAULT_TOP, DirectoryClient, ToolOutcome},
    error::GraphError,
};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetUsersRequest {
    #[schemars(
        description = "OData filter expression (e.g., \"startswith(displayName,'John')\", \"department eq 'Sales'\")"
    )]
    pub filter: Option<String>,

    #[schemars(description = "Search query for displayName, mail, or userPrincipalName")]
    pub search: Option<String>,

    #[schemars(description = "Maximum number of users to return (default: 10, max: 100)")]
    pub top: Option<i64>,

    #[schemars(
        description = "Comma-separated list of properties to select (e.g., \"displayName,mail,department\")"
    )]
    pub select: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GetUserByIdRequest {
    #[serde(rename = "userId", default)]
    #[schemars(description = "User ID (GUID) or User Principal Name (email)")]
    pub user_id: String,

    #[schemars(description = "Comma-separated list of properties to select")]
    pub select: Option<String>,
}

fn structured<T: Serialize>(outcome: &ToolOutcome<T>) -> Result<CallToolResult, ErrorData> {
    let payload = serde_json::to_value(outcome).map_err(GraphError::from)?;
    Ok(if outcome.failure().is_some() {
        CallToolResult::structured_error(payload)
    } else {
        CallToolResult::structured(payload)
    })
}

pub async fn get_user_profile(directory: &DirectoryClient) -> Result<CallToolResult, ErrorData> {
    Ok(match directory.current_user_profile().await {
        ToolOutcome::Success(line) => CallToolResult::success(vec![Content::text(line)]),
        ToolOutcome::Failure(failure) => {
            CallToolResult::error(vec![Content::text(format!("Error: {}", failure.message))])
        }
    })
}

pub async fn get_users(
    directory: &DirectoryClient,
    Parameters(args): Parameters<GetUsersRequest>,
) -> Result<CallToolResult, ErrorData> {
    let outcome = directory
        .list_users(
            args.filter.as_deref(),
            args.search.as_deref(),
            args.top.unwrap_or_else(|| i64::from(DEFAULT_TOP)),
            args.select.as_deref(),
        )
        .await;
    structured(&outcome)
}

pub async fn get_user_by_id(
    directory: &DirectoryClient,
    Parameters(args): Parameters<GetUserByIdRequest>,
) -> Result<CallToolResult, ErrorData> {
    let outcome = directory
        .user_by_id(&args.user_id, args.select.as_deref())
        .await;
    structured(&outcome)
}

pub fn get_graph_authentication_info() -> CallToolResult {
    CallToolResult::success(vec![Content::text(DirectoryClient::authentication_info())])
}
