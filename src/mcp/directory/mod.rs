//! Directory client facade over Microsoft Graph.
//!
//! Turns tool parameters into Graph queries and every outcome, including
//! transport and authentication faults, into a [`ToolOutcome`]. No method
//! here returns an error to its caller.

pub mod envelope;
pub mod model;
pub mod query;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::mcp::{
    error::GraphError,
    http::{GraphRequest, GraphTransport, is_dot_segment},
};

pub use envelope::{ToolFailure, ToolOutcome};
use model::{GraphCollection, GraphUser, UserDetail, UserListResult, UserSummary};
pub use query::DEFAULT_TOP;
use query::UserQuery;

/// Operator guidance returned by `get_graph_authentication_info`.
pub const AUTHENTICATION_INFO: &str = r#"{
  "message": "To use Microsoft Graph tools, you need to configure authentication",
  "steps": [
    "1. Register an application in Azure Active Directory (Microsoft Entra ID)",
    "2. Grant appropriate permissions (User.Read.All, User.ReadBasic.All, etc.)",
    "3. Create a client secret or certificate, or enable public client flows for interactive and device code sign-in",
    "4. Set GRAPH_AUTH_FLOW and the matching AZURE_* environment variables, then restart the server"
  ],
  "requiredPermissions": [
    "User.Read.All - Read all users' full profiles",
    "User.ReadBasic.All - Read all users' basic profiles",
    "User.Read - Read signed-in user's profile",
    "Directory.Read.All - Read directory data"
  ],
  "codeExample": "GRAPH_AUTH_FLOW=client_secret\nAZURE_TENANT_ID=your-tenant-id\nAZURE_CLIENT_ID=your-client-id\nAZURE_CLIENT_SECRET=your-client-secret"
}"#;

pub struct DirectoryClient {
    transport: Option<Arc<dyn GraphTransport>>,
}

impl DirectoryClient {
    #[must_use]
    pub fn new(transport: Arc<dyn GraphTransport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A facade with no Graph client: every directory call reports
    /// `not_configured`.
    #[must_use]
    pub const fn unconfigured() -> Self {
        Self { transport: None }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&self) -> Result<&dyn GraphTransport, ToolFailure> {
        self.transport
            .as_deref()
            .ok_or_else(ToolFailure::not_configured)
    }

    /// `"User: <displayName> (<userPrincipalName>)"` for the signed-in user.
    pub async fn current_user_profile(&self) -> ToolOutcome<String> {
        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(failure) => return failure.into(),
        };

        let user = match fetch_user(transport, &GraphRequest::new(["me"])).await {
            Ok(Some(user)) => user,
            Ok(None) => GraphUser::default(),
            Err(err) => return fault(&err, "get_user_profile"),
        };

        ToolOutcome::Success(format!(
            "User: {} ({})",
            user.display_name.unwrap_or_default(),
            user.user_principal_name.unwrap_or_default()
        ))
    }

    /// One page of users matching the optional `filter` / `search`.
    pub async fn list_users(
        &self,
        filter: Option<&str>,
        search: Option<&str>,
        top: i64,
        select: Option<&str>,
    ) -> ToolOutcome<UserListResult> {
        let query = UserQuery::new(filter, search, top, select);
        if i64::from(query.top) != top {
            debug!(requested = top, applied = query.top, "top outside 1..=100, using default");
        }

        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(failure) => return failure.into(),
        };

        let request = query.into_request();
        debug!(path = %request.path(), query = ?request.query_pairs(), "listing users");

        let page = match transport.get(&request).await.and_then(|body| {
            body.map_or_else(
                || Ok(GraphCollection { value: Vec::new() }),
                |body| serde_json::from_value::<GraphCollection<GraphUser>>(body).map_err(GraphError::from),
            )
        }) {
            Ok(page) => page,
            Err(err) => return fault(&err, "get_users"),
        };

        let users: Vec<UserSummary> = page.value.into_iter().map(UserSummary::from).collect();
        ToolOutcome::Success(UserListResult {
            total_count: users.len(),
            users,
            applied_filter: filter.map(str::to_string),
            applied_search: search.map(str::to_string),
            selected_properties: select.map(str::to_string),
        })
    }

    /// Looks a user up by object ID or user principal name.
    pub async fn user_by_id(&self, user_id: &str, select: Option<&str>) -> ToolOutcome<UserDetail> {
        if user_id.trim().is_empty() {
            return ToolFailure::invalid_input("User ID or User Principal Name is required").into();
        }

        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(failure) => return failure.into(),
        };
        if is_dot_segment(user_id) {
            return ToolFailure::not_found(user_id).into();
        }

        let request = GraphRequest::new(["users", user_id]).with_select(query::parse_select(select));
        match fetch_user(transport, &request).await {
            Ok(Some(user)) => {
                ToolOutcome::Success(UserDetail::from_graph(user, select.map(str::to_string)))
            }
            Ok(None) | Err(GraphError::Service { status: 404, .. }) => {
                debug!(%user_id, "user not found");
                ToolFailure::not_found(user_id).into()
            }
            Err(err) => fault(&err, "get_user_by_id"),
        }
    }

    /// Static setup guidance; never touches Graph.
    #[must_use]
    pub const fn authentication_info() -> &'static str {
        AUTHENTICATION_INFO
    }
}

async fn fetch_user(
    transport: &dyn GraphTransport,
    request: &GraphRequest,
) -> Result<Option<GraphUser>, GraphError> {
    transport
        .get(request)
        .await?
        .map(serde_json::from_value)
        .transpose()
        .map_err(GraphError::from)
}

fn fault<T>(err: &GraphError, operation: &'static str) -> ToolOutcome<T> {
    warn!(%err, operation, kind = err.classification(), "directory call failed");
    ToolFailure::from(err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use tokio::sync::Mutex;

    use super::envelope::{ConfigurationHint, FailureKind};
    use crate::mcp::http::{CONSISTENCY_LEVEL_EVENTUAL, CONSISTENCY_LEVEL_HEADER};

    type Responder = Box<dyn Fn(&GraphRequest) -> Result<Option<Value>, GraphError> + Send + Sync>;

    /// Records every request and answers with `respond`.
    struct StubTransport {
        calls: Mutex<Vec<GraphRequest>>,
        respond: Responder,
    }

    impl StubTransport {
        fn new(
            respond: impl Fn(&GraphRequest) -> Result<Option<Value>, GraphError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                respond: Box::new(respond),
            })
        }

        fn returning(body: Value) -> Arc<Self> {
            Self::new(move |_| Ok(Some(body.clone())))
        }

        async fn calls(&self) -> Vec<GraphRequest> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl GraphTransport for StubTransport {
        async fn get(&self, request: &GraphRequest) -> Result<Option<Value>, GraphError> {
            self.calls.lock().await.push(request.clone());
            (self.respond)(request)
        }
    }

    fn directory(stub: &Arc<StubTransport>) -> DirectoryClient {
        DirectoryClient::new(Arc::clone(stub) as Arc<dyn GraphTransport>)
    }

    fn fabricated_users(count: usize) -> Value {
        let users: Vec<Value> = (0..count)
            .map(|i| {
                json!({
                    "id": format!("id-{i}"),
                    "displayName": format!("User {i}"),
                    "userPrincipalName": format!("user{i}@contoso.com"),
                    "businessPhones": [],
                    "accountEnabled": true
                })
            })
            .collect();
        json!({ "value": users })
    }

    fn forbidden() -> GraphError {
        GraphError::Service {
            status: 403,
            code: Some("Authorization_RequestDenied".to_string()),
            message: "Insufficient privileges to complete the operation.".to_string(),
            body: r#"{"error":{"code":"Authorization_RequestDenied"}}"#.to_string(),
        }
    }

    fn expect_failure<T: std::fmt::Debug>(outcome: &ToolOutcome<T>) -> Result<&ToolFailure> {
        outcome
            .failure()
            .ok_or_else(|| anyhow!("expected a failure, got {outcome:?}"))
    }

    #[tokio::test]
    async fn out_of_range_top_still_issues_call_with_ten() -> Result<()> {
        for top in [0, -5, 101, 1000] {
            let stub = StubTransport::returning(fabricated_users(0));
            let outcome = directory(&stub).list_users(None, None, top, None).await;
            assert!(outcome.failure().is_none());

            let calls = stub.calls().await;
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].top, Some(DEFAULT_TOP), "top = {top}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn blank_user_id_is_invalid_input_without_remote_call() -> Result<()> {
        let stub = StubTransport::returning(json!({"id": "1"}));
        let client = directory(&stub);
        for user_id in ["", "   ", "\t\n"] {
            let outcome = client.user_by_id(user_id, None).await;
            assert_eq!(expect_failure(&outcome)?.error, FailureKind::InvalidInput);
        }
        assert!(stub.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_client_reports_not_configured() -> Result<()> {
        let client = DirectoryClient::unconfigured();
        assert!(!client.is_configured());

        let listed = client.list_users(Some("department eq 'Sales'"), None, 10, None).await;
        let failure = expect_failure(&listed)?;
        assert_eq!(failure.error, FailureKind::NotConfigured);
        assert_eq!(failure.configuration_required, Some(ConfigurationHint::default()));

        let fetched = client.user_by_id("adele@contoso.com", None).await;
        let failure = expect_failure(&fetched)?;
        assert_eq!(failure.error, FailureKind::NotConfigured);
        assert!(failure.configuration_required.is_some());

        let profile = client.current_user_profile().await;
        assert_eq!(expect_failure(&profile)?.error, FailureKind::NotConfigured);
        Ok(())
    }

    #[tokio::test]
    async fn search_adds_eventual_consistency_and_quotes() -> Result<()> {
        let stub = StubTransport::returning(fabricated_users(1));
        directory(&stub)
            .list_users(None, Some("john@contoso.com"), 10, None)
            .await;

        let calls = stub.calls().await;
        assert_eq!(calls[0].search.as_deref(), Some("\"john@contoso.com\""));
        assert_eq!(
            calls[0].header(CONSISTENCY_LEVEL_HEADER),
            Some(CONSISTENCY_LEVEL_EVENTUAL)
        );
        Ok(())
    }

    #[tokio::test]
    async fn select_list_drops_empty_entries() -> Result<()> {
        let stub = StubTransport::returning(fabricated_users(1));
        let client = directory(&stub);
        client.list_users(None, None, 10, Some("displayName,mail")).await;
        client.list_users(None, None, 10, Some("displayName,,mail")).await;
        client.user_by_id("42", Some("displayName,,mail")).await;

        for call in stub.calls().await {
            assert_eq!(call.select, vec!["displayName", "mail"]);
        }
        Ok(())
    }

    #[tokio::test]
    async fn page_of_n_users_reports_total_count_n() -> Result<()> {
        let stub = StubTransport::returning(fabricated_users(7));
        let outcome = directory(&stub)
            .list_users(Some("accountEnabled eq true"), Some("User"), 7, Some("id,displayName"))
            .await;

        let ToolOutcome::Success(result) = outcome else {
            return Err(anyhow!("expected success"));
        };
        assert_eq!(result.users.len(), 7);
        assert_eq!(result.total_count, 7);
        assert_eq!(result.users[3].display_name.as_deref(), Some("User 3"));
        assert_eq!(result.applied_filter.as_deref(), Some("accountEnabled eq true"));
        assert_eq!(result.applied_search.as_deref(), Some("User"));
        assert_eq!(result.selected_properties.as_deref(), Some("id,displayName"));
        Ok(())
    }

    #[tokio::test]
    async fn remote_403_is_graph_api_error() -> Result<()> {
        let stub = StubTransport::new(|_| Err(forbidden()));
        let client = directory(&stub);

        let listed = client.list_users(None, None, 10, None).await;
        let failure = expect_failure(&listed)?;
        assert_eq!(failure.error, FailureKind::GraphApiError);
        assert_eq!(failure.code, Some(403));

        let fetched = client.user_by_id("42", None).await;
        assert_eq!(expect_failure(&fetched)?.code, Some(403));
        Ok(())
    }

    #[tokio::test]
    async fn transport_fault_is_unexpected_error() -> Result<()> {
        let stub = StubTransport::new(|_| Err(GraphError::Internal(anyhow!("connection reset"))));
        let outcome = directory(&stub).list_users(None, None, 10, None).await;
        let failure = expect_failure(&outcome)?;
        assert_eq!(failure.error, FailureKind::UnexpectedError);
        assert_eq!(failure.fault_type, Some("internal"));
        Ok(())
    }

    #[tokio::test]
    async fn malformed_page_is_unexpected_serialization_error() -> Result<()> {
        let stub = StubTransport::returning(json!({"value": "not-a-list"}));
        let outcome = directory(&stub).list_users(None, None, 10, None).await;
        assert_eq!(expect_failure(&outcome)?.fault_type, Some("serialization"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_user_is_not_found_with_identifier() -> Result<()> {
        let empty = StubTransport::new(|_| Ok(None));
        let outcome = directory(&empty).user_by_id("ghost@contoso.com", None).await;
        let failure = expect_failure(&outcome)?;
        assert_eq!(failure.error, FailureKind::NotFound);
        assert!(failure.message.contains("ghost@contoso.com"));

        let missing = StubTransport::new(|_| {
            Err(GraphError::Service {
                status: 404,
                code: Some("Request_ResourceNotFound".to_string()),
                message: "Resource 'ghost' does not exist".to_string(),
                body: String::new(),
            })
        });
        let outcome = directory(&missing).user_by_id("ghost", None).await;
        let failure = expect_failure(&outcome)?;
        assert_eq!(failure.error, FailureKind::NotFound);
        assert!(failure.message.ends_with("ghost"));
        Ok(())
    }

    #[tokio::test]
    async fn dot_segment_user_id_is_not_found_without_remote_call() -> Result<()> {
        let stub = StubTransport::returning(json!({"value": []}));
        let client = directory(&stub);
        for user_id in ["..", "."] {
            let outcome = client.user_by_id(user_id, None).await;
            let failure = expect_failure(&outcome)?;
            assert_eq!(failure.error, FailureKind::NotFound);
            assert!(failure.message.ends_with(user_id));
        }
        assert!(stub.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn user_by_id_maps_detail_and_requests_user_path() -> Result<()> {
        let stub = StubTransport::returning(json!({
            "id": "42",
            "displayName": "Adele Vance",
            "userPrincipalName": "adele@contoso.com",
            "signInActivity": {"lastSignInDateTime": "2024-10-01T08:00:00Z"},
            "country": "US"
        }));
        let outcome = directory(&stub).user_by_id("adele@contoso.com", None).await;

        let ToolOutcome::Success(detail) = outcome else {
            return Err(anyhow!("expected success"));
        };
        assert_eq!(detail.summary.id.as_deref(), Some("42"));
        assert_eq!(detail.country.as_deref(), Some("US"));
        assert!(detail.last_sign_in_date_time.is_some());

        let calls = stub.calls().await;
        assert_eq!(calls[0].segments, vec!["users", "adele@contoso.com"]);
        assert!(calls[0].select.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn profile_formats_name_and_upn() -> Result<()> {
        let stub = StubTransport::returning(json!({
            "displayName": "Megan Bowen",
            "userPrincipalName": "megan@contoso.com"
        }));
        let outcome = directory(&stub).current_user_profile().await;
        assert_eq!(
            outcome,
            ToolOutcome::Success("User: Megan Bowen (megan@contoso.com)".to_string())
        );
        assert_eq!(stub.calls().await[0].path(), "/me");
        Ok(())
    }

    #[tokio::test]
    async fn profile_fault_keeps_message() -> Result<()> {
        let stub = StubTransport::new(|_| Err(forbidden()));
        let outcome = directory(&stub).current_user_profile().await;
        assert_eq!(
            expect_failure(&outcome)?.message,
            "Insufficient privileges to complete the operation."
        );
        Ok(())
    }

    #[test]
    fn authentication_info_is_valid_json() -> Result<()> {
        let info: Value = serde_json::from_str(DirectoryClient::authentication_info())?;
        assert!(info["steps"].as_array().is_some_and(|steps| steps.len() == 4));
        assert!(info["requiredPermissions"].as_array().is_some_and(|p| !p.is_empty()));
        assert!(info["message"].is_string());
        Ok(())
    }
}
