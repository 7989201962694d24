//! User records as returned by Graph and as returned to MCP clients.
//!
//! Field names are camelCase on both sides. Properties Graph did not return
//! (for example because of `$select`) serialize as `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw Graph `user` resource, limited to the properties this server reports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUser {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub office_location: Option<String>,
    pub mobile_phone: Option<String>,
    pub business_phones: Option<Vec<String>>,
    pub account_enabled: Option<bool>,
    pub created_date_time: Option<DateTime<Utc>>,
    pub sign_in_activity: Option<SignInActivity>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInActivity {
    pub last_sign_in_date_time: Option<DateTime<Utc>>,
}

/// Graph collection envelope (`{"value": [...]}`).
#[derive(Debug, Deserialize)]
pub struct GraphCollection<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub user_principal_name: Option<String>,
    pub department: Option<String>,
    pub job_title: Option<String>,
    pub office_location: Option<String>,
    pub mobile_phone: Option<String>,
    pub business_phones: Option<Vec<String>>,
    pub account_enabled: Option<bool>,
}

impl From<GraphUser> for UserSummary {
    fn from(user: GraphUser) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name,
            mail: user.mail,
            user_principal_name: user.user_principal_name,
            department: user.department,
            job_title: user.job_title,
            office_location: user.office_location,
            mobile_phone: user.mobile_phone,
            business_phones: user.business_phones,
            account_enabled: user.account_enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub summary: UserSummary,
    pub created_date_time: Option<DateTime<Utc>>,
    /// Omitted entirely when Graph returned no `signInActivity`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sign_in_date_time: Option<DateTime<Utc>>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub company_name: Option<String>,
    pub selected_properties: Option<String>,
}

impl UserDetail {
    #[must_use]
    pub fn from_graph(user: GraphUser, selected_properties: Option<String>) -> Self {
        let created_date_time = user.created_date_time;
        let last_sign_in_date_time = user
            .sign_in_activity
            .as_ref()
            .and_then(|activity| activity.last_sign_in_date_time);
        let city = user.city.clone();
        let country = user.country.clone();
        let company_name = user.company_name.clone();

        Self {
            summary: UserSummary::from(user),
            created_date_time,
            last_sign_in_date_time,
            city,
            country,
            company_name,
            selected_properties,
        }
    }
}

/// One page of `get_users`.
///
/// `total_count` is the number of users in this page, not the size of the
/// whole directory: `$count` is never requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResult {
    pub total_count: usize,
    pub users: Vec<UserSummary>,
    pub applied_filter: Option<String>,
    pub applied_search: Option<String>,
    pub selected_properties: Option<String>,
}
