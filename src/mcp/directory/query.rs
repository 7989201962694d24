//! Normalization of `get_users` parameters into a Graph users query.

use crate::mcp::http::{CONSISTENCY_LEVEL_EVENTUAL, CONSISTENCY_LEVEL_HEADER, GraphRequest};

pub const DEFAULT_TOP: u8 = 10;
const MAX_TOP: u8 = 100;

/// Validated form of the `get_users` parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserQuery {
    pub filter: Option<String>,
    pub search: Option<String>,
    pub top: u8,
    pub select: Vec<String>,
}

impl UserQuery {
    /// Blank strings count as absent; an out-of-range `top` silently becomes
    /// [`DEFAULT_TOP`].
    #[must_use]
    pub fn new(filter: Option<&str>, search: Option<&str>, top: i64, select: Option<&str>) -> Self {
        Self {
            filter: non_blank(filter).map(str::to_string),
            search: non_blank(search).map(str::to_string),
            top: normalize_top(top),
            select: parse_select(select),
        }
    }

    /// `GET /users`. `$filter` is passed through untouched; `$search` is
    /// quoted and needs eventual consistency.
    #[must_use]
    pub fn into_request(self) -> GraphRequest {
        let mut request = GraphRequest::new(["users"]).with_select(self.select);
        request.top = Some(self.top);
        request.filter = self.filter;
        if let Some(search) = self.search {
            request.search = Some(format!("\"{search}\""));
            request = request.with_header(CONSISTENCY_LEVEL_HEADER, CONSISTENCY_LEVEL_EVENTUAL);
        }
        request
    }
}

#[must_use]
pub fn normalize_top(top: i64) -> u8 {
    u8::try_from(top)
        .ok()
        .filter(|top| (1..=MAX_TOP).contains(top))
        .unwrap_or(DEFAULT_TOP)
}

/// Splits a comma-separated property list, dropping empty entries.
#[must_use]
pub fn parse_select(select: Option<&str>) -> Vec<String> {
    select
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
