//! Wire form of a single Graph GET request.

/// Header Graph requires on `$search` (and advanced `$filter`) queries.
pub const CONSISTENCY_LEVEL_HEADER: &str = "ConsistencyLevel";
pub const CONSISTENCY_LEVEL_EVENTUAL: &str = "eventual";

/// One GET against the Graph API, relative to the configured base URL.
///
/// Path segments are kept unencoded and get percent-encoded by the transport,
/// so an identifier like a UPN can be pushed as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphRequest {
    pub segments: Vec<String>,
    pub top: Option<u8>,
    pub filter: Option<String>,
    pub search: Option<String>,
    pub select: Vec<String>,
    pub headers: Vec<(&'static str, &'static str)>,
}

impl GraphRequest {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_select(mut self, select: Vec<String>) -> Self {
        self.select = select;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.push((name, value));
        self
    }

    /// `/users/jane@contoso.com` style rendering, used for logging.
    #[must_use]
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&'static str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// OData system query options in the order Graph documents them.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(top) = self.top {
            pairs.push(("$top", top.to_string()));
        }
        if let Some(filter) = &self.filter {
            pairs.push(("$filter", filter.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("$search", search.clone()));
        }
        if !self.select.is_empty() {
            pairs.push(("$select", self.select.join(",")));
        }
        pairs
    }
}
