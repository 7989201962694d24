//! HTTP client and API communication layer for Microsoft Graph.
//!
//! This module handles all HTTP communication with the Graph REST API,
//! including bearer authentication, OData query construction, and
//! classification of error responses.

mod client;
mod request;

// Re-export client's public API
pub use client::{GRAPH_BASE_URL, GraphHttpClient, GraphTransport};
pub(crate) use client::is_dot_segment;
pub use request::{CONSISTENCY_LEVEL_EVENTUAL, CONSISTENCY_LEVEL_HEADER, GraphRequest};
