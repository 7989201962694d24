//! MCP tools exposed by the server.
//!
//! - `users`: Microsoft Graph directory lookups backed by [`DirectoryClient`]
//! - `demo`: random number and Italian city samples
//!
//! [`DirectoryClient`]: crate::mcp::directory::DirectoryClient

pub mod demo;
pub mod users;
