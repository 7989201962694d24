//! Sample tools with no Graph dependency, handy for checking a client setup.

use rand::Rng;
use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mcp::error::GraphError;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RandomNumberRequest {
    #[serde(default)]
    #[schemars(description = "Minimum value (inclusive)")]
    pub min: i32,

    #[serde(default = "default_max")]
    #[schemars(description = "Maximum value (exclusive)")]
    pub max: i32,
}

const fn default_max() -> i32 {
    100
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ItalyCitiesRequest {
    #[serde(rename = "northOrSouth", default = "default_region")]
    #[schemars(description = "Indicate if want a city in north or south")]
    pub north_or_south: String,
}

fn default_region() -> String {
    "north".to_string()
}

/// Uniform value in `[min, max)`; `min` itself when the range is empty.
fn random_in_range(min: i32, max: i32) -> Result<i32, GraphError> {
    match min.cmp(&max) {
        std::cmp::Ordering::Less => Ok(rand::thread_rng().gen_range(min..max)),
        std::cmp::Ordering::Equal => Ok(min),
        std::cmp::Ordering::Greater => Err(GraphError::InvalidParams(format!(
            "min ({min}) must not be greater than max ({max})"
        ))),
    }
}

pub fn get_random_number(
    Parameters(args): Parameters<RandomNumberRequest>,
) -> Result<CallToolResult, ErrorData> {
    let value = random_in_range(args.min, args.max)?;
    Ok(CallToolResult::success(vec![Content::text(value.to_string())]))
}

#[must_use]
pub fn italy_city(north_or_south: &str) -> &'static str {
    if north_or_south == "north" { "Milan" } else { "Naples" }
}

pub fn get_italy_cities(Parameters(args): Parameters<ItalyCitiesRequest>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(italy_city(&args.north_or_south))])
}
