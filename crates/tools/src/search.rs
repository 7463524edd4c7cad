//! Web search tool: offline stand-in for a search API.
//!
//! Returns a fixed-shape result list that echoes the query, stamped with
//! the retrieval date so answers about "current" topics have a date to
//! anchor to.

use async_trait::async_trait;
use chrono::Utc;
use conductor_core::error::ToolError;
use conductor_core::tool::{ParamSpec, ParamType, Tool};
use serde_json::{Map, Value};

use crate::required_str;

pub struct SearchWebTool;

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for current information, news and recent events."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("query", ParamType::String, "The search query"),
            ParamSpec::optional(
                "num_results",
                ParamType::Integer,
                "Number of results to return (default 3, max 5)",
            ),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let query = required_str(arguments, "query")?;
        let count = arguments
            .get("num_results")
            .and_then(Value::as_u64)
            .unwrap_or(3)
            .clamp(1, 5) as usize;

        let slug: String = query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");

        let results: Vec<Value> = (1..=count)
            .map(|rank| {
                serde_json::json!({
                    "rank": rank,
                    "title": format!("{query} (result {rank})"),
                    "url": format!("https://search.example/{slug}/{rank}"),
                    "snippet": format!("Summary of coverage for \"{query}\"."),
                })
            })
            .collect();

        Ok(serde_json::json!({
            "query": query,
            "retrieved": Utc::now().format("%Y-%m-%d").to_string(),
            "results": results,
        }))
    }
}
