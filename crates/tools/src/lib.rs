//! Built-in tool implementations for Conductor.
//!
//! These are deterministic, offline stand-ins for the real capabilities
//! (weather service, search engine, FX rates). They honour the same
//! parameter contracts as the production tools, so the engine can be run
//! and tested end to end without network access.

pub mod calculate;
pub mod currency;
pub mod search;
pub mod weather;

use conductor_core::tool::ToolRegistry;

pub use calculate::CalculateTool;
pub use currency::CurrencyTool;
pub use search::SearchWebTool;
pub use weather::WeatherTool;

/// Create a registry with all built-in tools, in presentation order.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(WeatherTool));
    registry.register(Box::new(CalculateTool));
    registry.register(Box::new(CurrencyTool));
    registry.register(Box::new(SearchWebTool));
    registry
}

/// Read a required string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str, conductor_core::ToolError> {
    arguments
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| conductor_core::ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_order() {
        let registry = default_registry();
        assert_eq!(
            registry.names(),
            vec!["get_weather", "calculate", "convert_currency", "search_web"]
        );
    }
}
