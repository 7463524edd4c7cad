//! Weather tool: deterministic offline conditions for a location.
//!
//! Conditions are derived from a hash of the normalized location name, so
//! the same city always reports the same weather.

use async_trait::async_trait;
use conductor_core::error::ToolError;
use conductor_core::tool::{ParamSpec, ParamType, Tool};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::required_str;

pub struct WeatherTool;

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get current weather conditions for a location: temperature, conditions, humidity and wind."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("location", ParamType::String, "City or place name"),
            ParamSpec::optional(
                "units",
                ParamType::String,
                "'metric' (default) or 'imperial'",
            ),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let location = required_str(arguments, "location")?;
        let imperial = arguments.get("units").and_then(Value::as_str) == Some("imperial");

        let report = report_for(location, imperial);
        serde_json::to_value(&report).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct WeatherReport {
    location: String,
    temperature: f64,
    units: &'static str,
    conditions: &'static str,
    humidity: u32,
    wind_kph: u32,
}

const CONDITIONS: [&str; 6] = [
    "Sunny",
    "Partly cloudy",
    "Overcast",
    "Light rain",
    "Showers",
    "Clear",
];

fn report_for(location: &str, imperial: bool) -> WeatherReport {
    // FNV-1a over the lowercased name
    let seed = location
        .to_lowercase()
        .bytes()
        .fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193));

    let celsius = (seed % 35) as f64 - 2.0;
    let (temperature, units) = if imperial {
        ((celsius * 1.8 + 32.0).round(), "°F")
    } else {
        (celsius, "°C")
    };

    WeatherReport {
        location: location.to_string(),
        temperature,
        units,
        conditions: CONDITIONS[(seed >> 8) as usize % CONDITIONS.len()],
        humidity: 35 + (seed >> 4) % 55,
        wind_kph: 3 + (seed >> 12) % 30,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(location: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("location".into(), location.into());
        m
    }

    #[tokio::test]
    async fn reports_requested_location() {
        let out = WeatherTool.execute(&args("Tokyo")).await.unwrap();
        assert_eq!(out["location"], "Tokyo");
        assert_eq!(out["units"], "°C");
        assert!(out["conditions"].is_string());
    }

    #[tokio::test]
    async fn deterministic_and_case_insensitive() {
        let a = WeatherTool.execute(&args("London")).await.unwrap();
        let b = WeatherTool.execute(&args("london")).await.unwrap();
        assert_eq!(a["temperature"], b["temperature"]);
        assert_eq!(a["conditions"], b["conditions"]);
    }

    #[tokio::test]
    async fn imperial_units() {
        let mut a = args("Chicago");
        a.insert("units".into(), "imperial".into());
        let out = WeatherTool.execute(&a).await.unwrap();
        assert_eq!(out["units"], "°F");
    }

    #[tokio::test]
    async fn missing_location_is_an_error() {
        assert!(WeatherTool.execute(&Map::new()).await.is_err());
        assert!(WeatherTool.execute(&args("   ")).await.is_err());
    }
}
