//! Currency conversion tool with a fixed USD-based rate table.

use async_trait::async_trait;
use conductor_core::error::ToolError;
use conductor_core::tool::{ParamSpec, ParamType, Tool};
use serde_json::{Map, Value};

use crate::required_str;

pub struct CurrencyTool;

/// Units of each currency per 1 USD.
const RATES: [(&str, f64); 8] = [
    ("USD", 1.0),
    ("EUR", 0.92),
    ("GBP", 0.79),
    ("JPY", 151.0),
    ("CNY", 7.2),
    ("INR", 83.0),
    ("CAD", 1.36),
    ("AUD", 1.52),
];

fn rate(code: &str) -> Option<f64> {
    RATES
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, r)| *r)
}

#[async_trait]
impl Tool for CurrencyTool {
    fn name(&self) -> &str {
        "convert_currency"
    }

    fn description(&self) -> &str {
        "Convert an amount between currencies (USD, EUR, GBP, JPY, CNY, INR, CAD, AUD)."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("amount", ParamType::Number, "Amount to convert"),
            ParamSpec::required("from", ParamType::String, "Source currency code"),
            ParamSpec::required("to", ParamType::String, "Target currency code"),
        ]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        // Detectors extract amounts from text, so accept numeric strings too.
        let amount = match arguments.get("amount") {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.replace(',', "").trim().parse().ok(),
            _ => None,
        }
        .ok_or_else(|| ToolError::InvalidArguments("Missing or non-numeric 'amount'".into()))?;

        let from = required_str(arguments, "from")?;
        let to = required_str(arguments, "to")?;

        let unsupported = |code: &str| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: format!("Unsupported currency: {code}"),
        };
        let from_rate = rate(from).ok_or_else(|| unsupported(from))?;
        let to_rate = rate(to).ok_or_else(|| unsupported(to))?;

        let converted = (amount / from_rate * to_rate * 100.0).round() / 100.0;
        Ok(serde_json::json!({
            "amount": amount,
            "from": from.to_uppercase(),
            "to": to.to_uppercase(),
            "converted": converted,
            "rate": to_rate / from_rate,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(amount: Value, from: &str, to: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("amount".into(), amount);
        m.insert("from".into(), from.into());
        m.insert("to".into(), to.into());
        m
    }

    #[tokio::test]
    async fn converts_between_currencies() {
        let out = CurrencyTool
            .execute(&args(100.into(), "usd", "EUR"))
            .await
            .unwrap();
        assert_eq!(out["converted"], 92.0);
        assert_eq!(out["from"], "USD");
    }

    #[tokio::test]
    async fn accepts_numeric_strings() {
        let out = CurrencyTool
            .execute(&args("1,000".into(), "EUR", "EUR"))
            .await
            .unwrap();
        assert_eq!(out["converted"], 1000.0);
    }

    #[tokio::test]
    async fn unknown_currency_fails() {
        let err = CurrencyTool
            .execute(&args(5.into(), "USD", "XYZ"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("XYZ"));
    }
}
