//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+ - * / % ^`, parentheses, unary minus and decimals, with the
//! usual precedence (`^` binds tightest and is right-associative). A small
//! precedence-climbing parser; no dependencies beyond std.

use async_trait::async_trait;
use conductor_core::error::ToolError;
use conductor_core::tool::{ParamSpec, ParamType, Tool};
use serde_json::{Map, Value};

use crate::required_str;

pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^ and parentheses."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required(
            "expression",
            ParamType::String,
            "The expression to evaluate, e.g. '(2 + 3) * 4'",
        )]
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let expression = required_str(arguments, "expression")?;
        let value = evaluate(expression).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason,
        })?;

        Ok(serde_json::json!({
            "expression": expression,
            "result": number_value(value),
        }))
    }
}

/// Whole numbers are reported as integers so `12 * 7` yields `84`, not `84.0`.
fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr(0)?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected token {tok:?}"));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Tok {
    Num(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else if d == ',' {
                        // Thousands separator: "1,200"
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = num
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number: {num}"))?;
                out.push(Tok::Num(value));
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                out.push(Tok::Op(c));
                chars.next();
            }
            'x' | '×' => {
                out.push(Tok::Op('*'));
                chars.next();
            }
            '÷' => {
                out.push(Tok::Op('/'));
                chars.next();
            }
            '(' => {
                out.push(Tok::Open);
                chars.next();
            }
            ')' => {
                out.push(Tok::Close);
                chars.next();
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

/// (left binding power, right binding power)
fn binding_power(op: char) -> Option<(u8, u8)> {
    match op {
        '+' | '-' => Some((1, 2)),
        '*' | '/' | '%' => Some((3, 4)),
        '^' => Some((6, 5)),
        _ => None,
    }
}

impl Parser {
    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).copied();
        self.pos += 1;
        tok
    }

    fn expr(&mut self, min_bp: u8) -> Result<f64, String> {
        let mut lhs = match self.next() {
            Some(Tok::Num(n)) => n,
            Some(Tok::Op('-')) => -self.expr(5)?,
            Some(Tok::Op('+')) => self.expr(5)?,
            Some(Tok::Open) => {
                let inner = self.expr(0)?;
                if self.next() != Some(Tok::Close) {
                    return Err("Missing closing parenthesis".into());
                }
                inner
            }
            Some(tok) => return Err(format!("Unexpected token {tok:?}")),
            None => return Err("Unexpected end of expression".into()),
        };

        while let Some(Tok::Op(op)) = self.tokens.get(self.pos).copied() {
            let Some((l_bp, r_bp)) = binding_power(op) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.expr(r_bp)?;
            lhs = match op {
                '+' => lhs + rhs,
                '-' => lhs - rhs,
                '*' => lhs * rhs,
                '/' if rhs == 0.0 => return Err("Division by zero".into()),
                '/' => lhs / rhs,
                '%' if rhs == 0.0 => return Err("Modulo by zero".into()),
                '%' => lhs % rhs,
                '^' => lhs.powf(rhs),
                other => return Err(format!("Unknown operator '{other}'")),
            };
        }
        Ok(lhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(expr: &str) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("expression".into(), expr.into());
        m
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("1,200 / 4").unwrap(), 300.0);
    }

    #[test]
    fn errors_are_reported() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("(1 + 2").is_err());
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("two plus two").is_err());
        assert!(evaluate("").is_err());
    }

    #[tokio::test]
    async fn integer_results_are_integers() {
        let out = CalculateTool.execute(&args("12 * 7")).await.unwrap();
        assert_eq!(out["result"], 84);
        assert!(out["result"].is_i64());
    }

    #[tokio::test]
    async fn fractional_results_are_floats() {
        let out = CalculateTool.execute(&args("7 / 2")).await.unwrap();
        assert_eq!(out["result"], 3.5);
    }

    #[tokio::test]
    async fn bad_expression_is_execution_failure() {
        let err = CalculateTool.execute(&args("5 / 0")).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_expression_is_invalid_arguments() {
        let err = CalculateTool.execute(&Map::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
