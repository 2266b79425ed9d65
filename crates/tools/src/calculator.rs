//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `^` (right-associative), parentheses,
//! unary signs and decimal numbers. Parsing is precedence climbing over a
//! token list.

use std::collections::BTreeMap;
use async_trait::async_trait;
use agentflow_core::context::RunContext;
use agentflow_core::error::ToolError;
use agentflow_core::tool::{ParameterSpec, Tool};
use tracing::debug;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses and decimal numbers."
    }

    fn parameters(&self) -> BTreeMap<String, ParameterSpec> {
        BTreeMap::from([(
            "expression".to_string(),
            ParameterSpec::required("string", "The expression to evaluate, e.g. '(2 + 3) * 4'"),
        )])
    }

    /// Accepts `{"expression": "..."}` or the bare expression text, which is
    /// what a plan step without parameters passes through.
    async fn execute(&self, _ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        let expr = expression_from(arguments)?;
        debug!(expression = %expr, "Evaluating");
        let value = evaluate(&expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason,
        })?;
        Ok(format_number(value))
    }
}

fn expression_from(arguments: &str) -> Result<String, ToolError> {
    let trimmed = arguments.trim();
    if !trimmed.starts_with('{') {
        if trimmed.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'expression' argument".into()));
        }
        return Ok(trimmed.to_string());
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("Arguments are not valid JSON: {e}")))?;
    match &value["expression"] {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        _ => Err(ToolError::InvalidArguments("Missing 'expression' argument".into())),
    }
}

/// Integers print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let value = parser.expression(0)?;
    if let Some(tok) = parser.tokens.get(parser.pos) {
        return Err(format!("Unexpected '{tok}' at token {}", parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Op(char),
    Open,
    Close,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Op(c) => write!(f, "{c}"),
            Token::Open => write!(f, "("),
            Token::Close => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '^' => {
                tokens.push(Token::Op(c));
                chars.next();
            }
            '(' => {
                tokens.push(Token::Open);
                chars.next();
            }
            ')' => {
                tokens.push(Token::Close);
                chars.next();
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Num(n));
            }
            other => return Err(format!("Unexpected character: '{other}'")),
        }
    }

    Ok(tokens)
}

/// Binding power of a binary operator, and whether it binds to the right.
fn binding(op: char) -> Option<(u8, bool)> {
    match op {
        '+' | '-' => Some((1, false)),
        '*' | '/' | '%' => Some((2, false)),
        '^' => Some((4, true)),
        _ => None,
    }
}

/// Unary signs bind tighter than `*` but looser than `^`, so `-2^2 == -4`.
const UNARY_POWER: u8 = 3;

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).copied();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expression(&mut self, min_power: u8) -> Result<f64, String> {
        let mut lhs = self.operand()?;

        while let Some(Token::Op(op)) = self.tokens.get(self.pos).copied() {
            let Some((power, right_assoc)) = binding(op) else { break };
            if power < min_power {
                break;
            }
            self.pos += 1;
            let next_min = if right_assoc { power } else { power + 1 };
            let rhs = self.expression(next_min)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn operand(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::Op('-')) => Ok(-self.expression(UNARY_POWER)?),
            Some(Token::Op('+')) => self.expression(UNARY_POWER),
            Some(Token::Open) => {
                let value = self.expression(0)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected '{tok}'")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

fn apply(op: char, lhs: f64, rhs: f64) -> Result<f64, String> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' if rhs == 0.0 => Err("Division by zero".into()),
        '/' => Ok(lhs / rhs),
        '%' if rhs == 0.0 => Err("Modulo by zero".into()),
        '%' => Ok(lhs % rhs),
        '^' => Ok(lhs.powf(rhs)),
        other => Err(format!("Unknown operator '{other}'")),
    }
}
