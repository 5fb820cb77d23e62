//! Pipe filters applied inside `${...}` placeholders.
//!
//! A filter call is either `name arg1 arg2` (whitespace separated) or
//! `name(arg1, arg2)` (comma separated). Quotes protect whitespace, commas
//! and pipes inside arguments.

use crate::error::{Error, Result};
use serde_json::Value;

/// Apply one filter call to `value`.
pub fn apply(value: Value, expression: &str) -> Result<Value> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Ok(value);
    }

    let (name, args) = parse_call(expression);
    let name = name.trim().to_lowercase();

    match name.as_str() {
        "default" => {
            let fallback = args.into_iter().next().unwrap_or(Value::Null);
            Ok(match &value {
                Value::Null => fallback,
                Value::String(s) if s.is_empty() => fallback,
                _ => value,
            })
        }
        "upper" => Ok(Value::String(text_of(&value).to_uppercase())),
        "lower" => Ok(Value::String(text_of(&value).to_lowercase())),
        "trim" => Ok(Value::String(text_of(&value).trim().to_string())),
        "json" => serde_json::to_string(&value)
            .map(Value::String)
            .map_err(|e| Error::validation(format!("Cannot encode value as JSON: {e}"))),
        "length" => Ok(Value::from(match &value {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            other => text_of(other).chars().count(),
        })),
        _ => Err(Error::validation(format!(
            "Unknown function in pipeline: {name}"
        ))),
    }
}

/// Text form of a value: strings as-is, null as empty, everything else as JSON.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Split on `separator` outside single/double quotes. Quotes are kept.
pub(crate) fn split_unquoted(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in input.chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c == separator && !in_single && !in_double => {
                parts.push(std::mem::take(&mut buf));
                continue;
            }
            _ => {}
        }
        buf.push(ch);
    }
    parts.push(buf);
    parts
}

fn split_whitespace_unquoted(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for ch in input.chars() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => {
                if !buf.is_empty() {
                    parts.push(std::mem::take(&mut buf));
                }
                continue;
            }
            _ => {}
        }
        buf.push(ch);
    }
    if !buf.is_empty() {
        parts.push(buf);
    }
    parts
}

fn find_unquoted(input: &str, needle: char) -> Option<usize> {
    let mut in_single = false;
    let mut in_double = false;
    for (i, ch) in input.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c == needle && !in_single && !in_double => return Some(i),
            _ => {}
        }
    }
    None
}

/// Split a filter call into its name and literal arguments.
fn parse_call(expression: &str) -> (String, Vec<Value>) {
    if expression.ends_with(')') {
        if let Some(open) = find_unquoted(expression, '(') {
            let name = expression[..open].trim().to_string();
            let inside = expression[open + 1..expression.len() - 1].trim();
            let mut raw = split_unquoted(inside, ',');
            if raw.last().is_some_and(|last| last.trim().is_empty()) {
                raw.pop();
            }
            let args = raw.iter().map(|arg| parse_literal(arg)).collect();
            return (name, args);
        }
    }

    let mut parts = split_whitespace_unquoted(expression).into_iter();
    let name = parts.next().unwrap_or_default();
    let args = parts.map(|arg| parse_literal(&arg)).collect();
    (name, args)
}

/// Turn an argument token into a value.
fn parse_literal(token: &str) -> Value {
    let token = token.trim();
    if token.is_empty() {
        return Value::String(String::new());
    }

    if token.len() >= 2
        && ((token.starts_with('\'') && token.ends_with('\''))
            || (token.starts_with('"') && token.ends_with('"')))
    {
        return Value::String(token[1..token.len() - 1].to_string());
    }

    match token.to_lowercase().as_str() {
        "null" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = token.parse::<i64>() {
            return Value::from(n);
        }
        if let Ok(f) = token.parse::<f64>() {
            return Value::from(f);
        }
    }

    if let Some((whole, fraction)) = digits.split_once('.') {
        let is_decimal = whole.bytes().all(|b| b.is_ascii_digit())
            && !fraction.is_empty()
            && fraction.bytes().all(|b| b.is_ascii_digit());
        if is_decimal {
            if let Ok(f) = token.parse::<f64>() {
                return Value::from(f);
            }
        }
    }

    Value::String(token.to_string())
}
