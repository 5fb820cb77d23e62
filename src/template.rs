//! Resolution of `${...}` placeholders in step parameters.
//!
//! A placeholder is a context query followed by optional pipe filters:
//! `${inputs.name | default 'anon' | upper}`.
//!
//! When a string is exactly one placeholder (surrounding whitespace aside)
//! the typed value is returned, so `${step.list.rows}` stays an array. When
//! placeholders are embedded in text each is replaced by its text form;
//! arrays and mappings are pretty-printed on their own lines.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::filters;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static WHOLE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\$\{([^}]+)\}\s*$").expect("valid regex"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

/// Resolve every placeholder inside `value` against `ctx`.
pub fn resolve(value: &Value, ctx: &Context) -> Result<Value> {
    match value {
        Value::Object(map) => resolve_map(map, ctx).map(Value::Object),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve(item, ctx))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::String(s) => resolve_str(s, ctx),
        _ => Ok(value.clone()),
    }
}

/// Resolve a map of parameters.
pub fn resolve_map(params: &Map<String, Value>, ctx: &Context) -> Result<Map<String, Value>> {
    let mut resolved = Map::new();
    for (key, item) in params {
        let key = filters::text_of(&resolve_str(key, ctx)?);
        resolved.insert(key, resolve(item, ctx)?);
    }
    Ok(resolved)
}

/// Resolve a single string.
pub fn resolve_str(text: &str, ctx: &Context) -> Result<Value> {
    if let Some(caps) = WHOLE_PLACEHOLDER.captures(text) {
        return evaluate(&caps[1], ctx);
    }

    if !PLACEHOLDER.is_match(text) {
        return Ok(Value::String(text.to_string()));
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        match substitution(evaluate(&caps[1], ctx)?)? {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);

    Ok(Value::String(out))
}

/// Evaluate `path | filter | filter ...`.
pub fn evaluate(expression: &str, ctx: &Context) -> Result<Value> {
    let mut parts = filters::split_unquoted(expression, '|').into_iter();
    let path = parts.next().unwrap_or_default();
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::validation(format!(
            "Placeholder '${{{expression}}}' has no path."
        )));
    }

    let mut value = ctx.get(path)?;
    for filter in parts {
        value = filters::apply(value, &filter)?;
    }
    Ok(value)
}

/// Text inserted for an embedded placeholder; `None` keeps the placeholder.
fn substitution(value: Value) -> Result<Option<String>> {
    Ok(match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        container => Some(format!("\n{}\n", pretty(&container)?)),
    })
}

/// Pretty-print with four-space indentation.
pub(crate) fn pretty(value: &Value) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| Error::validation(format!("Cannot encode value as JSON: {e}")))?;
    String::from_utf8(buf).map_err(|e| Error::validation(e.to_string()))
}
