//! Evaluation of step `if` conditions.
//!
//! The condition string is first resolved as a template. The resulting text
//! is then evaluated as a Rhai expression with an empty scope: no context
//! variables are bound, so the expression only sees what the placeholders
//! substituted into it.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::{filters, template};
use rhai::{Dynamic, Engine, Scope};

/// Resolve and evaluate `condition` for step `step_id`.
pub fn evaluate(step_id: &str, condition: &str, ctx: &Context) -> Result<bool> {
    let resolved = template::resolve_str(condition, ctx)?;
    let literal = filters::text_of(&resolved);
    evaluate_literal(&literal).map_err(|message| Error::Condition {
        step: step_id.to_string(),
        message,
    })
}

/// Evaluate an already substituted expression.
pub fn evaluate_literal(literal: &str) -> std::result::Result<bool, String> {
    if literal.trim().is_empty() {
        return Ok(false);
    }

    let mut engine = Engine::new();
    engine.set_max_operations(10_000);
    engine.set_max_expr_depths(64, 32);

    let mut scope = Scope::new();
    engine
        .eval_expression_with_scope::<Dynamic>(&mut scope, literal)
        .map(|value| truthy(&value))
        .map_err(|e| format!("'{literal}': {e}"))
}

fn truthy(value: &Dynamic) -> bool {
    if value.is_unit() {
        return false;
    }
    if let Ok(b) = value.as_bool() {
        return b;
    }
    if let Ok(i) = value.as_int() {
        return i != 0;
    }
    if let Ok(f) = value.as_float() {
        return f != 0.0;
    }
    if value.is_string() {
        let text = value.to_string();
        return !text.is_empty() && text != "0" && text != "false";
    }
    if let Some(items) = value.read_lock::<rhai::Array>() {
        return !items.is_empty();
    }
    if let Some(map) = value.read_lock::<rhai::Map>() {
        return !map.is_empty();
    }
    true
}
