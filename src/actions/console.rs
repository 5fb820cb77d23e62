//! `console.print`: write a message to the output sink.

use super::{output, Action, ActionOutput};
use crate::context::Context;
use crate::error::Error;
use crate::filters::text_of;
use crate::step::Step;
use crate::template::pretty;
use serde_json::{json, Map, Value};

/// Prints `message`, optionally wrapped in a `<type>` tag.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrintAction;

impl Action for PrintAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let message = params
            .get("message")
            .ok_or_else(|| Error::validation("Parameter 'message' is required."))?;

        let text = match message {
            Value::Array(_) | Value::Object(_) => pretty(message)?,
            other => text_of(other),
        };

        let line = match params.get("type").map(text_of) {
            Some(kind) if !kind.is_empty() => format!("<{kind}>{text}</{kind}>"),
            _ => text,
        };

        ctx.output().writeln(&line);
        Ok(output(json!({ "success": true })))
    }
}
