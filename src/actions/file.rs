//! File actions: `file.read`, `file.json.read`, `file.write`.

use super::{flag, output, required_text, Action, ActionOutput};
use crate::context::Context;
use crate::error::Error;
use crate::filters::text_of;
use crate::step::Step;
use crate::template::pretty;
use anyhow::Context as _;
use serde_json::{json, Map, Value};
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

/// Reads a text file.
///
/// Returns `body`, `length` (bytes), `numOfLines` and `extension`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadAction;

impl Action for ReadAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        _ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        read_file(&params)
    }
}

pub(super) fn read_file(params: &Map<String, Value>) -> anyhow::Result<ActionOutput> {
    let path = required_text(params, "path")?;
    let file = Path::new(&path);
    if !file.exists() {
        anyhow::bail!("File not found: {path}");
    }

    let body = fs::read_to_string(file).with_context(|| format!("Unable to read file: {path}"))?;
    let extension = file
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(output(json!({
        "success": true,
        "body": body,
        "length": body.len(),
        "numOfLines": body.matches('\n').count() + 1,
        "extension": extension,
    })))
}

/// Reads a file and decodes it as JSON into `decoded`.
///
/// Malformed JSON leaves `decoded` null.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReadAction;

impl Action for JsonReadAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let mut data = read_file(&params)?;
        let body = data.get("body").map(text_of).unwrap_or_default();

        let decoded = match serde_json::from_str::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                ctx.logger().warning(
                    "Cannot decode {path} as JSON: {error}",
                    json!({ "path": params.get("path"), "error": e.to_string() }),
                );
                Value::Null
            }
        };
        ctx.logger()
            .debug("Read action result: {decoded}", json!({ "decoded": decoded }));

        data.insert("decoded".to_string(), decoded);
        Ok(data)
    }
}

/// Writes (or appends) `content` to `path`.
///
/// I/O failures come back as `success: false` rather than an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteAction;

impl Action for WriteAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let target = required_text(&params, "path")?;
        let mut content = match params.get("content") {
            None | Some(Value::Null) => {
                return Err(Error::validation("Parameter 'content' is required.").into())
            }
            Some(value @ (Value::Array(_) | Value::Object(_))) => pretty(value)?,
            Some(value) => text_of(value),
        };
        let append = flag(&params, "append");

        let failed = |ctx: &Context, message: &str, error: std::io::Error| {
            ctx.logger().error(
                message,
                json!({ "path": target, "append": append, "error": error.to_string() }),
            );
            output(json!({
                "path": target,
                "size": null,
                "bytes_written": 0,
                "success": false,
                "appended": append,
                "error": error.to_string(),
            }))
        };

        let path = Path::new(&target);
        if append {
            content.push('\n');
        }

        if let Err((message, e)) = write_file(path, content.as_bytes(), append) {
            return Ok(failed(ctx, message, e));
        }
        let (real_path, size) = written(path, &target);

        ctx.logger().info(
            "File written",
            json!({ "path": real_path, "bytes": content.len(), "append": append }),
        );

        Ok(output(json!({
            "path": real_path,
            "size": size,
            "bytes_written": content.len(),
            "success": true,
            "appended": append,
        })))
    }
}

/// Write `content` to `path`, creating parent directories.
///
/// The error carries the log message for the step that failed.
pub(super) fn write_file(
    path: &Path,
    content: &[u8],
    append: bool,
) -> Result<(), (&'static str, std::io::Error)> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| ("Failed to create directory", e))?;
    }

    OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .and_then(|mut file| file.write_all(content))
        .map_err(|e| ("Failed to write file", e))
}

/// Canonical path (or `target` as given) and size of a written file.
pub(super) fn written(path: &Path, target: &str) -> (String, Option<u64>) {
    let real_path = fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| target.to_string());
    (real_path, fs::metadata(path).ok().map(|m| m.len()))
}
