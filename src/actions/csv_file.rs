//! CSV actions: `file.csv.read`, `file.csv.write`.

use super::file::{read_file, write_file, written};
use super::{flag, output, required_text, Action, ActionOutput};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::filters::text_of;
use crate::step::Step;
use serde_json::{json, Map, Value};
use std::path::Path;

/// Field separator, quote and escape bytes shared by both actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dialect {
    delimiter: u8,
    enclosure: u8,
    escape: Option<u8>,
}

impl Dialect {
    fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let delimiter = match params.get("delimiter").map(text_of) {
            None => b',',
            Some(raw) if raw == "\\t" || raw.eq_ignore_ascii_case("tab") => b'\t',
            Some(raw) => single_byte(&raw)
                .ok_or_else(|| Error::validation("Delimiter must be a single character or \\t."))?,
        };
        let enclosure = match params.get("enclosure").map(text_of) {
            None => b'"',
            Some(raw) => single_byte(&raw)
                .ok_or_else(|| Error::validation("Enclosure must be a single character."))?,
        };
        let escape = match params.get("escape").map(text_of) {
            None => None,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(
                single_byte(&raw)
                    .ok_or_else(|| Error::validation("Escape must be a single character."))?,
            ),
        };

        Ok(Self {
            delimiter,
            enclosure,
            escape,
        })
    }

    fn reader<'a>(&self, line: &'a str) -> csv::Reader<&'a [u8]> {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.enclosure);
        if let Some(escape) = self.escape {
            builder.escape(Some(escape)).double_quote(false);
        }
        builder.from_reader(line.as_bytes())
    }

    fn writer(&self) -> csv::Writer<Vec<u8>> {
        let mut builder = csv::WriterBuilder::new();
        builder
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.enclosure)
            .terminator(csv::Terminator::Any(b'\n'));
        if let Some(escape) = self.escape {
            builder.escape(escape).double_quote(false);
        }
        builder.from_writer(Vec::new())
    }

    fn describe(&self) -> Value {
        json!({
            "delimiter": char::from(self.delimiter).to_string(),
            "enclosure": char::from(self.enclosure).to_string(),
            "escape": self.escape.map(|b| char::from(b).to_string()),
        })
    }
}

fn single_byte(raw: &str) -> Option<u8> {
    match raw.as_bytes() {
        [byte] => Some(*byte),
        _ => None,
    }
}

/// Optional non-negative integer parameter.
fn count(params: &Map<String, Value>, name: &str) -> Result<Option<usize>> {
    let invalid = || Error::validation(format!("Parameter '{name}' must be a non-negative integer."));
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(|n| Some(n as usize)).ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<usize>().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// A flag that defaults to `true` when absent.
fn flag_or_true(params: &Map<String, Value>, name: &str) -> bool {
    params.get(name).is_none() || flag(params, name)
}

/// Reads a delimited text file into `rows`.
///
/// Lines are parsed one by one. `offset` skips lines (after blank-line
/// skipping, before the header); `limit` caps the number of returned rows.
/// With `has_header` the first kept line names the fields and each row
/// becomes a mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvReadAction;

impl Action for CsvReadAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        _ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let dialect = Dialect::from_params(&params)?;
        let has_header = flag(&params, "has_header");
        let skip_empty = flag_or_true(&params, "skip_empty");
        let trim = flag_or_true(&params, "trim");
        let limit = count(&params, "limit")?;
        let mut offset = count(&params, "offset")?.unwrap_or(0);

        let data = read_file(&params)?;
        let body = data.get("body").map(text_of).unwrap_or_default();

        let mut rows = Vec::new();
        let mut header: Option<Vec<String>> = None;
        for line in body.split("\r\n").flat_map(|l| l.split(['\n', '\r'])) {
            if limit.is_some_and(|limit| rows.len() >= limit) {
                break;
            }
            if skip_empty && line.trim().is_empty() {
                continue;
            }
            if offset > 0 {
                offset -= 1;
                continue;
            }

            let fields = parse_line(&dialect, line, trim)?;
            if has_header && header.is_none() {
                header = Some(fields.iter().map(text_of).collect());
                continue;
            }
            match &header {
                Some(names) => rows.push(Value::Object(keyed(names, fields))),
                None => rows.push(Value::Array(fields)),
            }
        }

        let mut out = output(json!({
            "path": params.get("path"),
            "rows": rows,
            "header": header,
            "num_rows": rows.len(),
            "length": data.get("length"),
            "numOfLines": data.get("numOfLines"),
            "extension": data.get("extension"),
            "success": true,
        }));
        if let Value::Object(dialect) = dialect.describe() {
            out.extend(dialect);
        }
        Ok(out)
    }
}

fn parse_line(dialect: &Dialect, line: &str, trim: bool) -> anyhow::Result<Vec<Value>> {
    let mut reader = dialect.reader(line);
    let Some(record) = reader.records().next() else {
        return Ok(vec![Value::Null]);
    };
    let record = record?;

    Ok(record
        .iter()
        .map(|field| {
            let field = if trim { field.trim() } else { field };
            Value::String(field.to_string())
        })
        .collect())
}

fn keyed(names: &[String], fields: Vec<Value>) -> Map<String, Value> {
    let width = names.len().max(fields.len());
    let mut fields = fields.into_iter();
    (0..width)
        .map(|i| {
            let key = names.get(i).cloned().unwrap_or_else(|| i.to_string());
            (key, fields.next().unwrap_or(Value::Null))
        })
        .collect()
}

/// Writes `rows` as delimited text.
///
/// Rows may be sequences, mappings or scalars. With `has_header` a header
/// line is written first (`header`, or the first row's keys) and mapping
/// rows are aligned to it. I/O failures come back as `success: false`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvWriteAction;

impl Action for CsvWriteAction {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        _steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let target = required_text(&params, "path")?;
        let Some(Value::Array(rows)) = params.get("rows") else {
            return Err(Error::validation("Parameter 'rows' must be a sequence.").into());
        };
        let dialect = Dialect::from_params(&params)?;
        let has_header = flag(&params, "has_header");
        let append = flag(&params, "append");
        let newline = params
            .get("newline")
            .map(text_of)
            .unwrap_or_else(|| "\n".to_string());

        let header: Option<Vec<String>> = match params.get("header") {
            Some(Value::Array(names)) => Some(names.iter().map(text_of).collect()),
            _ if has_header => rows.first().map(keys_of),
            _ => None,
        }
        .filter(|names| has_header && !names.is_empty());

        let mut writer = dialect.writer();
        let mut rows_written = 0;
        if let Some(names) = &header {
            writer.write_record(names)?;
            rows_written += 1;
        }
        for row in rows {
            let fields = match &header {
                Some(names) => aligned(row, names),
                None => fields_of(row),
            };
            writer.write_record(&fields)?;
            rows_written += 1;
        }

        let buffer = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to generate CSV content: {}", e.error()))?;
        let mut content = String::from_utf8(buffer)?;
        if newline != "\n" {
            content = content.replace('\n', &newline);
        }

        let path = Path::new(&target);
        if let Err((message, e)) = write_file(path, content.as_bytes(), append) {
            ctx.logger().error(
                message,
                json!({ "path": target, "append": append, "error": e.to_string() }),
            );
            return Ok(output(json!({
                "path": target,
                "size": null,
                "bytes_written": 0,
                "rows_written": 0,
                "success": false,
                "appended": append,
                "error": e.to_string(),
            })));
        }
        let (real_path, size) = written(path, &target);

        ctx.logger().info(
            "CSV file written",
            json!({
                "path": real_path,
                "bytes": content.len(),
                "rows": rows_written,
                "append": append,
            }),
        );

        Ok(output(json!({
            "path": real_path,
            "size": size,
            "bytes_written": content.len(),
            "rows_written": rows_written,
            "success": true,
            "appended": append,
        })))
    }
}

fn keys_of(row: &Value) -> Vec<String> {
    match row {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn fields_of(row: &Value) -> Vec<String> {
    match row {
        Value::Object(map) => map.values().map(text_of).collect(),
        Value::Array(items) => items.iter().map(text_of).collect(),
        other => vec![text_of(other)],
    }
}

fn aligned(row: &Value, names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            let field = match row {
                Value::Object(map) => map.get(name),
                Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            field.map(text_of).unwrap_or_default()
        })
        .collect()
}
