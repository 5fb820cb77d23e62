//! Path addressing for writes into the context tree.
//!
//! Two notations are accepted:
//!
//! - dot notation: `step.read.body`, `items.0.name`
//! - JSON Pointer (RFC 6901): `/step/read/body`, `/a~1b` (key `a/b`)
//!
//! All-digit segments address sequence slots; everything else is a mapping key.

use crate::error::{Error, Result};
use serde_json::{Map, Value};

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    fn from_raw(raw: String) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<usize>() {
                return Segment::Index(index);
            }
        }
        Segment::Key(raw)
    }
}

/// Parse a path string into segments.
pub fn parse(path: &str) -> Result<Vec<Segment>> {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::validation("Path must not be empty."));
    }

    if path.starts_with('/') {
        Ok(parse_pointer(path))
    } else {
        parse_dotted(path)
    }
}

fn parse_pointer(pointer: &str) -> Vec<Segment> {
    if pointer == "/" {
        return vec![Segment::Key(String::new())];
    }

    pointer[1..]
        .split('/')
        .map(|raw| Segment::from_raw(raw.replace("~1", "/").replace("~0", "~")))
        .collect()
}

fn parse_dotted(path: &str) -> Result<Vec<Segment>> {
    path.split('.')
        .map(|part| {
            if part.is_empty() {
                Err(Error::validation(format!(
                    "Empty identifier in path '{path}'."
                )))
            } else {
                Ok(Segment::from_raw(part.to_string()))
            }
        })
        .collect()
}

/// How far past the end of a sequence an index may reach.
pub const MAX_INDEX_GAP: usize = 1024;

/// Write `value` at `segments` below `node`, creating containers on the way.
///
/// Missing or scalar intermediates become the container the next segment
/// needs. Existing containers are kept: an index into a mapping writes the
/// key `"<n>"`, a key into a sequence first turns it into a mapping keyed by
/// position. An index more than [`MAX_INDEX_GAP`] slots past the end of a
/// sequence is rejected.
pub fn write(node: &mut Value, segments: &[Segment], value: Value) -> Result<()> {
    let Some((head, rest)) = segments.split_first() else {
        *node = value;
        return Ok(());
    };

    match head {
        Segment::Index(index) => match node {
            Value::Array(items) => {
                if items.len() <= *index {
                    let len = slots_for(*index, items.len())?;
                    items.resize(len, Value::Null);
                }
                write(&mut items[*index], rest, value)
            }
            Value::Object(map) => {
                let slot = map.entry(index.to_string()).or_insert(Value::Null);
                write(slot, rest, value)
            }
            _ => {
                let mut items = vec![Value::Null; slots_for(*index, 0)?];
                write(&mut items[*index], rest, value)?;
                *node = Value::Array(items);
                Ok(())
            }
        },
        Segment::Key(key) => {
            if let Value::Array(items) = node {
                let keyed: Map<String, Value> = std::mem::take(items)
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| (i.to_string(), item))
                    .collect();
                *node = Value::Object(keyed);
            }

            match node {
                Value::Object(map) => {
                    let slot = map.entry(key.clone()).or_insert(Value::Null);
                    write(slot, rest, value)
                }
                _ => {
                    let mut slot = Value::Null;
                    write(&mut slot, rest, value)?;
                    let mut map = Map::new();
                    map.insert(key.clone(), slot);
                    *node = Value::Object(map);
                    Ok(())
                }
            }
        }
    }
}

/// Sequence length needed to hold `index`, given the current `len`.
fn slots_for(index: usize, len: usize) -> Result<usize> {
    index
        .checked_add(1)
        .filter(|&needed| needed - len <= MAX_INDEX_GAP + 1)
        .ok_or_else(|| {
            Error::validation(format!(
                "Index {index} is too far past the end of a sequence of length {len}."
            ))
        })
}
