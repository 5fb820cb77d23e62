//! JSONPath-style queries over the context tree.
//!
//! Supported syntax:
//!
//! | form | meaning |
//! |---|---|
//! | `$` | root (implied when the query does not start with it) |
//! | `.name` / `['name']` | mapping key; on a sequence an all-digit name is a slot |
//! | `[n]` | sequence slot, negative counts from the end |
//! | `.*` / `[*]` | every child |
//! | `..name` / `..*` / `..[n]` | recursive descent |
//! | `[0,2]` / `['a','b']` | union |
//! | `[start:end:step]` | slice |

use crate::error::{Error, Result};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Child(String),
    Index(i64),
    Wildcard,
    Union(Vec<Selector>),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: i64,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct PathStep {
    recursive: bool,
    selector: Selector,
}

/// Return the first value matched by `query`, if any.
pub fn first<'a>(root: &'a Value, query: &str) -> Result<Option<&'a Value>> {
    Ok(find(root, query)?.into_iter().next())
}

/// Return every value matched by `query`, in document order.
pub fn find<'a>(root: &'a Value, query: &str) -> Result<Vec<&'a Value>> {
    let steps = compile(query)?;
    let mut current = vec![root];

    for step in &steps {
        let mut next = Vec::new();
        for node in current {
            if step.recursive {
                let mut nodes = Vec::new();
                descendants(node, &mut nodes);
                for descendant in nodes {
                    select(descendant, &step.selector, &mut next);
                }
            } else {
                select(node, &step.selector, &mut next);
            }
        }
        current = next;
    }

    Ok(current)
}

fn compile(query: &str) -> Result<Vec<PathStep>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(Error::validation("Query must not be empty."));
    }

    let body = match query.strip_prefix('$') {
        Some(rest) => rest.to_string(),
        None if query.starts_with('[') || query.starts_with('.') => query.to_string(),
        None => format!(".{query}"),
    };

    let chars: Vec<char> = body.chars().collect();
    let mut steps = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let mut recursive = false;
        match chars[pos] {
            '.' if chars.get(pos + 1) == Some(&'.') => {
                recursive = true;
                pos += 2;
                if chars.get(pos) == Some(&'[') {
                    let (selector, end) = parse_bracket(&chars, pos, query)?;
                    steps.push(PathStep { recursive, selector });
                    pos = end;
                    continue;
                }
            }
            '.' => pos += 1,
            '[' => {
                let (selector, end) = parse_bracket(&chars, pos, query)?;
                steps.push(PathStep { recursive, selector });
                pos = end;
                continue;
            }
            other => {
                return Err(Error::validation(format!(
                    "Unexpected '{other}' in query '{query}'."
                )))
            }
        }

        let start = pos;
        while pos < chars.len() && chars[pos] != '.' && chars[pos] != '[' {
            pos += 1;
        }
        let name: String = chars[start..pos].iter().collect();
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation(format!(
                "Empty member name in query '{query}'."
            )));
        }
        let selector = if name == "*" {
            Selector::Wildcard
        } else {
            Selector::Child(name.to_string())
        };
        steps.push(PathStep { recursive, selector });
    }

    Ok(steps)
}

/// Parse `[...]` starting at `open`; returns the selector and the index after `]`.
fn parse_bracket(chars: &[char], open: usize, query: &str) -> Result<(Selector, usize)> {
    let mut quote: Option<char> = None;
    let mut close = None;
    for (i, &ch) in chars.iter().enumerate().skip(open + 1) {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, ']') => {
                close = Some(i);
                break;
            }
            _ => {}
        }
    }
    let close = close
        .ok_or_else(|| Error::validation(format!("Unclosed '[' in query '{query}'.")))?;

    let inner: String = chars[open + 1..close].iter().collect();
    let inner = inner.trim();

    if inner.starts_with('?') {
        return Err(Error::validation(format!(
            "Filter expressions are not supported in query '{query}'."
        )));
    }
    if inner == "*" {
        return Ok((Selector::Wildcard, close + 1));
    }

    let parts = split_unquoted(inner, ',');
    if parts.len() == 1 && split_unquoted(inner, ':').len() > 1 {
        return Ok((parse_slice(inner, query)?, close + 1));
    }

    let mut selectors = parts
        .iter()
        .map(|part| parse_bracket_member(part, query))
        .collect::<Result<Vec<_>>>()?;

    let selector = if selectors.len() == 1 {
        selectors.remove(0)
    } else {
        Selector::Union(selectors)
    };
    Ok((selector, close + 1))
}

fn parse_bracket_member(part: &str, query: &str) -> Result<Selector> {
    let part = part.trim();
    if part.len() >= 2
        && ((part.starts_with('\'') && part.ends_with('\''))
            || (part.starts_with('"') && part.ends_with('"')))
    {
        return Ok(Selector::Child(part[1..part.len() - 1].to_string()));
    }
    part.parse::<i64>().map(Selector::Index).map_err(|_| {
        Error::validation(format!("Invalid selector '{part}' in query '{query}'."))
    })
}

fn parse_slice(inner: &str, query: &str) -> Result<Selector> {
    let bounds = split_unquoted(inner, ':');
    if bounds.len() > 3 {
        return Err(Error::validation(format!(
            "Invalid slice '{inner}' in query '{query}'."
        )));
    }

    let bound = |i: usize| -> Result<Option<i64>> {
        match bounds.get(i).map(|b| b.trim()) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse::<i64>().map(Some).map_err(|_| {
                Error::validation(format!("Invalid slice bound '{raw}' in query '{query}'."))
            }),
        }
    };

    let step = bound(2)?.unwrap_or(1);
    if step == 0 {
        return Err(Error::validation(format!(
            "Slice step must not be zero in query '{query}'."
        )));
    }

    Ok(Selector::Slice {
        start: bound(0)?,
        end: bound(1)?,
        step,
    })
}

fn split_unquoted(input: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut quote: Option<char> = None;

    for ch in input.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == separator => {
                parts.push(std::mem::take(&mut buf));
                continue;
            }
            None => {}
        }
        buf.push(ch);
    }
    parts.push(buf);
    parts
}

fn descendants<'a>(node: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(node);
    match node {
        Value::Object(map) => map.values().for_each(|child| descendants(child, out)),
        Value::Array(items) => items.iter().for_each(|child| descendants(child, out)),
        _ => {}
    }
}

fn select<'a>(node: &'a Value, selector: &Selector, out: &mut Vec<&'a Value>) {
    match selector {
        Selector::Child(name) => match node {
            Value::Object(map) => out.extend(map.get(name)),
            Value::Array(items) => {
                if let Ok(index) = name.parse::<usize>() {
                    out.extend(items.get(index));
                }
            }
            _ => {}
        },
        Selector::Index(index) => match node {
            Value::Array(items) => {
                let len = items.len() as i64;
                let resolved = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&resolved) {
                    out.push(&items[resolved as usize]);
                }
            }
            Value::Object(map) => out.extend(map.get(&index.to_string())),
            _ => {}
        },
        Selector::Wildcard => match node {
            Value::Object(map) => out.extend(map.values()),
            Value::Array(items) => out.extend(items.iter()),
            _ => {}
        },
        Selector::Union(selectors) => {
            for selector in selectors {
                select(node, selector, out);
            }
        }
        Selector::Slice { start, end, step } => {
            if let Value::Array(items) = node {
                for index in slice_indices(items.len() as i64, *start, *end, *step) {
                    out.push(&items[index]);
                }
            }
        }
    }
}

fn slice_indices(len: i64, start: Option<i64>, end: Option<i64>, step: i64) -> Vec<usize> {
    let normalize = |i: i64| if i < 0 { len + i } else { i };
    let mut indices = Vec::new();

    if step > 0 {
        let lower = start.map(normalize).unwrap_or(0).clamp(0, len);
        let upper = end.map(normalize).unwrap_or(len).clamp(0, len);
        let mut i = lower;
        while i < upper {
            indices.push(i as usize);
            let Some(next) = i.checked_add(step) else {
                break;
            };
            i = next;
        }
    } else {
        let upper = start.map(normalize).unwrap_or(len - 1).clamp(-1, len - 1);
        let lower = end.map(normalize).unwrap_or(-1).clamp(-1, len - 1);
        let mut i = upper;
        while i > lower {
            indices.push(i as usize);
            let Some(next) = i.checked_add(step) else {
                break;
            };
            i = next;
        }
    }

    indices
}
