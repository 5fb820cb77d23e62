//! User-facing output sink.
//!
//! Text may carry lightweight tags (`<info>..</info>`, `<comment>..</comment>`,
//! `<question>..</question>`, `<error>..</error>`). Tags are advisory; a sink
//! decides how to render them.

use console::Style;
use std::sync::Mutex;

/// Sink for text meant for the person running the workflow.
pub trait Output: Send + Sync {
    fn writeln(&self, text: &str);
}

/// Writes to stdout, rendering known tags as terminal styles.
#[derive(Debug, Default, Clone)]
pub struct ConsoleOutput;

impl ConsoleOutput {
    pub fn new() -> Self {
        Self
    }
}

impl Output for ConsoleOutput {
    fn writeln(&self, text: &str) {
        println!("{}", render_tags(text, style_for));
    }
}

fn style_for(tag: &str) -> Option<Style> {
    match tag {
        "info" => Some(Style::new().green()),
        "comment" => Some(Style::new().yellow()),
        "question" => Some(Style::new().black().on_cyan()),
        "error" => Some(Style::new().white().on_red()),
        _ => None,
    }
}

/// Replace `<tag>inner</tag>` by the styled inner text for every tag `style`
/// knows about. Unknown tags are kept verbatim.
fn render_tags(text: &str, style: impl Fn(&str) -> Option<Style>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('<') {
        let after_open = &rest[open + 1..];
        let Some(name_end) = after_open.find('>') else {
            break;
        };
        let tag = &after_open[..name_end];
        let closing = format!("</{tag}>");
        let body = &after_open[name_end + 1..];

        match (style(tag), body.find(&closing)) {
            (Some(s), Some(close)) => {
                out.push_str(&rest[..open]);
                out.push_str(&s.apply_to(&body[..close]).to_string());
                rest = &body[close + closing.len()..];
            }
            _ => {
                out.push_str(&rest[..=open]);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Collects lines in memory, tags stripped.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    lines: Mutex<Vec<String>>,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far.
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Output for MemoryOutput {
    fn writeln(&self, text: &str) {
        let line = render_tags(text, |tag| style_for(tag).map(|_| Style::new()));
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line),
            Err(poisoned) => poisoned.into_inner().push(line),
        }
    }
}
