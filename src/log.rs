//! Leveled logger handed to steps and actions through the context.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Log severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Notice => "NOTICE",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}

/// Requested output verbosity of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
    Debug,
}

impl Verbosity {
    /// Minimum level that gets through at this verbosity.
    ///
    /// The table is fixed and not monotonic: `VeryVerbose` shows less than
    /// `Verbose`.
    pub fn min_level(self) -> Level {
        match self {
            Verbosity::Quiet | Verbosity::Normal => Level::Error,
            Verbosity::Verbose => Level::Info,
            Verbosity::VeryVerbose => Level::Warning,
            Verbosity::Debug => Level::Debug,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
            Verbosity::Debug => "debug",
        }
    }
}

/// Leveled logger capability.
///
/// `message` may contain `{key}` placeholders filled from `fields`.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str, fields: &Value);

    fn debug(&self, message: &str, fields: Value) {
        self.log(Level::Debug, message, &fields);
    }

    fn info(&self, message: &str, fields: Value) {
        self.log(Level::Info, message, &fields);
    }

    fn notice(&self, message: &str, fields: Value) {
        self.log(Level::Notice, message, &fields);
    }

    fn warning(&self, message: &str, fields: Value) {
        self.log(Level::Warning, message, &fields);
    }

    fn error(&self, message: &str, fields: Value) {
        self.log(Level::Error, message, &fields);
    }
}

/// Logger that filters by level and forwards to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    min_level: Level,
}

impl TracingLogger {
    pub fn new(min_level: Level) -> Self {
        Self { min_level }
    }

    pub fn for_verbosity(verbosity: Verbosity) -> Self {
        Self::new(verbosity.min_level())
    }

    pub fn min_level(&self) -> Level {
        self.min_level
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.min_level
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(Level::Info)
    }
}

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str, fields: &Value) {
        if !self.enabled(level) {
            return;
        }

        let line = interpolate(message, fields);
        let has_fields = fields.as_object().is_some_and(|m| !m.is_empty());

        match (level, has_fields) {
            (Level::Error, true) => tracing::error!(fields = %fields, "{}", line),
            (Level::Error, false) => tracing::error!("{}", line),
            (Level::Warning, true) => tracing::warn!(fields = %fields, "{}", line),
            (Level::Warning, false) => tracing::warn!("{}", line),
            (Level::Notice | Level::Info, true) => tracing::info!(fields = %fields, "{}", line),
            (Level::Notice | Level::Info, false) => tracing::info!("{}", line),
            (Level::Debug, true) => tracing::debug!(fields = %fields, "{}", line),
            (Level::Debug, false) => tracing::debug!("{}", line),
        }
    }
}

/// Replace `{key}` in `message` with the matching entry of `fields`.
///
/// Text and scalars are inserted as-is, containers as compact JSON. Unknown
/// placeholders stay in place.
pub fn interpolate(message: &str, fields: &Value) -> String {
    let Some(map) = fields.as_object() else {
        return message.to_string();
    };
    if !message.contains('{') {
        return message.to_string();
    }

    let mut line = message.to_string();
    for (key, value) in map {
        let placeholder = format!("{{{key}}}");
        if !line.contains(&placeholder) {
            continue;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        line = line.replace(&placeholder, &text);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verbosity_table() {
        assert_eq!(Verbosity::Quiet.min_level(), Level::Error);
        assert_eq!(Verbosity::Normal.min_level(), Level::Error);
        assert_eq!(Verbosity::Verbose.min_level(), Level::Info);
        assert_eq!(Verbosity::VeryVerbose.min_level(), Level::Warning);
        assert_eq!(Verbosity::Debug.min_level(), Level::Debug);
    }

    #[test]
    fn test_level_filter() {
        let logger = TracingLogger::new(Level::Warning);
        assert!(logger.enabled(Level::Error));
        assert!(logger.enabled(Level::Warning));
        assert!(!logger.enabled(Level::Info));
        assert!(!logger.enabled(Level::Debug));
    }

    #[test]
    fn test_interpolate() {
        let fields = json!({"path": "/tmp/x", "bytes": 12, "meta": {"a": 1}, "none": null});
        assert_eq!(
            interpolate("wrote {bytes} to {path}", &fields),
            "wrote 12 to /tmp/x"
        );
        assert_eq!(interpolate("meta={meta}", &fields), "meta={\"a\":1}");
        assert_eq!(interpolate("[{none}] {missing}", &fields), "[] {missing}");
        assert_eq!(interpolate("plain", &Value::Null), "plain");
    }
}
