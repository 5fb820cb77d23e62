//! Action contract, registry and built-in actions.

mod console;
mod csv_file;
mod file;
mod flow;
mod http;

pub use console::PrintAction;
pub use csv_file::{CsvReadAction, CsvWriteAction};
pub use file::{JsonReadAction, ReadAction, WriteAction};
pub use flow::MultiStepsAction;
pub use http::{RequestAction, RequestConfig};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::step::Step;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping returned by an action; by convention it carries `success`.
pub type ActionOutput = Map<String, Value>;

/// A pluggable unit of work.
///
/// `params` arrive with every template already resolved. `steps` is only
/// non-empty for composite actions. Returning `Err` aborts the run; returning
/// `success: false` does not.
pub trait Action {
    fn execute(
        &self,
        params: Map<String, Value>,
        ctx: &mut Context,
        steps: &[Step],
    ) -> anyhow::Result<ActionOutput>;
}

type Factory = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Maps action names used in `uses:` to factories.
pub struct ActionRegistry {
    factories: BTreeMap<String, Factory>,
}

impl ActionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every built-in action.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("console.print", || PrintAction);
        registry.register("file.read", || ReadAction);
        registry.register("file.json.read", || JsonReadAction);
        registry.register("file.csv.read", || CsvReadAction);
        registry.register("file.write", || WriteAction);
        registry.register("file.csv.write", || CsvWriteAction);
        registry.register("flow.steps", || MultiStepsAction);
        registry.register("http.request", || RequestAction);
        registry
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<A, F>(&mut self, name: &str, factory: F)
    where
        A: Action + 'static,
        F: Fn() -> A + Send + Sync + 'static,
    {
        self.factories.insert(
            name.to_string(),
            Box::new(move || Box::new(factory()) as Box<dyn Action>),
        );
    }

    /// Instantiate the action registered as `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Action>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| Error::configuration(format!("Unknown action '{name}'.")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

/// Build an [`ActionOutput`] from a JSON object literal.
pub(crate) fn output(value: Value) -> ActionOutput {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

/// Fetch a required text parameter.
pub(crate) fn required_text(params: &Map<String, Value>, name: &str) -> Result<String> {
    match params.get(name) {
        None | Some(Value::Null) => Err(Error::validation(format!(
            "Parameter '{name}' is required."
        ))),
        Some(Value::String(s)) if s.is_empty() => Err(Error::validation(format!(
            "Parameter '{name}' is required."
        ))),
        Some(value) => Ok(crate::filters::text_of(value)),
    }
}

/// Read a flag parameter; strings like "false", "0" and "" count as false.
pub(crate) fn flag(params: &Map<String, Value>, name: &str) -> bool {
    match params.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
