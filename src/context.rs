//! Run-wide context: the shared data tree plus runtime handles.

use crate::actions::ActionRegistry;
use crate::error::Result;
use crate::log::{Logger, TracingLogger};
use crate::output::{ConsoleOutput, Output};
use crate::{path, query};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Mutable data store shared by every step of a run.
///
/// Steps run one at a time and the running step is the only writer; later
/// steps see everything earlier ones stored. Writes go through [`Context::set`]
/// (dot or pointer paths), reads through [`Context::get`] (JSONPath-style).
///
/// The logger, output sink and action registry are handles, not tree data.
pub struct Context {
    data: Value,
    logger: Arc<dyn Logger>,
    output: Arc<dyn Output>,
    actions: Arc<ActionRegistry>,
}

impl Context {
    /// Create a context for run `run_id`, seeding `workflow.runId`.
    pub fn new(run_id: &str) -> Self {
        Self {
            data: json!({ "workflow": { "runId": run_id } }),
            logger: Arc::new(TracingLogger::default()),
            output: Arc::new(ConsoleOutput::new()),
            actions: Arc::new(ActionRegistry::builtin()),
        }
    }

    /// Store `value` at `path`, replacing whatever is there.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let segments = path::parse(path)?;
        path::write(&mut self.data, &segments, value.into())
    }

    /// Store `value` under the top-level `key`.
    pub(crate) fn seed(&mut self, key: &str, value: Value) {
        if let Value::Object(root) = &mut self.data {
            root.insert(key.to_string(), value);
        }
    }

    /// First value matched by `query`, or null when nothing matches.
    pub fn get(&self, query: &str) -> Result<Value> {
        Ok(query::first(&self.data, query)?
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Every value matched by `query`.
    pub fn query(&self, query: &str) -> Result<Vec<Value>> {
        Ok(query::find(&self.data, query)?
            .into_iter()
            .cloned()
            .collect())
    }

    /// The whole data tree.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Id of the run this context belongs to.
    pub fn run_id(&self) -> String {
        match self.data.pointer("/workflow/runId") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = logger;
    }

    pub fn output(&self) -> &dyn Output {
        self.output.as_ref()
    }

    pub fn set_output(&mut self, output: Arc<dyn Output>) {
        self.output = output;
    }

    /// Registry used to instantiate actions, including those of nested steps.
    pub fn actions(&self) -> Arc<ActionRegistry> {
        Arc::clone(&self.actions)
    }

    pub fn set_actions(&mut self, actions: Arc<ActionRegistry>) {
        self.actions = actions;
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("data", &self.data)
            .field("actions", &self.actions.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_run_id_seeded() {
        let ctx = Context::new("abc123");
        assert_eq!(ctx.get("workflow.runId").unwrap(), json!("abc123"));
        assert_eq!(ctx.run_id(), "abc123");
    }

    #[test]
    fn test_set_and_get() {
        let mut ctx = Context::new("r");
        ctx.set("email", json!({"subject": "Test"})).unwrap();

        assert_eq!(ctx.get("email.subject").unwrap(), json!("Test"));
        assert_eq!(ctx.get("$.email").unwrap(), json!({"subject": "Test"}));
    }

    #[test]
    fn test_pointer_and_dot_agree() {
        let mut ctx = Context::new("r");
        ctx.set("/a/0/b", 5).unwrap();

        assert_eq!(ctx.get("a.0.b").unwrap(), json!(5));
        assert_eq!(ctx.get("a[0].b").unwrap(), json!(5));

        ctx.set("a.0.b", 6).unwrap();
        assert_eq!(ctx.get("$.a[0].b").unwrap(), json!(6));
    }

    #[test]
    fn test_missing_is_null() {
        let ctx = Context::new("r");
        assert_eq!(ctx.get("nothing.here").unwrap(), Value::Null);
    }

    #[test]
    fn test_invalid_path() {
        let mut ctx = Context::new("r");
        assert!(matches!(ctx.set("", 1), Err(Error::Validation(_))));
        assert!(matches!(ctx.set("a..b", 1), Err(Error::Validation(_))));
    }

    #[test]
    fn test_far_index_is_rejected() {
        let mut ctx = Context::new("r");
        assert!(matches!(
            ctx.set("a.18446744073709551615", 1),
            Err(Error::Validation(_))
        ));
        assert!(matches!(ctx.set("step.4000000000", 1), Err(Error::Validation(_))));
        ctx.set("step.7", 1).unwrap();
        assert_eq!(ctx.get("step[7]").unwrap(), json!(1));
    }

    #[test]
    fn test_query_all() {
        let mut ctx = Context::new("r");
        ctx.set("list", json!([1, 2, 3])).unwrap();
        assert_eq!(ctx.query("list[*]").unwrap(), vec![json!(1), json!(2), json!(3)]);
    }
}
