//! Workflow definition and runner.

use crate::actions::ActionRegistry;
use crate::context::Context;
use crate::error::Result;
use crate::executor::ExecutionResult;
use crate::job::{Job, JobBuilder};
use crate::log::{Logger, TracingLogger, Verbosity};
use crate::output::Output;
use crate::schedule::{self, Scope};
use crate::step::optional_text;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Workflow document as written by users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,

    /// Free-form version label
    #[serde(default, deserialize_with = "optional_text")]
    pub version: Option<String>,

    /// Trigger configuration (`on:`)
    #[serde(default, rename = "on")]
    pub trigger: Trigger,

    /// Jobs, ordered at run time by their `needs`
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// `on:` block of a workflow document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_dispatch: Option<Dispatch>,
}

/// Manual dispatch trigger carrying input values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// One execution of a workflow.
///
/// Owns the run id and the context every step reads from and writes to.
/// Jobs run one after another in dependency order; nothing runs in parallel.
pub struct Workflow {
    name: String,
    version: String,
    run_id: String,
    jobs: Vec<Job>,
    verbosity: Option<Verbosity>,
    logger: Option<Arc<dyn Logger>>,
    context: Context,
}

impl Workflow {
    /// Create a new workflow with a name.
    pub fn new(name: &str) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    /// Prepare a run of `definition` with a fresh run id.
    ///
    /// `inputs` is seeded from `on.workflow_dispatch.inputs` (empty when
    /// absent).
    pub fn from_definition(definition: WorkflowDefinition) -> Self {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let mut context = Context::new(&run_id);

        let inputs = definition
            .trigger
            .workflow_dispatch
            .map(|dispatch| dispatch.inputs)
            .unwrap_or_default();
        context.seed("inputs", Value::Object(inputs));

        Self {
            name: definition.name,
            version: definition.version.unwrap_or_default(),
            run_id,
            jobs: definition.jobs,
            verbosity: None,
            logger: None,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Request a verbosity; also enables the execution plan log entry.
    pub fn set_verbosity(&mut self, verbosity: Verbosity) {
        self.verbosity = Some(verbosity);
        self.context.seed("verbose", Value::from(verbosity.as_str()));
    }

    /// Use `logger` instead of the verbosity-derived [`TracingLogger`].
    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }

    pub fn set_output(&mut self, output: Arc<dyn Output>) {
        self.context.set_output(output);
    }

    pub fn set_actions(&mut self, actions: Arc<ActionRegistry>) {
        self.context.set_actions(actions);
    }

    /// Jobs in dependency order.
    pub fn jobs_in_order(&self) -> Result<Vec<&Job>> {
        schedule::order(&self.jobs, Scope::Jobs)
    }

    /// Execution plan: every job in run order with its `needs` and its step
    /// ids in run order. Nothing is executed.
    pub fn plan(&self) -> Result<Value> {
        build_plan(&self.jobs_in_order()?)
    }

    /// Execute every job in dependency order.
    pub fn run(&mut self) -> Result<ExecutionResult> {
        let start = Instant::now();

        let logger: Arc<dyn Logger> = match &self.logger {
            Some(logger) => Arc::clone(logger),
            None => Arc::new(TracingLogger::for_verbosity(
                self.verbosity.unwrap_or(Verbosity::Normal),
            )),
        };
        self.context.set_logger(logger);

        let ordered = schedule::order(&self.jobs, Scope::Jobs)?;

        if self.verbosity.is_some() {
            let plan = build_plan(&ordered)?;
            self.context.logger().info(
                "Execution plan",
                json!({ "workflow": self.name, "run_id": self.run_id, "jobs": plan }),
            );
        }

        let mut steps = Vec::new();
        for job in &ordered {
            steps.extend(job.run(&mut self.context)?);
        }

        let total_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.context.logger().info(
            "Workflow {workflow} completed",
            json!({ "workflow": self.name, "run_id": self.run_id, "total_ms": total_ms }),
        );

        Ok(ExecutionResult {
            run_id: self.run_id.clone(),
            job_order: ordered.iter().map(|job| job.id.clone()).collect(),
            steps,
            total_ms,
        })
    }
}

impl fmt::Debug for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("run_id", &self.run_id)
            .field("jobs", &self.jobs)
            .field("verbosity", &self.verbosity)
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

fn build_plan(ordered: &[&Job]) -> Result<Value> {
    let mut plan = Vec::with_capacity(ordered.len());
    for job in ordered {
        let steps: Vec<&str> = job
            .steps_in_order()?
            .into_iter()
            .map(|step| step.id.as_str())
            .collect();
        plan.push(json!({
            "job": job.id,
            "needs": job.needs,
            "steps_order": steps,
        }));
    }
    Ok(Value::Array(plan))
}

/// Builder for creating workflows.
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    definition: WorkflowDefinition,
}

impl WorkflowBuilder {
    /// Create a new workflow builder.
    pub fn new(name: &str) -> Self {
        Self {
            definition: WorkflowDefinition {
                name: name.to_string(),
                version: None,
                trigger: Trigger::default(),
                jobs: Vec::new(),
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.definition.version = Some(version.to_string());
        self
    }

    /// Set a dispatch input.
    pub fn input<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.definition
            .trigger
            .workflow_dispatch
            .get_or_insert_with(Dispatch::default)
            .inputs
            .insert(key.to_string(), value.into());
        self
    }

    /// Add a job to the workflow.
    pub fn add<J: Into<Job>>(mut self, job: J) -> Self {
        self.definition.jobs.push(job.into());
        self
    }

    /// Add a job builder (convenience).
    pub fn job(self, job: JobBuilder) -> Self {
        self.add(job.build())
    }

    /// The definition built so far.
    pub fn definition(self) -> WorkflowDefinition {
        self.definition
    }

    /// Build a runnable workflow with a fresh run id.
    pub fn build(self) -> Workflow {
        Workflow::from_definition(self.definition)
    }

    /// Execute the workflow.
    pub fn run(self) -> Result<ExecutionResult> {
        self.build().run()
    }
}

impl From<WorkflowBuilder> for Workflow {
    fn from(builder: WorkflowBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing;
    use crate::error::Error;
    use crate::executor::StepStatus;
    use crate::log::Level;
    use crate::step::Step;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingLogger {
        entries: Mutex<Vec<(Level, String, Value)>>,
    }

    impl Logger for CapturingLogger {
        fn log(&self, level: Level, message: &str, fields: &Value) {
            self.entries
                .lock()
                .unwrap()
                .push((level, message.to_string(), fields.clone()));
        }
    }

    impl CapturingLogger {
        fn messages(&self) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .map(|(_, message, _)| message.clone())
                .collect()
        }
    }

    fn with_recorder(mut workflow: Workflow) -> (Workflow, testing::Calls) {
        let (registry, calls) = testing::registry();
        workflow.set_actions(Arc::new(registry));
        (workflow, calls)
    }

    fn pipeline() -> Workflow {
        Workflow::new("pipeline")
            .version("1.0")
            .input("name", "World")
            .add(
                Job::new("deploy")
                    .needs("build")
                    .add(Step::action("ship", "test.record").with_param("from", "${step.compile.params.out}")),
            )
            .add(
                Job::new("build")
                    .add(Step::action("package", "test.record").needs("compile"))
                    .add(Step::action("compile", "test.record").with_param("out", "bin/${inputs.name}")),
            )
            .build()
    }

    #[test]
    fn test_workflow_builder() {
        let workflow = pipeline();

        assert_eq!(workflow.name(), "pipeline");
        assert_eq!(workflow.version(), "1.0");
        assert_eq!(workflow.jobs().len(), 2);
        assert_eq!(workflow.run_id().len(), 32);
        assert_eq!(
            workflow.context().get("workflow.runId").unwrap(),
            json!(workflow.run_id())
        );
        assert_eq!(workflow.context().get("inputs.name").unwrap(), json!("World"));
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = Workflow::new("w").build();
        let b = Workflow::new("w").build();
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn test_inputs_default_to_empty_mapping() {
        let workflow = Workflow::new("w").build();
        assert_eq!(workflow.context().get("inputs").unwrap(), json!({}));
    }

    #[test]
    fn test_run_orders_jobs_and_steps() {
        let (mut workflow, calls) = with_recorder(pipeline());
        let result = workflow.run().unwrap();

        assert_eq!(result.run_id, workflow.run_id());
        assert_eq!(result.job_order, vec!["build", "deploy"]);
        let steps: Vec<_> = result.steps.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(steps, vec!["compile", "package", "ship"]);
        assert!(result.steps.iter().all(|s| s.status == StepStatus::Completed));

        assert_eq!(calls.all()[2].get("from"), Some(&json!("bin/World")));
    }

    #[test]
    fn test_plan() {
        let workflow = pipeline();
        assert_eq!(
            workflow.plan().unwrap(),
            json!([
                {"job": "build", "needs": [], "steps_order": ["compile", "package"]},
                {"job": "deploy", "needs": ["build"], "steps_order": ["ship"]}
            ])
        );
    }

    #[test]
    fn test_plan_logged_only_with_verbosity() {
        let (mut workflow, _) = with_recorder(pipeline());
        let logger = Arc::new(CapturingLogger::default());
        workflow.set_logger(logger.clone());
        workflow.run().unwrap();
        assert!(!logger.messages().contains(&"Execution plan".to_string()));

        let (mut workflow, _) = with_recorder(pipeline());
        let logger = Arc::new(CapturingLogger::default());
        workflow.set_logger(logger.clone());
        workflow.set_verbosity(Verbosity::Verbose);
        workflow.run().unwrap();

        let entries = logger.entries.lock().unwrap();
        let (level, _, fields) = entries
            .iter()
            .find(|(_, message, _)| message == "Execution plan")
            .unwrap();
        assert_eq!(*level, Level::Info);
        assert_eq!(fields["workflow"], json!("pipeline"));
        assert_eq!(fields["jobs"][0]["job"], json!("build"));
        assert_eq!(workflow.context().get("verbose").unwrap(), json!("verbose"));
    }

    #[test]
    fn test_job_cycle_runs_nothing() {
        let (mut workflow, calls) = with_recorder(
            Workflow::new("w")
                .add(Job::new("a").needs("b").add(Step::action("s", "test.record")))
                .add(Job::new("b").needs("a").add(Step::action("s", "test.record")))
                .build(),
        );

        let err = workflow.run().unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
        assert_eq!(err.to_string(), "Cyclic dependency detected among jobs.");
        assert_eq!(calls.len(), 0);
    }

    #[test]
    fn test_missing_job_dependency() {
        let (mut workflow, calls) = with_recorder(
            Workflow::new("w")
                .add(Job::new("a").needs("ghost").add(Step::action("s", "test.record")))
                .build(),
        );

        let err = workflow.run().unwrap_err();
        assert!(err.to_string().contains("'ghost'"));
        assert_eq!(calls.len(), 0);
    }

    #[test]
    fn test_step_cycle_in_later_job_fails_plan_before_running() {
        let (mut workflow, calls) = with_recorder(
            Workflow::new("w")
                .add(Job::new("ok").add(Step::action("s", "test.record")))
                .add(
                    Job::new("bad")
                        .needs("ok")
                        .add(Step::action("x", "test.record").needs("y"))
                        .add(Step::action("y", "test.record").needs("x")),
                )
                .build(),
        );
        workflow.set_verbosity(Verbosity::Debug);

        assert!(matches!(workflow.run(), Err(Error::Structural(_))));
        assert_eq!(calls.len(), 0);
    }

    #[test]
    fn test_soft_failure_does_not_stop_run() {
        let (mut workflow, calls) = with_recorder(
            Workflow::new("w")
                .add(
                    Job::new("j")
                        .add(Step::action("soft", "test.record").with_param("soft_fail", true))
                        .add(Step::action("next", "test.record").needs("soft")),
                )
                .build(),
        );

        workflow.run().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            workflow.context().get("step.soft.success").unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_deserialize_definition() {
        let definition: WorkflowDefinition = serde_json::from_value(json!({
            "name": "w",
            "version": 2,
            "on": {"workflow_dispatch": {"inputs": {"dir": "/tmp"}}},
            "jobs": [{"id": "main", "steps": [{"id": "s", "uses": "console.print"}]}]
        }))
        .unwrap();

        assert_eq!(definition.version.as_deref(), Some("2"));
        let workflow = Workflow::from_definition(definition);
        assert_eq!(workflow.context().get("inputs.dir").unwrap(), json!("/tmp"));
        assert!(workflow.jobs()[0].needs.is_empty());
    }
}
