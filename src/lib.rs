//! # jobflow
//!
//! Declarative job/step workflow orchestration.
//!
//! A workflow is a set of jobs; a job is a set of steps; each step invokes a
//! registered action with parameters that may reference earlier results
//! through `${...}` placeholders. Jobs and steps run strictly one after
//! another, in the order given by their `needs`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use jobflow::{Job, Step, Workflow};
//!
//! let result = Workflow::new("my-workflow")
//!     .input("name", "World")
//!     .add(Job::new("main")
//!         .add(Step::action("greet", "console.print")
//!             .with_param("message", "Hello ${inputs.name|upper}!"))
//!         .add(Step::action("save", "file.write")
//!             .with_param("path", "/tmp/greeting.txt")
//!             .with_param("content", "${step.greet.success}")
//!             .needs("greet")))
//!     .run()?;
//!
//! println!("{} steps in {:.1}ms", result.steps.len(), result.total_ms);
//! # Ok::<(), jobflow::Error>(())
//! ```
//!
//! ## YAML Definition
//!
//! ```yaml
//! name: my-workflow
//! on:
//!   workflow_dispatch:
//!     inputs:
//!       files: [a.json, b.json]
//! jobs:
//!   - id: load
//!     steps:
//!       - id: read
//!         uses: file.json.read
//!         forEach: "${inputs.files}"
//!         with:
//!           path: "${item.data}"
//!   - id: report
//!     needs: [load]
//!     steps:
//!       - id: show
//!         uses: console.print
//!         if: "${step.read[0].success}"
//!         with:
//!           message: "${step.read[0].decoded}"
//! ```

pub mod actions;
mod condition;
mod context;
mod error;
mod executor;
mod filters;
mod job;
pub mod log;
pub mod output;
mod path;
mod query;
mod schedule;
mod step;
mod template;
mod workflow;
pub mod yaml;

pub use actions::{Action, ActionOutput, ActionRegistry};
pub use context::Context;
pub use error::{Error, Result};
pub use executor::{execute_step, ExecutionResult, StepReport, StepStatus};
pub use job::{Job, JobBuilder};
pub use log::{Level, Logger, TracingLogger, Verbosity};
pub use output::{ConsoleOutput, MemoryOutput, Output};
pub use schedule::{Node, Scope};
pub use step::{Step, StepBuilder};
pub use template::{resolve, resolve_str};
pub use workflow::{Dispatch, Trigger, Workflow, WorkflowBuilder, WorkflowDefinition};
pub use yaml::{load_file, parse_yaml};

/// Re-export common types
pub use serde_json::Value;
