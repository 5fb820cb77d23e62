//! Jobs: ordered groups of steps.

use crate::context::Context;
use crate::error::Result;
use crate::executor::{execute_step, StepReport};
use crate::filters::text_of;
use crate::schedule::{self, Node, Scope};
use crate::step::Step;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

/// A named group of steps with dependencies on other jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique among the workflow's jobs
    pub id: String,

    /// Job ids that must finish first
    #[serde(default)]
    pub needs: Vec<String>,

    /// Steps, ordered at run time by their own `needs`
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    /// Create a new job with an id.
    pub fn new(id: &str) -> JobBuilder {
        JobBuilder::new(id)
    }

    /// Job wrapping the nested steps of a composite step.
    ///
    /// Its id is `workflow.runId` followed by `workflow.current_step`.
    pub fn sub_job(steps: &[Step], ctx: &Context) -> Result<Job> {
        let run_id = text_of(&ctx.get("workflow.runId")?);
        let current = text_of(&ctx.get("workflow.current_step")?);

        Ok(Job {
            id: format!("{run_id}{current}"),
            needs: Vec::new(),
            steps: steps.to_vec(),
        })
    }

    /// Steps in dependency order.
    pub fn steps_in_order(&self) -> Result<Vec<&Step>> {
        schedule::order(&self.steps, Scope::Steps)
    }

    /// Run every step, one at a time, in dependency order.
    ///
    /// Steps whose dependencies would allow them to overlap still run
    /// strictly one after another.
    pub fn run(&self, ctx: &mut Context) -> Result<Vec<StepReport>> {
        let ordered = self.steps_in_order()?;
        ctx.logger().info(
            "Running job {job}",
            json!({ "job": self.id, "steps": ordered.len() }),
        );

        let mut reports = Vec::with_capacity(ordered.len());
        for step in ordered {
            let start = Instant::now();
            let status = execute_step(step, ctx)?;
            reports.push(StepReport {
                job: self.id.clone(),
                step: step.id.clone(),
                status,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            });
        }

        ctx.logger()
            .info("Finished job {job}", json!({ "job": self.id }));
        Ok(reports)
    }
}

impl Node for Job {
    fn id(&self) -> &str {
        &self.id
    }

    fn needs(&self) -> &[String] {
        &self.needs
    }
}

/// Builder for creating jobs.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            job: Job {
                id: id.to_string(),
                needs: Vec::new(),
                steps: Vec::new(),
            },
        }
    }

    pub fn needs(mut self, id: &str) -> Self {
        self.job.needs.push(id.to_string());
        self
    }

    /// Add a step to the job.
    pub fn add<S: Into<Step>>(mut self, step: S) -> Self {
        self.job.steps.push(step.into());
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

impl From<JobBuilder> for Job {
    fn from(builder: JobBuilder) -> Self {
        builder.build()
    }
}
