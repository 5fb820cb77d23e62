//! `flow.steps`: run nested steps as a sub-job.

use super::{output, Action, ActionOutput};
use crate::context::Context;
use crate::job::Job;
use crate::step::Step;
use serde_json::{json, Map, Value};

/// Composite action running its nested steps in dependency order.
///
/// The sub-job id is the run id followed by the enclosing step's id, so
/// nested invocations in different steps never share an id.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiStepsAction;

impl Action for MultiStepsAction {
    fn execute(
        &self,
        _params: Map<String, Value>,
        ctx: &mut Context,
        steps: &[Step],
    ) -> anyhow::Result<ActionOutput> {
        let job = Job::sub_job(steps, ctx)?;
        let reports = job.run(ctx)?;

        Ok(output(json!({
            "success": true,
            "job": job.id,
            "steps": reports.len(),
        })))
    }
}
