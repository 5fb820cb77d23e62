//! Step execution and run reports.

use crate::actions::{Action, ActionOutput};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::step::Step;
use crate::{condition, template};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Result of a workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Id of the run
    pub run_id: String,

    /// Job ids in the order they ran
    pub job_order: Vec<String>,

    /// Every top-level step, in execution order
    pub steps: Vec<StepReport>,

    /// Total execution time in milliseconds
    pub total_ms: f64,
}

/// Outcome of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Id of the job the step belongs to
    pub job: String,

    /// Step id
    pub step: String,

    pub status: StepStatus,

    /// Execution time in milliseconds
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The action ran and its result is stored at `step.<id>`
    Completed,
    /// The `if` condition was false; nothing was stored
    Skipped,
}

/// Execute one step against `ctx`.
///
/// The step id is recorded at `workflow.current_step` first. A false `if`
/// skips the step without storing anything. Otherwise the action runs once,
/// or once per `forEach` element with `item = {iteration, data}` set and
/// `with` re-resolved each time, and the result (a mapping, or a list of
/// mappings for `forEach`) is stored at `step.<id>`.
///
/// An action that returns `success: false` is recorded like any other
/// result. Only an action error stops the step.
pub fn execute_step(step: &Step, ctx: &mut Context) -> Result<StepStatus> {
    ctx.set("workflow.current_step", step.id.as_str())?;
    ctx.logger()
        .info("Running step {step}", json!({ "step": step.id }));

    let status = run_step(step, ctx)?;

    ctx.logger()
        .info("Finished step {step}", json!({ "step": step.id }));
    Ok(status)
}

fn run_step(step: &Step, ctx: &mut Context) -> Result<StepStatus> {
    if let Some(expression) = &step.condition {
        if !condition::evaluate(&step.id, expression, ctx)? {
            ctx.logger().info(
                "Skipping step {step}: condition is false",
                json!({ "step": step.id, "condition": expression }),
            );
            return Ok(StepStatus::Skipped);
        }
    }

    let params = template::resolve_map(&step.with, ctx)?;
    let action = ctx.actions().create(&step.uses)?;

    let result = match &step.for_each {
        Some(expression) => {
            let items = match template::resolve(expression, ctx)? {
                Value::Array(items) => items,
                other => {
                    return Err(Error::validation(format!(
                        "forEach of step '{}' must resolve to a sequence, got {}.",
                        step.id,
                        kind_of(&other)
                    )))
                }
            };

            let total = items.len();
            let mut results = Vec::with_capacity(total);
            for (iteration, data) in items.into_iter().enumerate() {
                ctx.set("item", json!({ "iteration": iteration, "data": data }))?;
                let params = template::resolve_map(&step.with, ctx)?;

                let fields = json!({ "step": step.id, "n": iteration + 1, "total": total });
                ctx.logger()
                    .info("Running step iteration {step} ({n}/{total})", fields.clone());
                results.push(Value::Object(dispatch(action.as_ref(), step, params, ctx)?));
                ctx.logger()
                    .info("Finished step iteration {step} ({n}/{total})", fields);
            }
            Value::Array(results)
        }
        None => Value::Object(dispatch(action.as_ref(), step, params, ctx)?),
    };

    ctx.set(&format!("step.{}", step.id), result)?;
    Ok(StepStatus::Completed)
}

fn dispatch(
    action: &dyn Action,
    step: &Step,
    params: Map<String, Value>,
    ctx: &mut Context,
) -> Result<ActionOutput> {
    // nested steps of an earlier iteration may have moved it
    ctx.set("workflow.current_step", step.id.as_str())?;
    action
        .execute(params, ctx, &step.steps)
        .map_err(|source| match source.downcast::<Error>() {
            // errors from nested sub-jobs keep their kind
            Ok(inner) => inner,
            Err(source) => Error::Action {
                step: step.id.clone(),
                source,
            },
        })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::testing;
    use std::sync::Arc;

    fn ctx() -> (Context, testing::Calls) {
        let (registry, calls) = testing::registry();
        let mut ctx = Context::new("run1");
        ctx.set_actions(Arc::new(registry));
        (ctx, calls)
    }

    #[test]
    fn test_single_dispatch_records_result() {
        let (mut ctx, calls) = ctx();
        ctx.set("inputs.name", "World").unwrap();

        let step = Step::action("greet", "test.record")
            .with_param("message", "Hello ${inputs.name}!")
            .build();

        assert_eq!(execute_step(&step, &mut ctx).unwrap(), StepStatus::Completed);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls.all()[0].get("message"), Some(&json!("Hello World!")));
        assert_eq!(ctx.get("step.greet.success").unwrap(), json!(true));
        assert_eq!(ctx.get("workflow.current_step").unwrap(), json!("greet"));
    }

    #[test]
    fn test_for_each_iterates_in_order() {
        let (mut ctx, calls) = ctx();
        ctx.set("inputs.files", json!(["a.txt", "b.txt"])).unwrap();

        let step = Step::action("each", "test.record")
            .for_each("${inputs.files}")
            .with_param("index", "${item.iteration}")
            .with_param("file", "${item.data}")
            .build();

        execute_step(&step, &mut ctx).unwrap();

        let calls = calls.all();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].get("index"), Some(&json!(0)));
        assert_eq!(calls[0].get("file"), Some(&json!("a.txt")));
        assert_eq!(calls[1].get("index"), Some(&json!(1)));
        assert_eq!(calls[1].get("file"), Some(&json!("b.txt")));

        let stored = ctx.get("step.each").unwrap();
        let stored = stored.as_array().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0]["params"]["file"], json!("a.txt"));
        assert_eq!(stored[1]["params"]["file"], json!("b.txt"));
    }

    #[test]
    fn test_for_each_literal_sequence() {
        let (mut ctx, calls) = ctx();
        let step = Step::action("each", "test.record")
            .for_each(json!([1, 2, 3]))
            .with_param("n", "${item.data}")
            .build();

        execute_step(&step, &mut ctx).unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(ctx.get("item.iteration").unwrap(), json!(2));
    }

    #[test]
    fn test_for_each_empty_sequence() {
        let (mut ctx, calls) = ctx();
        let step = Step::action("each", "test.record").for_each(json!([])).build();

        execute_step(&step, &mut ctx).unwrap();
        assert_eq!(calls.len(), 0);
        assert_eq!(ctx.get("step.each").unwrap(), json!([]));
    }

    #[test]
    fn test_for_each_requires_sequence() {
        let (mut ctx, calls) = ctx();
        ctx.set("inputs.one", "scalar").unwrap();
        let step = Step::action("each", "test.record")
            .for_each("${inputs.one}")
            .build();

        let err = execute_step(&step, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(calls.len(), 0);
    }

    #[test]
    fn test_for_each_continues_after_soft_failure() {
        let (mut ctx, calls) = ctx();
        let step = Step::action("each", "test.record")
            .for_each(json!([true, false]))
            .with_param("soft_fail", "${item.data}")
            .build();

        execute_step(&step, &mut ctx).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(ctx.get("step.each[0].success").unwrap(), json!(false));
        assert_eq!(ctx.get("step.each[1].success").unwrap(), json!(true));
    }

    #[test]
    fn test_for_each_aborts_on_raised_error() {
        let (mut ctx, calls) = ctx();
        let step = Step::action("each", "test.record")
            .for_each(json!([false, true, false]))
            .with_param("fail", "${item.data}")
            .build();

        let err = execute_step(&step, &mut ctx).unwrap_err();
        assert!(matches!(err, Error::Action { ref step, .. } if step == "each"));
        assert_eq!(calls.len(), 2);
        assert_eq!(ctx.get("step.each").unwrap(), Value::Null);
    }

    #[test]
    fn test_false_condition_skips() {
        let (mut ctx, calls) = ctx();
        ctx.set("inputs.enabled", false).unwrap();

        let step = Step::action("maybe", "test.record")
            .when("${inputs.enabled}")
            .build();

        assert_eq!(execute_step(&step, &mut ctx).unwrap(), StepStatus::Skipped);
        assert_eq!(calls.len(), 0);
        assert_eq!(ctx.get("step.maybe").unwrap(), Value::Null);
        assert_eq!(ctx.get("workflow.current_step").unwrap(), json!("maybe"));
    }

    #[test]
    fn test_true_condition_runs() {
        let (mut ctx, calls) = ctx();
        ctx.set("inputs.count", 7).unwrap();

        let step = Step::action("maybe", "test.record")
            .when("${inputs.count} > 5")
            .build();

        assert_eq!(execute_step(&step, &mut ctx).unwrap(), StepStatus::Completed);
        assert_eq!(calls.len(), 1);
    }

    #[test]
    fn test_soft_failure_is_stored() {
        let (mut ctx, _) = ctx();
        let step = Step::action("soft", "test.record")
            .with_param("soft_fail", true)
            .build();

        assert_eq!(execute_step(&step, &mut ctx).unwrap(), StepStatus::Completed);
        assert_eq!(ctx.get("step.soft.success").unwrap(), json!(false));
    }

    #[test]
    fn test_unknown_action() {
        let (mut ctx, _) = ctx();
        let step = Step::action("x", "does.not.exist").build();
        assert!(matches!(
            execute_step(&step, &mut ctx),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_filter_in_params() {
        let (mut ctx, calls) = ctx();
        let step = Step::action("x", "test.record")
            .with_param("v", "${inputs.x|zzz}")
            .build();

        let err = execute_step(&step, &mut ctx).unwrap_err();
        assert!(err.to_string().contains("zzz"));
        assert_eq!(calls.len(), 0);
    }
}
