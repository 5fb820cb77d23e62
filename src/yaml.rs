//! YAML workflow loader.

use crate::actions::ActionRegistry;
use crate::error::Error;
use crate::step::Step;
use crate::workflow::WorkflowDefinition;
use anyhow::{Context, Result};
use std::path::Path;

/// Parse a workflow from YAML string.
///
/// Every `uses` must name a built-in action; see [`parse_yaml_with`] for
/// custom registries.
///
/// # Example
///
/// ```rust
/// use jobflow::parse_yaml;
///
/// let yaml = r#"
/// name: my-workflow
/// on:
///   workflow_dispatch:
///     inputs:
///       name: World
/// jobs:
///   - id: main
///     steps:
///       - id: greet
///         uses: console.print
///         with:
///           message: "Hello ${inputs.name}!"
/// "#;
///
/// let workflow = parse_yaml(yaml).unwrap();
/// assert_eq!(workflow.name, "my-workflow");
/// assert_eq!(workflow.jobs[0].steps.len(), 1);
/// ```
pub fn parse_yaml(yaml: &str) -> Result<WorkflowDefinition> {
    parse_yaml_with(yaml, &ActionRegistry::builtin())
}

/// Parse a workflow, checking `uses` against `registry`.
pub fn parse_yaml_with(yaml: &str, registry: &ActionRegistry) -> Result<WorkflowDefinition> {
    let workflow: WorkflowDefinition =
        serde_yaml::from_str(yaml).context("Failed to parse workflow YAML")?;

    validate(&workflow)?;
    validate_actions(&workflow, registry)?;

    Ok(workflow)
}

/// Load and parse a workflow from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use jobflow::yaml::load_file;
///
/// let workflow = load_file("workflow.yaml")?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn load_file(path: impl AsRef<Path>) -> Result<WorkflowDefinition> {
    load_file_with(path, &ActionRegistry::builtin())
}

/// Load a workflow file, checking `uses` against `registry`.
pub fn load_file_with(
    path: impl AsRef<Path>,
    registry: &ActionRegistry,
) -> Result<WorkflowDefinition> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

    parse_yaml_with(&content, registry)
        .with_context(|| format!("Failed to parse workflow file: {}", path.display()))
}

/// Validate a workflow.
fn validate(workflow: &WorkflowDefinition) -> Result<()> {
    if workflow.name.trim().is_empty() {
        anyhow::bail!("Workflow name cannot be empty");
    }

    if workflow.jobs.is_empty() {
        anyhow::bail!("Workflow must have at least one job");
    }

    for (i, job) in workflow.jobs.iter().enumerate() {
        if job.id.trim().is_empty() {
            anyhow::bail!("Job {} has an empty id", i);
        }
        validate_steps(&job.id, &job.steps)?;
    }

    Ok(())
}

fn validate_steps(owner: &str, steps: &[Step]) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            anyhow::bail!("Step {} of '{}' has an empty id", i, owner);
        }
        if step.uses.trim().is_empty() {
            anyhow::bail!("Step '{}' has an empty action name", step.id);
        }
        validate_steps(&step.id, &step.steps)?;
    }
    Ok(())
}

/// Check that every `uses`, nested steps included, is registered.
pub fn validate_actions(
    workflow: &WorkflowDefinition,
    registry: &ActionRegistry,
) -> crate::Result<()> {
    fn walk(steps: &[Step], registry: &ActionRegistry) -> crate::Result<()> {
        for step in steps {
            if !registry.contains(&step.uses) {
                return Err(Error::configuration(format!(
                    "Step '{}' uses unknown action '{}'.",
                    step.id, step.uses
                )));
            }
            walk(&step.steps, registry)?;
        }
        Ok(())
    }

    workflow
        .jobs
        .iter()
        .try_for_each(|job| walk(&job.steps, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_parse_simple_workflow() {
        let yaml = r#"
name: test-workflow
version: 1.0
on:
  workflow_dispatch:
    inputs:
      name: World
jobs:
  - id: main
    steps:
      - id: greet
        uses: console.print
        with:
          message: "Hello ${inputs.name}!"
"#;

        let workflow = parse_yaml(yaml).unwrap();
        assert_eq!(workflow.name, "test-workflow");
        assert_eq!(workflow.version, Some("1.0".to_string()));
        assert_eq!(workflow.jobs.len(), 1);
        assert_eq!(workflow.jobs[0].steps[0].uses, "console.print");
        let inputs = &workflow.trigger.workflow_dispatch.as_ref().unwrap().inputs;
        assert_eq!(inputs.get("name"), Some(&json!("World")));
    }

    #[test]
    fn test_parse_multi_job_workflow() {
        let yaml = r#"
name: pipeline
jobs:
  - id: report
    needs: [collect]
    steps:
      - id: save
        uses: file.write
        with:
          path: /tmp/out.json
          content: "${step.load.decoded}"
  - id: collect
    steps:
      - id: load
        uses: file.json.read
        if: "${inputs.enabled|default(true)}"
        with:
          path: data.json
      - id: each
        uses: console.print
        forEach: "${step.load.decoded.items}"
        needs: [load]
        with:
          message: "${item.data}"
"#;

        let workflow = parse_yaml(yaml).unwrap();
        assert_eq!(workflow.jobs.len(), 2);
        assert_eq!(workflow.jobs[0].needs, vec!["collect"]);

        let each = &workflow.jobs[1].steps[1];
        assert_eq!(each.for_each, Some(json!("${step.load.decoded.items}")));
        assert_eq!(each.needs, vec!["load"]);
        assert_eq!(
            workflow.jobs[1].steps[0].condition.as_deref(),
            Some("${inputs.enabled|default(true)}")
        );
    }

    #[test]
    fn test_parse_nested_steps() {
        let yaml = r#"
name: nested
jobs:
  - id: main
    steps:
      - id: group
        uses: flow.steps
        steps:
          - id: inner
            uses: console.print
            with:
              message: hi
"#;

        let workflow = parse_yaml(yaml).unwrap();
        assert_eq!(workflow.jobs[0].steps[0].steps[0].id, "inner");
    }

    #[test]
    fn test_validate_empty_name() {
        let yaml = r#"
name: ""
jobs:
  - id: main
    steps: []
"#;

        let result = parse_yaml(yaml);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("name cannot be empty"));
    }

    #[test]
    fn test_validate_no_jobs() {
        let yaml = r#"
name: empty-workflow
jobs: []
"#;

        let result = parse_yaml(yaml);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least one job"));
    }

    #[test]
    fn test_validate_unknown_action() {
        let yaml = r#"
name: w
jobs:
  - id: main
    steps:
      - id: group
        uses: flow.steps
        steps:
          - id: call
            uses: http.get
"#;

        let err = parse_yaml(yaml).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::Configuration(message)) => {
                assert_eq!(message, "Step 'call' uses unknown action 'http.get'.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_custom_registry() {
        let yaml = r#"
name: w
jobs:
  - id: main
    steps:
      - id: only
        uses: flow.steps
"#;

        let mut registry = ActionRegistry::new();
        assert!(parse_yaml_with(yaml, &registry).is_err());

        registry.register("flow.steps", || crate::actions::MultiStepsAction);
        assert!(parse_yaml_with(yaml, &registry).is_ok());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: from-file\njobs:\n  - id: main\n    steps:\n      - id: s\n        uses: console.print"
        )
        .unwrap();

        let workflow = load_file(file.path()).unwrap();
        assert_eq!(workflow.name, "from-file");
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read workflow file"));
    }
}
