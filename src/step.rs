//! Workflow step definitions.

use crate::schedule::Node;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single action invocation inside a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique among sibling steps
    pub id: String,

    /// Registered action name (e.g., "console.print", "flow.steps")
    pub uses: String,

    /// Parameters passed to the action, templates allowed
    #[serde(default)]
    pub with: Map<String, Value>,

    /// Expression resolving to a sequence; the action runs once per element
    #[serde(
        default,
        rename = "forEach",
        skip_serializing_if = "Option::is_none"
    )]
    pub for_each: Option<Value>,

    /// Condition; the step is skipped when it evaluates to false
    #[serde(
        default,
        rename = "if",
        deserialize_with = "optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition: Option<String>,

    /// Sibling step ids that must run first
    #[serde(default)]
    pub needs: Vec<String>,

    /// Nested steps for composite actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Step {
    /// Start building a step that runs action `uses`.
    pub fn action(id: &str, uses: &str) -> StepBuilder {
        StepBuilder::new(id, uses)
    }
}

impl Node for Step {
    fn id(&self) -> &str {
        &self.id
    }

    fn needs(&self) -> &[String] {
        &self.needs
    }
}

/// Builder for creating workflow steps.
#[derive(Debug, Clone)]
pub struct StepBuilder {
    step: Step,
}

impl StepBuilder {
    pub fn new(id: &str, uses: &str) -> Self {
        Self {
            step: Step {
                id: id.to_string(),
                uses: uses.to_string(),
                with: Map::new(),
                for_each: None,
                condition: None,
                needs: Vec::new(),
                steps: Vec::new(),
            },
        }
    }

    /// Add a parameter. String values may contain `${...}` placeholders.
    pub fn with_param<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.step.with.insert(key.to_string(), value.into());
        self
    }

    /// Add all parameters from a JSON object.
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            for (k, v) in map {
                self.step.with.insert(k, v);
            }
        }
        self
    }

    pub fn for_each<V: Into<Value>>(mut self, items: V) -> Self {
        self.step.for_each = Some(items.into());
        self
    }

    /// Set the `if` condition.
    pub fn when(mut self, condition: &str) -> Self {
        self.step.condition = Some(condition.to_string());
        self
    }

    pub fn needs(mut self, id: &str) -> Self {
        self.step.needs.push(id.to_string());
        self
    }

    /// Add a nested step.
    pub fn step<S: Into<Step>>(mut self, step: S) -> Self {
        self.step.steps.push(step.into());
        self
    }

    pub fn build(self) -> Step {
        self.step
    }
}

impl From<StepBuilder> for Step {
    fn from(builder: StepBuilder) -> Self {
        builder.build()
    }
}

/// Accept a string or any scalar (`if: true`, `version: 1.2`) as text.
pub(crate) fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
