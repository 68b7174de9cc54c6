//! Tasks, workflow patterns and supervisor plans

use cortex_core::Capability;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How several agents cooperate on one task.
///
/// An empty agent list means one agent per required capability. A
/// hierarchical workflow without a supervisor uses the configured one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pattern", rename_all = "snake_case")]
pub enum Workflow {
    Sequential { agents: Vec<String> },
    Parallel { agents: Vec<String> },
    Hierarchical {
        #[serde(default)]
        supervisor: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub prompt: String,
    /// Run exactly this agent.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub hints: BTreeSet<Capability>,
    #[serde(default)]
    pub workflow: Option<Workflow>,
    #[serde(default)]
    pub context: Option<String>,
}

impl Task {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Default::default() }
    }

    pub fn target(mut self, agent: impl Into<String>) -> Self {
        self.target = Some(agent.into());
        self
    }

    pub fn hint(mut self, capability: Capability) -> Self {
        self.hints.insert(capability);
        self
    }

    pub fn workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    #[default]
    Sequential,
    Parallel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub agent: String,
    /// Falls back to the task prompt when blank.
    #[serde(default)]
    pub prompt: String,
}

/// Supervisor output: which agents to run, and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub mode: PlanMode,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

/// Parse the first balanced `{...}` object in `text` as a [`Plan`].
pub fn extract_plan(text: &str) -> Result<Plan, String> {
    let object = first_json_object(text).ok_or_else(|| "no JSON object in supervisor reply".to_string())?;
    serde_json::from_str(object).map_err(|e| format!("invalid plan: {}", e))
}

/// `text` without its plan object, for supervisors that answer directly.
pub fn strip_plan(text: &str) -> String {
    match first_json_object(text) {
        Some(object) => text.replacen(object, "", 1).trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Slice of the first brace-balanced object, skipping braces inside strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
