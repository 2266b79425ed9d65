//! Plan generation prompts and response parsing.
//!
//! The model is asked for a JSON object
//! `{description, steps: [{toolName, description, input, parameters}]}`.
//! Responses may wrap it in prose; everything from the first `{` to the last
//! `}` is decoded. Step tool names are not checked here; the executor does
//! that when the plan runs.

use agentflow_core::tool::ToolRegistry;
use serde::Deserialize;
use tracing::debug;
use crate::error::PlanError;
use crate::plan::{ExecutionPlan, PlanStep};

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else, in this form:
{"description": "<one sentence summary>", "steps": [{"toolName": "<tool>", "description": "<what this step does>", "input": "<free text, if the tool takes no parameters>", "parameters": {"<name>": <value>}}]}"#;

/// A decoded plan before it gets a task id.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanDraft {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl PlanDraft {
    pub fn into_plan(self) -> ExecutionPlan {
        ExecutionPlan::new(self.description, self.steps)
    }
}

/// Describe every tool with its parameters, required ones marked.
pub fn describe_tools(tools: &ToolRegistry) -> String {
    let mut out = String::new();
    for tool in tools.iter() {
        out.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
        for (name, spec) in tool.parameters() {
            let required = if spec.required { ", required" } else { "" };
            out.push_str(&format!("    - {name} ({}{required}): {}\n", spec.kind, spec.description));
        }
    }
    out
}

/// Instructions for turning `request` into a plan.
pub fn generation_prompt(system_prompt: &str, tools: &ToolRegistry) -> String {
    let mut prompt = String::new();
    if !system_prompt.is_empty() {
        prompt.push_str(system_prompt);
        prompt.push_str("\n\n");
    }
    prompt.push_str(
        "Plan how to fulfil the user's request using only the tools below. \
         Do not carry out the plan; list the tool calls in the order they should run.\n\n",
    );
    prompt.push_str("Available tools:\n");
    prompt.push_str(&describe_tools(tools));
    prompt.push('\n');
    prompt.push_str(RESPONSE_FORMAT);
    prompt
}

/// Instructions for revising `current` according to `feedback`.
pub fn modification_prompt(
    system_prompt: &str,
    tools: &ToolRegistry,
    current: &ExecutionPlan,
    feedback: &str,
) -> String {
    let steps = serde_json::to_string_pretty(&serde_json::json!({
        "description": current.description,
        "steps": current.steps,
    }))
    .unwrap_or_default();

    let mut prompt = generation_prompt(system_prompt, tools);
    prompt.push_str("\n\nThe current plan is:\n");
    prompt.push_str(&steps);
    prompt.push_str("\n\nRevise it according to the user's feedback:\n");
    prompt.push_str(feedback);
    prompt
}

/// The span from the first `{` to the last `}`, if there is one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Decode a model response into a plan draft.
pub fn parse_plan_response(text: &str) -> Result<PlanDraft, PlanError> {
    let json = extract_json_object(text).ok_or(PlanError::JsonNotFound)?;
    let draft: PlanDraft =
        serde_json::from_str(json).map_err(|e| PlanError::JsonDecode(e.to_string()))?;
    debug!(steps = draft.steps.len(), "Parsed plan response");
    Ok(draft)
}
