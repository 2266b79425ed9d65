//! Plan execution.
//!
//! Steps run strictly in order. The first failure marks the plan `failed`
//! and ends execution; steps that already ran are not undone.

use agentflow_core::context::RunContext;
use agentflow_core::tool::ToolRegistry;
use tracing::{info, warn};
use crate::error::PlanError;
use crate::plan::{ExecutionPlan, PlanStatus};

/// Run an approved plan against `tools`.
///
/// Returns a per-step report on success. On failure the error is the only
/// output; results of earlier steps are discarded.
pub async fn execute_plan(
    plan: &mut ExecutionPlan,
    tools: &ToolRegistry,
    ctx: &RunContext,
) -> Result<String, PlanError> {
    if !plan.user_approved {
        warn!(task_id = %plan.task_id, status = %plan.status, "Refusing to execute unapproved plan");
        return Err(PlanError::NotApproved(plan.task_id.clone()));
    }
    plan.transition(PlanStatus::Executing)?;
    info!(task_id = %plan.task_id, steps = plan.steps.len(), "Executing plan");

    let mut report = format!("Plan `{}` executed successfully.\n", plan.task_id);

    for (index, step) in plan.steps.iter().enumerate() {
        let number = index + 1;
        let outcome = run_step(number, step, tools, ctx).await;
        match outcome {
            Ok(result) => {
                report.push_str(&format!("\nStep {number}: {}\nResult: {result}\n", step_label(step)));
            }
            Err(err) => {
                warn!(task_id = %plan.task_id, step = number, error = %err, "Plan step failed");
                plan.transition(PlanStatus::Failed)?;
                return Err(err);
            }
        }
    }

    plan.transition(PlanStatus::Completed)?;
    info!(task_id = %plan.task_id, "Plan completed");
    Ok(report)
}

async fn run_step(
    number: usize,
    step: &crate::plan::PlanStep,
    tools: &ToolRegistry,
    ctx: &RunContext,
) -> Result<String, PlanError> {
    let tool = tools.get(&step.tool_name).ok_or_else(|| PlanError::UnknownTool {
        step: number,
        tool: step.tool_name.clone(),
    })?;

    let arguments = step.arguments().map_err(|e| PlanError::Arguments {
        step: number,
        tool: step.tool_name.clone(),
        reason: e.to_string(),
    })?;

    ctx.usage().add_tool_call(&step.tool_name);
    tool.execute(ctx, &arguments)
        .await
        .map_err(|e| PlanError::StepFailed {
            step: number,
            tool: step.tool_name.clone(),
            reason: e.to_string(),
        })
}

fn step_label(step: &crate::plan::PlanStep) -> &str {
    if step.description.is_empty() {
        &step.tool_name
    } else {
        &step.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use agentflow_core::error::ToolError;
    use agentflow_core::tool::{ParameterSpec, Tool};
    use async_trait::async_trait;
    use crate::plan::PlanStep;

    /// Records every argument string it receives.
    struct RecordingTool {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str { self.name }
        fn description(&self) -> &str { "records arguments" }
        fn parameters(&self) -> BTreeMap<String, ParameterSpec> { BTreeMap::new() }
        async fn execute(&self, _ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
            self.seen.lock().unwrap().push(arguments.to_string());
            if self.fail {
                return Err(ToolError::ExecutionFailed { tool_name: self.name.into(), reason: "boom".into() });
            }
            Ok(format!("ok:{arguments}"))
        }
    }

    fn setup(fail_second: bool) -> (ToolRegistry, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ToolRegistry::from_tools([
            Arc::new(RecordingTool { name: "first", seen: seen.clone(), fail: false }) as Arc<dyn Tool>,
            Arc::new(RecordingTool { name: "second", seen: seen.clone(), fail: fail_second }),
        ]);
        (registry, seen)
    }

    fn approved(steps: Vec<PlanStep>) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new("test", steps);
        plan.submit(true).unwrap();
        plan.approve().unwrap();
        plan
    }

    #[tokio::test]
    async fn refuses_plan_without_user_approval_even_if_status_says_approved() {
        let (tools, seen) = setup(false);
        let mut plan = ExecutionPlan::new("sneaky", vec![PlanStep::new("first", "")]);
        plan.status = PlanStatus::Approved;
        plan.user_approved = false;

        let err = execute_plan(&mut plan, &tools, &RunContext::new()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotApproved(_)));
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(plan.status, PlanStatus::Approved);
    }

    #[tokio::test]
    async fn argument_payloads() {
        let (tools, seen) = setup(false);
        let mut plan = approved(vec![
            PlanStep::new("first", "params").with_parameter("x", 1.into()).with_parameter("y", "z".into()),
            PlanStep::new("first", "text").with_input("plain words"),
            PlanStep::new("second", "nothing"),
        ]);

        let report = execute_plan(&mut plan, &tools, &RunContext::new()).await.unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);

        let seen = seen.lock().unwrap();
        let first: serde_json::Value = serde_json::from_str(&seen[0]).unwrap();
        let keys: Vec<&String> = first.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["x", "y"]);
        assert_eq!(seen[1], "plain words");
        assert_eq!(seen[2], "{}");

        assert!(report.contains("Step 1: params"));
        assert!(report.contains("Result: ok:plain words"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_forward() {
        let (tools, seen) = setup(false);
        let mut plan = approved(vec![
            PlanStep::new("first", "runs"),
            PlanStep::new("missing", "explodes"),
            PlanStep::new("second", "never runs"),
        ]);

        let err = execute_plan(&mut plan, &tools, &RunContext::new()).await.unwrap_err();
        assert!(matches!(err, PlanError::UnknownTool { step: 2, .. }));
        assert_eq!(plan.status, PlanStatus::Failed);
        // The first step already happened and stays happened.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn tool_error_stops_execution() {
        let (tools, seen) = setup(true);
        let mut plan = approved(vec![
            PlanStep::new("second", "fails"),
            PlanStep::new("first", "never runs"),
        ]);

        let ctx = RunContext::new();
        let err = execute_plan(&mut plan, &tools, &ctx).await.unwrap_err();
        assert!(matches!(err, PlanError::StepFailed { step: 1, .. }));
        assert_eq!(plan.status, PlanStatus::Failed);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(ctx.usage().snapshot().used_tool("second"));
    }
}
