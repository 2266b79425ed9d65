//! End-to-end integration tests for the AgentFlow engine.
//!
//! These tests drive full agent trees through the replay provider and the
//! built-in calculator: tool loops, approval-gated plans, nested streaming,
//! usage aggregation and the delegation limits.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use agentflow_agent::{Agent, AgentError, DelegationError, PlanError, PlanStatus};
use agentflow_core::context::RunContext;
use agentflow_core::error::ToolError;
use agentflow_core::message::Role;
use agentflow_core::stream::{StreamEvent, StreamEventKind, ToolCallStatus};
use agentflow_core::tool::{ParameterSpec, Tool};
use agentflow_providers::{ReplayProvider, ScriptedTurn};
use agentflow_tools::CalculatorTool;
use serde_json::json;
use tokio::sync::mpsc;

// ── Helpers ──────────────────────────────────────────────────────────────

fn usage(prompt: u32, completion: u32) -> Option<agentflow_core::provider::Usage> {
    Some(agentflow_core::provider::Usage {
        prompt_tokens: prompt,
        completion_tokens: completion,
        total_tokens: prompt + completion,
        reasoning_tokens: 0,
    })
}

fn with_usage(mut turn: ScriptedTurn, prompt: u32, completion: u32) -> ScriptedTurn {
    turn.usage = usage(prompt, completion);
    turn
}

fn calculator_agent(name: &str, provider: ReplayProvider) -> agentflow_agent::AgentBuilder {
    Agent::builder(name)
        .with_description("Does arithmetic")
        .with_system_prompt("Use the calculator for arithmetic.")
        .with_provider(Arc::new(provider))
        .with_tool(Arc::new(CalculatorTool))
}

async fn collect(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("stream stalled")
    {
        events.push(event);
    }
    events
}

fn kinds_from<'a>(events: &'a [StreamEvent], agent: &str) -> Vec<&'a str> {
    events
        .iter()
        .filter(|e| e.agent == agent)
        .map(|e| e.event_type())
        .collect()
}

// ── Tool loop ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_tool_loop_with_calculator() {
    let provider = ReplayProvider::new(vec![
        ScriptedTurn::tool("calculator", json!({"expression": "6 * 7"})),
        ScriptedTurn::text("6 times 7 is 42."),
    ]);
    let agent = calculator_agent("math", provider)
        .with_plan_approval(false)
        .build()
        .unwrap();

    let outcome = agent.run_detailed("What is 6 * 7?").await.unwrap();
    assert_eq!(outcome.response, "6 times 7 is 42.");
    assert_eq!(outcome.usage.tool_invocations, 1);
    assert_eq!(outcome.usage.tools_used, vec!["calculator"]);

    let history = agent.memory().messages().await.unwrap();
    let roles: Vec<Role> = history.iter().map(|m| m.role.clone()).collect();
    assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]);
    assert_eq!(history[1].tool_calls[0].name, "calculator");
    assert_eq!(history[2].content, "42");
    assert_eq!(history[2].tool_call_id.as_deref(), Some(history[1].tool_calls[0].id.as_str()));
}

#[tokio::test]
async fn e2e_loop_limit_forces_text_answer() {
    let provider = ReplayProvider::new(vec![
        ScriptedTurn::tool("calculator", json!({"expression": "1+1"})),
        ScriptedTurn::tool("calculator", json!({"expression": "2+2"})),
        // Tool calls on the forced final turn are dropped by the provider
        // because the request carries no tools.
        ScriptedTurn {
            content: "Enough: 4".into(),
            ..ScriptedTurn::tool("calculator", json!({"expression": "3+3"}))
        },
    ]);
    let agent = calculator_agent("math", provider)
        .with_plan_approval(false)
        .with_max_iterations(2)
        .build()
        .unwrap();

    let outcome = agent.run_detailed("keep going").await.unwrap();
    assert_eq!(outcome.response, "Enough: 4");
    assert_eq!(outcome.usage.llm_calls, 3);
    assert_eq!(outcome.usage.tool_invocations, 2);
}

// ── Approval-gated plans ─────────────────────────────────────────────────

const PLAN: &str = r#"Here is my plan:
{"description": "Add then multiply", "steps": [
  {"toolName": "calculator", "description": "add", "parameters": {"expression": "2 + 3"}},
  {"toolName": "calculator", "description": "multiply", "input": "5 * 4"}
]}"#;

#[tokio::test]
async fn e2e_plan_requires_approval_before_any_tool_runs() {
    let provider = ReplayProvider::new(vec![ScriptedTurn::text(PLAN)]);
    let agent = calculator_agent("planner", provider).build().unwrap();

    let first = agent.run_detailed("add 2 and 3, then multiply 5 by 4").await.unwrap();
    assert!(first.response.contains("**Status:** pending_approval"));
    assert_eq!(first.usage.tool_invocations, 0);

    let task_id = agent.plans().task_ids().remove(0);
    assert!(first.response.contains(&format!("approve {task_id}")));

    let report = agent.run_detailed(&format!("approve plan {task_id}")).await.unwrap();
    assert!(report.response.contains("Step 1: add\nResult: 5"));
    assert!(report.response.contains("Step 2: multiply\nResult: 20"));
    assert_eq!(report.usage.tool_invocations, 2);
    assert_eq!(report.usage.llm_calls, 0);

    let plan = agent.plan(&task_id).unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert!(plan.user_approved);
}

#[tokio::test]
async fn e2e_modify_then_approve() {
    let revised = r#"{"description": "Just add", "steps": [{"toolName": "calculator", "parameters": {"expression": "2 + 3"}}]}"#;
    let provider = ReplayProvider::new(vec![ScriptedTurn::text(PLAN), ScriptedTurn::text(revised)]);
    let agent = calculator_agent("planner", provider).build().unwrap();

    agent.run("add and multiply").await.unwrap();
    let task_id = agent.plans().task_ids().remove(0);

    let rendered = agent.run(&format!("modify {task_id} skip the multiplication")).await.unwrap();
    assert!(rendered.contains(&task_id));
    assert!(rendered.contains("Just add"));
    assert_eq!(agent.plans().len(), 1);

    let report = agent.approve_plan(&task_id).await.unwrap();
    assert!(report.contains("Result: 5"));
    assert!(!report.contains("Step 2"));
}

#[tokio::test]
async fn e2e_failing_step_marks_plan_failed() {
    let plan = r#"{"description": "bad", "steps": [
        {"toolName": "calculator", "parameters": {"expression": "1 + 1"}},
        {"toolName": "calculator", "parameters": {"expression": "1 / 0"}},
        {"toolName": "calculator", "parameters": {"expression": "3 + 3"}}
    ]}"#;
    let provider = ReplayProvider::new(vec![ScriptedTurn::text(plan)]);
    let agent = calculator_agent("planner", provider).build().unwrap();

    let created = agent.create_plan("do math").await.unwrap();
    let err = agent.approve_plan(&created.task_id).await.unwrap_err();
    assert!(matches!(err, AgentError::Plan(PlanError::StepFailed { step: 2, .. })));
    assert_eq!(agent.plan(&created.task_id).unwrap().status, PlanStatus::Failed);
}

// ── Sub-agents and streaming ─────────────────────────────────────────────

fn delegating_tree(parent_streams: bool, child_streams: bool) -> Agent {
    let child_provider = ReplayProvider::new(vec![with_usage(
        ScriptedTurn {
            thinking: Some("two plus two".into()),
            ..ScriptedTurn::text("The sum is four.")
        },
        20,
        6,
    )])
    .with_streaming(child_streams);
    let child = Agent::builder("adder")
        .with_description("Adds numbers")
        .with_provider(Arc::new(child_provider))
        .build()
        .unwrap();

    let parent_provider = ReplayProvider::new(vec![
        with_usage(ScriptedTurn::tool("adder_agent", json!({"query": "what is 2+2?"})), 10, 4),
        with_usage(ScriptedTurn::text("My helper says four."), 30, 5),
    ])
    .with_streaming(parent_streams);
    Agent::builder("boss")
        .with_provider(Arc::new(parent_provider))
        .with_sub_agent(child)
        .with_plan_approval(false)
        .build()
        .unwrap()
}

#[tokio::test]
async fn e2e_nested_streaming_forwards_sub_agent_events() {
    let boss = delegating_tree(true, true);
    let events = collect(boss.run_stream("ask the adder").await.unwrap()).await;

    assert_eq!(
        kinds_from(&events, "adder"),
        vec!["thinking", "content_delta", "content_delta", "content_delta", "content_delta", "complete"]
    );

    let child_complete = events.iter().find(|e| e.agent == "adder" && e.is_terminal()).unwrap();
    match &child_complete.kind {
        StreamEventKind::Complete { content, usage } => {
            assert_eq!(content, "The sum is four.");
            assert!(usage.is_none());
        }
        other => panic!("expected complete, got {other:?}"),
    }

    let tool_events: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.kind {
            StreamEventKind::ToolCall(t) | StreamEventKind::ToolResult(t) => Some(t),
            _ => None,
        })
        .collect();
    assert_eq!(tool_events.len(), 2);
    assert_eq!(tool_events[0].name, "adder_agent");
    assert_eq!(tool_events[1].status, ToolCallStatus::Completed);
    assert_eq!(tool_events[1].result.as_deref(), Some("The sum is four."));

    let last = events.last().unwrap();
    assert_eq!(last.agent, "boss");
    match &last.kind {
        StreamEventKind::Complete { content, usage } => {
            assert_eq!(content, "My helper says four.");
            // One tracker for the whole tree: 14 + 26 + 35.
            assert_eq!(usage.unwrap().total, 75);
        }
        other => panic!("expected complete, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_blocking_run_delegates_without_streaming() {
    let boss = delegating_tree(true, true);
    let outcome = boss.run_detailed("ask the adder").await.unwrap();
    assert_eq!(outcome.response, "My helper says four.");
    assert_eq!(outcome.usage.llm_calls, 3);
    assert_eq!(outcome.usage.tokens.total, 75);
    assert_eq!(outcome.usage.sub_agents_used, vec!["adder"]);
    assert_eq!(outcome.usage.tools_used, vec!["adder_agent"]);
}

#[tokio::test]
async fn e2e_non_streaming_child_falls_back_to_blocking() {
    let boss = delegating_tree(true, false);
    let events = collect(boss.run_stream("ask the adder").await.unwrap()).await;
    assert!(kinds_from(&events, "adder").is_empty());
    assert_eq!(events.last().unwrap().event_type(), "complete");
}

#[tokio::test]
async fn e2e_streaming_requires_streaming_provider() {
    let boss = delegating_tree(false, true);
    let err = boss.run_stream("ask the adder").await.unwrap_err();
    assert!(matches!(err, AgentError::StreamingUnsupported(_)));
}

#[tokio::test]
async fn e2e_sub_agent_keeps_its_own_memory() {
    let boss = delegating_tree(false, false);
    boss.run("ask the adder").await.unwrap();

    let adder = &boss.sub_agents()[0];
    let child_history = adder.memory().messages().await.unwrap();
    assert_eq!(child_history[0].content, "what is 2+2?");
    assert_eq!(boss.memory().len().await.unwrap(), 4);
}

// ── Delegation limits ────────────────────────────────────────────────────

#[test]
fn e2e_deep_tree_is_rejected_at_build_time() {
    let mut agent = Agent::builder("level6")
        .with_provider(Arc::new(ReplayProvider::new(vec![])))
        .build()
        .unwrap();
    for level in (0..6).rev() {
        let result = Agent::builder(format!("level{level}"))
            .with_provider(Arc::new(ReplayProvider::new(vec![])))
            .with_sub_agent(agent)
            .build();
        if level == 0 {
            assert!(matches!(
                result,
                Err(AgentError::Delegation(DelegationError::TooDeep { depth: 6, .. }))
            ));
            return;
        }
        agent = result.unwrap();
    }
}

/// A tool that re-enters its own agent, something the static tree check
/// cannot see.
struct Recurse {
    agent: OnceLock<Agent>,
}

#[async_trait::async_trait]
impl Tool for Recurse {
    fn name(&self) -> &str {
        "recurse"
    }

    fn description(&self) -> &str {
        "Ask the same agent again"
    }

    fn parameters(&self) -> std::collections::BTreeMap<String, ParameterSpec> {
        Default::default()
    }

    async fn execute(&self, ctx: &RunContext, _arguments: &str) -> Result<String, ToolError> {
        let agent = self.agent.get().ok_or(ToolError::NotFound("recurse".into()))?;
        let child = ctx.delegate(agent.name(), agent.name())?;
        agent
            .run_with_context(&child, "again")
            .await
            .map_err(|e| e.into_tool_error("recurse"))
    }
}

#[tokio::test]
async fn e2e_runtime_recursion_limit_aborts_the_run() {
    let turns = (0..10).map(|_| ScriptedTurn::tool("recurse", json!({}))).collect();
    let tool = Arc::new(Recurse { agent: OnceLock::new() });
    let agent = Agent::builder("ouroboros")
        .with_provider(Arc::new(ReplayProvider::new(turns)))
        .with_tool(tool.clone())
        .with_plan_approval(false)
        .build()
        .unwrap();
    let _ = tool.agent.set(agent.clone());

    let err = agent.run("start").await.unwrap_err();
    match err {
        AgentError::Delegation(DelegationError::RecursionLimit { depth, max, chain }) => {
            assert_eq!(depth, 6);
            assert_eq!(max, 5);
            assert_eq!(chain.matches("ouroboros").count(), 7);
        }
        other => panic!("expected recursion limit, got {other}"),
    }
}

// ── Cancellation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_cancelled_stream_ends_without_terminal_event() {
    let boss = delegating_tree(true, true);
    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let events = collect(boss.run_stream_with_cancel("ask the adder", cancel).await.unwrap()).await;
    assert!(events.iter().all(|e| !e.is_terminal()));
}
