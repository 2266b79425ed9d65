//! Sub-agent delegation.
//!
//! A sub-agent is exposed to its parent as a tool named `<name>_agent` with
//! a single `query` parameter. Two independent guards keep delegation
//! bounded:
//!
//! - at build time, [`validate_graph`] walks the sub-agent tree and rejects
//!   name cycles and trees taller than [`MAX_SUBAGENT_DEPTH`];
//! - at call time, [`RunContext::delegate`] refuses chains longer than
//!   [`agentflow_core::MAX_DELEGATION_DEPTH`], which also covers recursion
//!   the static tree cannot see (tools that call agents, remote agents).

use std::collections::{BTreeMap, HashMap};
use agentflow_core::context::RunContext;
use agentflow_core::error::ToolError;
use agentflow_core::tool::{ParameterSpec, Tool};
use async_trait::async_trait;
use tracing::{debug, info};
use crate::agent::Agent;
use crate::error::DelegationError;

/// Maximum height of a sub-agent tree. A leaf has height 0.
pub const MAX_SUBAGENT_DEPTH: usize = 5;

/// Tool name under which a sub-agent is exposed.
pub fn tool_name_for(agent_name: &str) -> String {
    format!("{agent_name}_agent")
}

/// Adapter that lets a parent call a sub-agent like any other tool.
pub struct SubAgentTool {
    parent: String,
    agent: Agent,
    tool_name: String,
    description: String,
}

impl SubAgentTool {
    pub fn new(parent: impl Into<String>, agent: Agent) -> Self {
        let tool_name = tool_name_for(agent.name());
        let description = if agent.description().is_empty() {
            format!("Delegate a request to the {} agent.", agent.name())
        } else {
            format!("Delegate to the {} agent: {}", agent.name(), agent.description())
        };
        Self {
            parent: parent.into(),
            agent,
            tool_name,
            description,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

/// `{"query": "..."}`, or bare text.
fn query_from(arguments: &str) -> Result<String, ToolError> {
    let trimmed = arguments.trim();
    if !trimmed.starts_with('{') {
        if trimmed.is_empty() {
            return Err(ToolError::InvalidArguments("Missing 'query' argument".into()));
        }
        return Ok(trimmed.to_string());
    }
    let value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| ToolError::InvalidArguments(format!("Arguments are not valid JSON: {e}")))?;
    value["query"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))
}

#[async_trait]
impl Tool for SubAgentTool {
    fn name(&self) -> &str {
        &self.tool_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> BTreeMap<String, ParameterSpec> {
        BTreeMap::from([(
            "query".to_string(),
            ParameterSpec::required("string", format!("The request to send to the {} agent", self.agent.name())),
        )])
    }

    async fn execute(&self, ctx: &RunContext, arguments: &str) -> Result<String, ToolError> {
        let query = query_from(arguments)?;
        let child_ctx = ctx.delegate(&self.parent, self.agent.name())?;
        ctx.usage().add_sub_agent_call(self.agent.name());

        let streaming = child_ctx.forwarder().cloned().filter(|_| self.agent.supports_streaming());
        info!(
            parent = %self.parent,
            child = %self.agent.name(),
            depth = child_ctx.depth(),
            streaming = streaming.is_some(),
            "Delegating to sub-agent"
        );

        let result = match streaming {
            Some(forwarder) => self.agent.stream_with_context(&child_ctx, &forwarder, &query).await,
            None => self.agent.run_with_context(&child_ctx, &query).await,
        };
        result.map_err(|e| e.into_tool_error(&self.tool_name))
    }
}

/// Check that the tree rooted at `root` (with the given children) has no
/// name cycle and is at most [`MAX_SUBAGENT_DEPTH`] tall. Returns its height.
pub fn validate_graph(root: &str, sub_agents: &[Agent]) -> Result<usize, DelegationError> {
    let mut path = Vec::new();
    let mut heights = HashMap::new();
    visit(root, sub_agents, &mut path, &mut heights)
}

fn visit(
    name: &str,
    children: &[Agent],
    path: &mut Vec<String>,
    heights: &mut HashMap<String, usize>,
) -> Result<usize, DelegationError> {
    if path.iter().any(|p| p == name) {
        let mut cycle = path.clone();
        cycle.push(name.to_string());
        return Err(DelegationError::Cycle { path: cycle.join(" -> ") });
    }
    if let Some(&height) = heights.get(name) {
        return Ok(height);
    }

    path.push(name.to_string());
    let mut height = 0;
    for child in children {
        let child_height = visit(child.name(), child.sub_agents(), path, heights)?;
        height = height.max(child_height + 1);
    }
    path.pop();

    if height > MAX_SUBAGENT_DEPTH {
        return Err(DelegationError::TooDeep {
            agent: name.to_string(),
            depth: height,
            max: MAX_SUBAGENT_DEPTH,
        });
    }
    debug!(agent = name, height, "Validated sub-agent subtree");
    heights.insert(name.to_string(), height);
    Ok(height)
}

/// Indented outline of an agent and its sub-agents.
pub fn render_tree(agent: &Agent) -> String {
    let mut out = String::new();
    render_node(agent, 0, &mut out);
    out
}

fn render_node(agent: &Agent, level: usize, out: &mut String) {
    let indent = "  ".repeat(level);
    out.push_str(&format!("{indent}- {}", agent.name()));
    if agent.is_remote() {
        out.push_str(" (remote)");
    }
    let tools: Vec<&str> = agent
        .tools()
        .names()
        .into_iter()
        .filter(|t| !agent.sub_agents().iter().any(|s| tool_name_for(s.name()) == *t))
        .collect();
    if !tools.is_empty() {
        out.push_str(&format!(" [tools: {}]", tools.join(", ")));
    }
    out.push('\n');
    for child in agent.sub_agents() {
        render_node(child, level + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::test_helpers::SequentialMockProvider;

    fn leaf(name: &str) -> Agent {
        Agent::builder(name)
            .with_provider(Arc::new(SequentialMockProvider::new(vec![])))
            .build()
            .unwrap()
    }

    fn with_children(name: &str, children: Vec<Agent>) -> Result<Agent, crate::AgentError> {
        let mut builder = Agent::builder(name).with_provider(Arc::new(SequentialMockProvider::new(vec![])));
        for child in children {
            builder = builder.with_sub_agent(child);
        }
        builder.build()
    }

    /// a0 -> a1 -> ... -> a{height}
    fn chain(height: usize) -> Agent {
        let mut agent = leaf(&format!("a{height}"));
        for level in (0..height).rev() {
            agent = with_children(&format!("a{level}"), vec![agent]).unwrap();
        }
        agent
    }

    #[test]
    fn sub_agent_is_exposed_as_tool() {
        let parent = with_children("boss", vec![leaf("research")]).unwrap();
        let tool = parent.tools().get("research_agent").unwrap();
        let params = tool.parameters();
        assert_eq!(params.len(), 1);
        assert!(params["query"].required);
        assert_eq!(params["query"].kind, "string");
    }

    #[test]
    fn accepts_tree_of_max_height() {
        let root = chain(MAX_SUBAGENT_DEPTH);
        assert_eq!(validate_graph(root.name(), root.sub_agents()).unwrap(), MAX_SUBAGENT_DEPTH);
    }

    #[test]
    fn rejects_tree_too_deep() {
        let top = chain(MAX_SUBAGENT_DEPTH);
        let err = with_children("over", vec![top]).unwrap_err();
        assert!(matches!(
            err,
            crate::AgentError::Delegation(DelegationError::TooDeep { depth: 6, max: 5, .. })
        ));
    }

    #[test]
    fn rejects_name_cycle() {
        // "writer" -> "editor" -> "writer" (a different agent with the same name)
        let editor = with_children("editor", vec![leaf("writer")]).unwrap();
        let err = with_children("writer", vec![editor]).unwrap_err();
        match err {
            crate::AgentError::Delegation(DelegationError::Cycle { path }) => {
                assert_eq!(path, "writer -> editor -> writer");
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn shared_subtrees_are_fine() {
        let shared = leaf("shared");
        let left = with_children("left", vec![shared.clone()]).unwrap();
        let right = with_children("right", vec![shared]).unwrap();
        let root = with_children("root", vec![left, right]).unwrap();
        assert_eq!(validate_graph(root.name(), root.sub_agents()).unwrap(), 2);
    }

    #[test]
    fn query_argument_forms() {
        assert_eq!(query_from(r#"{"query": "find it"}"#).unwrap(), "find it");
        assert_eq!(query_from("find it").unwrap(), "find it");
        assert!(query_from("{}").is_err());
        assert!(query_from("  ").is_err());
    }

    #[tokio::test]
    async fn runtime_guard_rejects_deep_delegation() {
        let tool = SubAgentTool::new("parent", leaf("child"));
        let mut ctx = RunContext::new();
        for i in 0..agentflow_core::MAX_DELEGATION_DEPTH {
            ctx = ctx.delegate(&format!("n{i}"), &format!("n{}", i + 1)).unwrap();
        }
        let err = tool.execute(&ctx, r#"{"query": "hi"}"#).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, ToolError::DelegationLimit { depth: 6, .. }));
        assert!(ctx.usage().snapshot().sub_agents_used.is_empty());
    }

    #[test]
    fn tree_rendering() {
        let root = with_children("root", vec![with_children("mid", vec![leaf("leaf")]).unwrap()]).unwrap();
        let tree = render_tree(&root);
        assert_eq!(tree, "- root\n  - mid\n    - leaf\n");
    }
}
