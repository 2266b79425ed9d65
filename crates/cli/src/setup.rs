//! Turning configuration into a running agent tree.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use agentflow_agent::Agent;
use agentflow_config::{AgentConfig, AppConfig};
use agentflow_core::guardrail::{BlocklistGuardrail, Guardrail};
use agentflow_core::provider::Provider;
use agentflow_core::tool::ToolRegistry;
use agentflow_memory::InMemoryConversation;
use agentflow_providers::ReplayProvider;
use tracing::{debug, info};

type SetupResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Load `path`, or the default location when none is given, with
/// environment overrides applied.
pub fn load_config(path: Option<&Path>) -> SetupResult<AppConfig> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

/// The provider behind every agent in the tree.
pub fn provider(replay: Option<&Path>, stream: bool) -> SetupResult<Arc<dyn Provider>> {
    let Some(path) = replay else {
        return Err("No provider configured. Pass --replay <script.json> to run against a scripted model.".into());
    };
    let provider = ReplayProvider::from_file(path)?.with_streaming(stream);
    info!(script = %path.display(), "Using replay provider");
    Ok(Arc::new(provider))
}

/// Build the agent named `name` (or the configured root) and everything
/// beneath it.
pub fn build_agent(
    config: &AppConfig,
    name: Option<&str>,
    provider: Arc<dyn Provider>,
    tools: &ToolRegistry,
) -> SetupResult<Agent> {
    let root = match name {
        Some(name) => config.agent(name).ok_or_else(|| format!("Agent '{name}' is not defined"))?,
        None => config.root().ok_or("No agents are defined in the configuration")?,
    };
    let mut builder = TreeBuilder {
        config,
        provider,
        tools,
        built: HashMap::new(),
        path: Vec::new(),
    };
    builder.build(root)
}

struct TreeBuilder<'a> {
    config: &'a AppConfig,
    provider: Arc<dyn Provider>,
    tools: &'a ToolRegistry,
    built: HashMap<String, Agent>,
    path: Vec<String>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, spec: &AgentConfig) -> SetupResult<Agent> {
        if self.path.contains(&spec.name) {
            let mut cycle = self.path.clone();
            cycle.push(spec.name.clone());
            return Err(format!("Cycle in agent configuration: {}", cycle.join(" -> ")).into());
        }
        if let Some(agent) = self.built.get(&spec.name) {
            return Ok(agent.clone());
        }

        self.path.push(spec.name.clone());
        let mut children = Vec::with_capacity(spec.sub_agents.len());
        for sub in &spec.sub_agents {
            let sub_spec = self
                .config
                .agent(sub)
                .ok_or_else(|| format!("Agent '{}' references unknown sub-agent '{sub}'", spec.name))?;
            children.push(self.build(sub_spec)?);
        }
        self.path.pop();

        let engine = &self.config.engine;
        let memory = InMemoryConversation::new().with_max_messages(self.config.memory.max_messages);
        let mut builder = Agent::builder(&spec.name)
            .with_description(&spec.description)
            .with_system_prompt(&spec.system_prompt)
            .with_provider(self.provider.clone())
            .with_engine_config(engine)
            .with_memory(Arc::new(memory));

        if let Some(model) = &spec.model {
            builder = builder.with_model(model);
        }
        if let Some(max) = spec.max_iterations {
            builder = builder.with_max_iterations(max);
        }
        if let Some(required) = spec.require_plan_approval {
            builder = builder.with_plan_approval(required);
        }
        for tool_name in &spec.tools {
            let tool = self
                .tools
                .get(tool_name)
                .ok_or_else(|| format!("Agent '{}' uses unknown tool '{tool_name}'", spec.name))?;
            builder = builder.with_tool(tool);
        }
        if !self.config.guardrails.blocked_phrases.is_empty() {
            let guardrail = BlocklistGuardrail::new("blocklist", self.config.guardrails.blocked_phrases.iter().cloned());
            builder = builder.with_guardrail(Arc::new(guardrail) as Arc<dyn Guardrail>);
        }
        for child in children {
            builder = builder.with_sub_agent(child);
        }

        let agent = builder.build()?;
        debug!(agent = %spec.name, "Built agent from configuration");
        self.built.insert(spec.name.clone(), agent.clone());
        Ok(agent)
    }
}
