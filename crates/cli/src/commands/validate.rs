//! `agentflow validate`: check a configuration and print its agent tree.

use std::path::Path;
use std::sync::Arc;
use agentflow_agent::render_tree;
use agentflow_providers::ReplayProvider;
use crate::setup;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");
    let config = match setup::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e);
        }
    };
    println!("   Config parsed successfully");

    // Nothing is sent to a model while validating, so an empty script will do.
    let provider = Arc::new(ReplayProvider::new(Vec::new()));
    let tools = agentflow_tools::default_registry();
    let root = match setup::build_agent(&config, None, provider, &tools) {
        Ok(root) => root,
        Err(e) => {
            println!("   Agent tree error: {e}");
            return Err(e);
        }
    };

    let unreachable: Vec<&str> = config
        .agents
        .iter()
        .map(|a| a.name.as_str())
        .filter(|name| !reachable(&root, name))
        .collect();

    println!("   Agent tree is valid");
    println!();
    println!("   Model:            {}", config.engine.model);
    println!("   Max iterations:   {}", config.engine.max_iterations);
    println!("   Plan approval:    {}", config.engine.require_plan_approval);
    println!();
    for line in render_tree(&root).lines() {
        println!("   {line}");
    }
    if !unreachable.is_empty() {
        println!();
        println!("   Not reachable from '{}': {}", root.name(), unreachable.join(", "));
    }
    Ok(())
}

fn reachable(agent: &agentflow_agent::Agent, name: &str) -> bool {
    agent.name() == name || agent.sub_agents().iter().any(|sub| reachable(sub, name))
}
