//! `agentflow run`: send one message and print the response.

use agentflow_agent::Agent;
use tracing::debug;
use super::SessionArgs;
use crate::{render, setup};

pub async fn run(message: String, args: SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let agent = open(&args)?;
    let result = respond(&agent, &message, &args).await;
    agent.close().await?;
    result
}

/// Load configuration and build the agent a session talks to.
pub(crate) fn open(args: &SessionArgs) -> Result<Agent, Box<dyn std::error::Error>> {
    let config = setup::load_config(args.config.as_deref())?;
    let provider = setup::provider(args.replay.as_deref(), args.streaming())?;
    let tools = agentflow_tools::default_registry();
    let agent = setup::build_agent(&config, args.agent.as_deref(), provider, &tools)?;
    debug!(agent = %agent.name(), tools = agent.tools().len(), "Session ready");
    Ok(agent)
}

/// Answer one message, streaming or not.
pub(crate) async fn respond(
    agent: &Agent,
    message: &str,
    args: &SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if args.streaming() {
        let rx = agent.run_stream(message).await?;
        let response = render::print_stream(rx, agent.name(), args.json).await?;
        if response.is_none() {
            return Err("The run ended without a response".into());
        }
        return Ok(());
    }

    let outcome = agent.run_detailed(message).await?;
    println!("{}", outcome.response);
    if args.usage {
        eprintln!("  {}", render::usage_summary(&outcome.usage));
    }
    Ok(())
}
