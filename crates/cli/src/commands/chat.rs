//! `agentflow chat`: an interactive session with one agent.
//!
//! Memory and plans live as long as the session, so a plan proposed in one
//! line can be approved in the next.

use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use super::SessionArgs;
use super::run::{open, respond};

pub async fn run(args: SessionArgs) -> Result<(), Box<dyn std::error::Error>> {
    let agent = open(&args)?;

    println!();
    println!("  AgentFlow interactive session");
    println!();
    println!("  Agent:     {}", agent.name());
    println!("  Model:     {}", agent.model());
    println!("  Tools:     {}", agent.tools().names().join(", "));
    println!("  Streaming: {}", if args.streaming() { "on" } else { "off" });
    println!();
    println!("  Type your message and press Enter. Type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        if let Err(e) = respond(&agent, line, &args).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    agent.close().await?;
    println!();
    println!("  Goodbye!");
    Ok(())
}
