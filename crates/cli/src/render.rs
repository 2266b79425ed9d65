//! Printing agent output to the terminal.

use std::io::Write;
use agentflow_core::stream::{StreamEvent, StreamEventKind, ToolCallStatus};
use agentflow_telemetry::UsageSnapshot;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

/// Drain a stream of events, printing content to stdout and everything else
/// to stderr. With `json`, every event is printed as one JSON line instead.
///
/// Returns the final response, if the stream completed.
pub async fn print_stream(
    rx: mpsc::Receiver<StreamEvent>,
    root: &str,
    json: bool,
) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut events = ReceiverStream::new(rx);
    let mut stdout = std::io::stdout();
    let mut speaker: Option<String> = None;
    let mut response = None;

    while let Some(event) = events.next().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
            if let StreamEventKind::Complete { content, .. } = &event.kind {
                if event.agent == root {
                    response = Some(content.clone());
                }
            }
            continue;
        }

        match &event.kind {
            StreamEventKind::ContentDelta { content } => {
                if speaker.as_deref() != Some(event.agent.as_str()) {
                    if speaker.is_some() {
                        println!();
                    }
                    if event.agent != root {
                        print!("[{}] ", event.agent);
                    }
                    speaker = Some(event.agent.clone());
                }
                print!("{content}");
                stdout.flush()?;
            }
            StreamEventKind::Thinking { content } => {
                eprintln!("  ({} is thinking) {content}", event.agent);
            }
            StreamEventKind::ToolCall(tool) => {
                eprintln!("  -> {} {}({})", event.agent, tool.name, tool.arguments);
            }
            StreamEventKind::ToolResult(tool) => {
                let mark = match tool.status {
                    ToolCallStatus::Failed => "failed",
                    _ => "ok",
                };
                eprintln!(
                    "  <- {} [{mark}] {}",
                    tool.name,
                    tool.result.as_deref().unwrap_or_default()
                );
            }
            StreamEventKind::Error { message } => {
                eprintln!();
                eprintln!("  [Error from {}] {message}", event.agent);
            }
            StreamEventKind::Complete { content, usage } => {
                if event.agent == root {
                    println!();
                    if let Some(usage) = usage {
                        eprintln!(
                            "  tokens: {} in / {} out / {} total",
                            usage.input, usage.output, usage.total
                        );
                    }
                    response = Some(content.clone());
                } else {
                    speaker = None;
                    println!();
                }
            }
        }
    }

    Ok(response)
}

/// A one-paragraph usage summary for stderr.
pub fn usage_summary(usage: &UsageSnapshot) -> String {
    let mut out = format!(
        "run {}: {} ms, {} LLM calls, {} tokens ({} in / {} out)",
        usage.run_id,
        usage.execution_time_ms,
        usage.llm_calls,
        usage.tokens.total,
        usage.tokens.input,
        usage.tokens.output
    );
    if !usage.tools_used.is_empty() {
        out.push_str(&format!(", tools: {}", usage.tools_used.join(", ")));
    }
    if !usage.sub_agents_used.is_empty() {
        out.push_str(&format!(", sub-agents: {}", usage.sub_agents_used.join(", ")));
    }
    out
}
