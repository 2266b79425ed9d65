//! Agent-level streaming events.
//!
//! Provider chunks are translated into [`StreamEvent`]s, which the caller of
//! a streamed run receives over a bounded channel. Nested sub-agent runs push
//! their events into the same channel through a [`StreamForwarder`].

use agentflow_telemetry::TokenCounts;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One event in a streamed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,

    /// Name of the agent that produced it. Nested sub-agents report their
    /// own name, so one stream can carry several.
    pub agent: String,

    #[serde(flatten)]
    pub kind: StreamEventKind,
}

/// The event payload.
///
/// Wire names follow the usual stream protocol:
/// - `content_delta`: partial text from the model
/// - `thinking`: partial reasoning from the model
/// - `tool_call`: the model asked for a tool (status `received`)
/// - `tool_result`: the tool finished (status `completed` or `failed`)
/// - `error`: the run failed mid-stream
/// - `complete`: the run finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEventKind {
    ContentDelta { content: String },
    Thinking { content: String },
    ToolCall(ToolEvent),
    ToolResult(ToolEvent),
    Error { message: String },
    Complete {
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenCounts>,
    },
}

/// Tool-call identity carried by `tool_call` and `tool_result` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub status: ToolCallStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Received,
    Completed,
    Failed,
}

impl StreamEvent {
    pub fn new(agent: impl Into<String>, kind: StreamEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            agent: agent.into(),
            kind,
        }
    }

    pub fn content(agent: &str, content: impl Into<String>) -> Self {
        Self::new(agent, StreamEventKind::ContentDelta { content: content.into() })
    }

    pub fn thinking(agent: &str, content: impl Into<String>) -> Self {
        Self::new(agent, StreamEventKind::Thinking { content: content.into() })
    }

    /// A tool call as first seen in the model's output.
    pub fn tool_call(agent: &str, id: &str, name: &str, arguments: &str) -> Self {
        Self::new(
            agent,
            StreamEventKind::ToolCall(ToolEvent {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
                result: None,
                status: ToolCallStatus::Received,
            }),
        )
    }

    /// The outcome of a tool call.
    pub fn tool_result(agent: &str, id: &str, name: &str, arguments: &str, result: impl Into<String>, ok: bool) -> Self {
        Self::new(
            agent,
            StreamEventKind::ToolResult(ToolEvent {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
                result: Some(result.into()),
                status: if ok { ToolCallStatus::Completed } else { ToolCallStatus::Failed },
            }),
        )
    }

    pub fn error(agent: &str, message: impl Into<String>) -> Self {
        Self::new(agent, StreamEventKind::Error { message: message.into() })
    }

    pub fn complete(agent: &str, content: impl Into<String>, usage: Option<TokenCounts>) -> Self {
        Self::new(agent, StreamEventKind::Complete { content: content.into(), usage })
    }

    /// Wire name of this event's type.
    pub fn event_type(&self) -> &'static str {
        match &self.kind {
            StreamEventKind::ContentDelta { .. } => "content_delta",
            StreamEventKind::Thinking { .. } => "thinking",
            StreamEventKind::ToolCall(_) => "tool_call",
            StreamEventKind::ToolResult(_) => "tool_result",
            StreamEventKind::Error { .. } => "error",
            StreamEventKind::Complete { .. } => "complete",
        }
    }

    /// Whether this event ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StreamEventKind::Error { .. } | StreamEventKind::Complete { .. })
    }
}

/// Sending half of a streamed run, threaded through the run context so
/// nested agents can write into their caller's stream.
#[derive(Debug, Clone)]
pub struct StreamForwarder {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamForwarder {
    pub fn new(tx: mpsc::Sender<StreamEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Send an event, waiting for channel capacity.
    ///
    /// Returns `false` when the run was cancelled or the receiver is gone;
    /// the producer should stop in either case.
    pub async fn send(&self, event: StreamEvent) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    /// Whether the consumer dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_content() {
        let event = StreamEvent::content("root", "Hello");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"content_delta""#));
        assert!(json.contains(r#""content":"Hello""#));
        assert!(json.contains(r#""agent":"root""#));
    }

    #[test]
    fn tool_events_carry_status() {
        let call = StreamEvent::tool_call("root", "call_1", "calculator", r#"{"expression":"2+2"}"#);
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains(r#""type":"tool_call""#));
        assert!(json.contains(r#""status":"received""#));
        assert!(!json.contains("result"));

        let done = StreamEvent::tool_result("root", "call_1", "calculator", "{}", "4", true);
        let StreamEventKind::ToolResult(ev) = &done.kind else { panic!("expected tool result") };
        assert_eq!(ev.status, ToolCallStatus::Completed);
        assert_eq!(ev.result.as_deref(), Some("4"));

        let failed = StreamEvent::tool_result("root", "call_2", "calculator", "{}", "boom", false);
        let StreamEventKind::ToolResult(ev) = &failed.kind else { panic!("expected tool result") };
        assert_eq!(ev.status, ToolCallStatus::Failed);
    }

    #[test]
    fn event_roundtrips_through_json() {
        let event = StreamEvent::complete("root", "done", Some(TokenCounts::new(1, 2, 3)));
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(back.is_terminal());
    }

    #[test]
    fn event_type_names() {
        assert_eq!(StreamEvent::content("a", "x").event_type(), "content_delta");
        assert_eq!(StreamEvent::thinking("a", "x").event_type(), "thinking");
        assert_eq!(StreamEvent::error("a", "x").event_type(), "error");
        assert_eq!(StreamEvent::complete("a", "x", None).event_type(), "complete");
    }

    #[tokio::test]
    async fn forwarder_delivers_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let fwd = StreamForwarder::new(tx, CancellationToken::new());
        assert!(fwd.send(StreamEvent::content("a", "1")).await);
        assert!(fwd.send(StreamEvent::content("a", "2")).await);
        assert_eq!(rx.recv().await.unwrap().kind, StreamEventKind::ContentDelta { content: "1".into() });
        assert_eq!(rx.recv().await.unwrap().kind, StreamEventKind::ContentDelta { content: "2".into() });
    }

    #[tokio::test]
    async fn forwarder_send_gives_up_on_cancel() {
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let fwd = StreamForwarder::new(tx, cancel.clone());
        assert!(fwd.send(StreamEvent::content("a", "fills the buffer")).await);

        // Buffer is full and nobody drains it; cancellation must unblock the send.
        let blocked = tokio::spawn({
            let fwd = fwd.clone();
            async move { fwd.send(StreamEvent::content("a", "stuck")).await }
        });
        cancel.cancel();
        assert!(!blocked.await.unwrap());
    }

    #[tokio::test]
    async fn forwarder_reports_dropped_receiver() {
        let (tx, rx) = mpsc::channel(1);
        let fwd = StreamForwarder::new(tx, CancellationToken::new());
        drop(rx);
        assert!(fwd.is_closed());
        assert!(!fwd.send(StreamEvent::content("a", "x")).await);
    }
}
