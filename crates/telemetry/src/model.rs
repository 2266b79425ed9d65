//! Data model for token counts and usage snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Tokens ────────────────────────────────────────────────────────────────

/// Token counts reported for one or more LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCounts {
    /// Prompt / input tokens.
    pub input: u64,
    /// Completion / output tokens.
    pub output: u64,
    /// Total tokens as reported by the provider.
    pub total: u64,
    /// Reasoning ("thinking") tokens, when the provider reports them.
    #[serde(default)]
    pub reasoning: u64,
}

impl TokenCounts {
    /// Create token counts. `total` is taken as reported; pass `0` to derive
    /// it from `input + output`.
    pub fn new(input: u64, output: u64, total: u64) -> Self {
        let total = if total == 0 { input + output } else { total };
        Self {
            input,
            output,
            total,
            reasoning: 0,
        }
    }

    /// Attach a reasoning token count.
    pub fn with_reasoning(mut self, reasoning: u64) -> Self {
        self.reasoning = reasoning;
        self
    }

    /// True when nothing has been counted.
    pub fn is_empty(&self) -> bool {
        self.input == 0 && self.output == 0 && self.total == 0 && self.reasoning == 0
    }
}

impl std::ops::AddAssign for TokenCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.input += rhs.input;
        self.output += rhs.output;
        self.total += rhs.total;
        self.reasoning += rhs.reasoning;
    }
}

// ── Snapshot ──────────────────────────────────────────────────────────────

/// A point-in-time copy of a tracker's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Identifier of the top-level run this snapshot belongs to.
    pub run_id: String,
    /// Whether detailed tracking was enabled for the run.
    pub enabled: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock execution time in milliseconds.
    pub execution_time_ms: u64,
    /// Aggregated token counts.
    pub tokens: TokenCounts,
    /// Number of tracked LLM calls.
    pub llm_calls: u64,
    /// Number of tool invocations (not deduplicated).
    pub tool_invocations: u64,
    /// Models that served at least one call, sorted.
    pub models: Vec<String>,
    /// Distinct tool names invoked, sorted.
    pub tools_used: Vec<String>,
    /// Distinct sub-agent names delegated to, sorted.
    pub sub_agents_used: Vec<String>,
}

impl UsageSnapshot {
    /// True when a tool with this name was used during the run.
    pub fn used_tool(&self, name: &str) -> bool {
        self.tools_used.iter().any(|t| t == name)
    }

    /// True when the named sub-agent was delegated to during the run.
    pub fn used_sub_agent(&self, name: &str) -> bool {
        self.sub_agents_used.iter().any(|a| a == name)
    }
}
