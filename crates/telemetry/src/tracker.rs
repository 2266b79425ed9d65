//! Thread-safe usage tracker: aggregates token counts, tool invocations
//! and sub-agent delegations for one top-level run.

use crate::model::{TokenCounts, UsageSnapshot};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Per-run usage accumulator.
///
/// Every mutation goes through a single `Mutex`, so nested calls running on
/// other tasks can record into the same tracker. A disabled tracker accepts
/// all calls and records nothing.
pub struct UsageTracker {
    /// Whether detailed tracking is on.
    enabled: bool,
    /// Identifier of the run.
    run_id: String,
    /// Wall-clock start.
    started_at: DateTime<Utc>,
    /// Monotonic start, for execution time.
    clock: Instant,
    /// Mutable totals.
    state: Mutex<UsageState>,
}

#[derive(Debug, Default)]
struct UsageState {
    tokens: TokenCounts,
    llm_calls: u64,
    tool_invocations: u64,
    models: BTreeSet<String>,
    tools_used: BTreeSet<String>,
    sub_agents_used: BTreeSet<String>,
    /// Set by `finish()`; `None` while the run is in flight.
    execution_time: Option<Duration>,
}

impl UsageTracker {
    /// Create an enabled tracker.
    pub fn new() -> Self {
        Self::with_enabled(true)
    }

    /// Create an inert tracker.
    pub fn disabled() -> Self {
        Self::with_enabled(false)
    }

    /// Create a tracker, enabled or not.
    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            enabled,
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            clock: Instant::now(),
            state: Mutex::new(UsageState::default()),
        }
    }

    /// Whether this tracker records anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn lock(&self) -> MutexGuard<'_, UsageState> {
        // A panic while holding the lock leaves plain counters behind; keep going.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one LLM call and its token counts.
    pub fn record_llm_call(&self, model: &str, tokens: TokenCounts) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        state.llm_calls += 1;
        state.tokens += tokens;
        if !model.is_empty() {
            state.models.insert(model.to_string());
        }
        debug!(
            run_id = %self.run_id,
            model = model,
            input = tokens.input,
            output = tokens.output,
            "Tracked LLM call"
        );
    }

    /// Record a tool invocation. Names are deduplicated.
    pub fn add_tool_call(&self, name: &str) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        state.tool_invocations += 1;
        state.tools_used.insert(name.to_string());
    }

    /// Record a delegation to a sub-agent. Names are deduplicated.
    pub fn add_sub_agent_call(&self, name: &str) {
        if !self.enabled {
            return;
        }
        self.lock().sub_agents_used.insert(name.to_string());
    }

    /// Freeze the execution time. Later calls overwrite it.
    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.lock().execution_time = Some(self.clock.elapsed());
    }

    /// Aggregated token counts so far.
    pub fn tokens(&self) -> TokenCounts {
        self.lock().tokens
    }

    /// Copy the current state out.
    pub fn snapshot(&self) -> UsageSnapshot {
        let state = self.lock();
        let elapsed = state.execution_time.unwrap_or_else(|| self.clock.elapsed());
        UsageSnapshot {
            run_id: self.run_id.clone(),
            enabled: self.enabled,
            started_at: self.started_at,
            execution_time_ms: if self.enabled {
                elapsed.as_millis() as u64
            } else {
                0
            },
            tokens: state.tokens,
            llm_calls: state.llm_calls,
            tool_invocations: state.tool_invocations,
            models: state.models.iter().cloned().collect(),
            tools_used: state.tools_used.iter().cloned().collect(),
            sub_agents_used: state.sub_agents_used.iter().cloned().collect(),
        }
    }
}

impl Default for UsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageTracker")
            .field("enabled", &self.enabled)
            .field("run_id", &self.run_id)
            .finish()
    }
}
