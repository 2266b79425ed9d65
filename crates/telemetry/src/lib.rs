//! Usage tracking for AgentFlow runs.
//!
//! One [`UsageTracker`] is created per top-level run and shared (behind an
//! `Arc`) with every nested call of that run, so a single tracker ends up
//! aggregating token counts, tool invocations and sub-agent delegations for
//! the entire delegation tree.

pub mod model;
pub mod tracker;

pub use model::{TokenCounts, UsageSnapshot};
pub use tracker::UsageTracker;
