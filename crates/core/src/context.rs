//! Per-run execution context.
//!
//! A [`RunContext`] is created once per top-level request and handed to
//! every provider call and tool execution beneath it. It carries the usage
//! tracker, the optional stream forwarder, the delegation chain and the
//! cancellation signal.

use std::sync::Arc;
use agentflow_telemetry::UsageTracker;
use tokio_util::sync::CancellationToken;
use crate::error::ToolError;
use crate::stream::StreamForwarder;

/// Maximum number of nested delegations allowed at call time.
pub const MAX_DELEGATION_DEPTH: usize = 5;

/// One parent → child hop in the delegation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub parent: String,
    pub child: String,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    usage: Arc<UsageTracker>,
    forwarder: Option<StreamForwarder>,
    delegation: Vec<Delegation>,
    cancel: CancellationToken,
}

impl RunContext {
    /// A fresh context with an enabled tracker and no forwarder.
    pub fn new() -> Self {
        Self {
            usage: Arc::new(UsageTracker::new()),
            forwarder: None,
            delegation: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_usage(mut self, usage: Arc<UsageTracker>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_forwarder(mut self, forwarder: StreamForwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn without_forwarder(mut self) -> Self {
        self.forwarder = None;
        self
    }

    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    pub fn forwarder(&self) -> Option<&StreamForwarder> {
        self.forwarder.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of delegations between the top-level agent and here.
    pub fn depth(&self) -> usize {
        self.delegation.len()
    }

    pub fn delegation_chain(&self) -> &[Delegation] {
        &self.delegation
    }

    /// Child context for a `parent` → `child` delegation.
    ///
    /// The tracker, forwarder and cancellation signal are shared with the
    /// parent. Fails once the chain would exceed [`MAX_DELEGATION_DEPTH`].
    pub fn delegate(&self, parent: &str, child: &str) -> Result<RunContext, ToolError> {
        let depth = self.delegation.len() + 1;
        if depth > MAX_DELEGATION_DEPTH {
            let mut chain: Vec<&str> = Vec::with_capacity(depth + 1);
            if let Some(first) = self.delegation.first() {
                chain.push(&first.parent);
            }
            chain.extend(self.delegation.iter().map(|d| d.child.as_str()));
            if chain.is_empty() {
                chain.push(parent);
            }
            chain.push(child);
            return Err(ToolError::DelegationLimit {
                depth,
                max: MAX_DELEGATION_DEPTH,
                chain: chain.join(" -> "),
            });
        }

        let mut delegation = self.delegation.clone();
        delegation.push(Delegation {
            parent: parent.to_string(),
            child: child.to_string(),
        });
        Ok(RunContext {
            usage: self.usage.clone(),
            forwarder: self.forwarder.clone(),
            delegation,
            cancel: self.cancel.clone(),
        })
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
