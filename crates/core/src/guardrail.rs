//! Guardrails: checks applied to a request before processing and to the
//! final response before it is returned.

use async_trait::async_trait;
use tracing::warn;
use crate::error::GuardrailError;

/// Where in the run a guardrail is being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    Input,
    Output,
}

impl std::fmt::Display for GuardStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &str;

    /// Return `Err(GuardrailError::Violation)` to block `text`.
    async fn check(&self, stage: GuardStage, text: &str) -> Result<(), GuardrailError>;
}

/// Blocks text containing any of a list of phrases (case-insensitive).
pub struct BlocklistGuardrail {
    name: String,
    phrases: Vec<String>,
    stages: Vec<GuardStage>,
}

impl BlocklistGuardrail {
    /// A blocklist applied at both stages.
    pub fn new(name: impl Into<String>, phrases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            phrases: phrases
                .into_iter()
                .map(|p| p.into().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            stages: vec![GuardStage::Input, GuardStage::Output],
        }
    }

    /// Restrict the guardrail to one stage.
    pub fn only(mut self, stage: GuardStage) -> Self {
        self.stages = vec![stage];
        self
    }
}

#[async_trait]
impl Guardrail for BlocklistGuardrail {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, stage: GuardStage, text: &str) -> Result<(), GuardrailError> {
        if !self.stages.contains(&stage) {
            return Ok(());
        }
        let lowered = text.to_lowercase();
        if let Some(phrase) = self.phrases.iter().find(|p| lowered.contains(p.as_str())) {
            warn!(guardrail = %self.name, stage = %stage, "Blocked by guardrail");
            return Err(GuardrailError::Violation {
                guardrail: self.name.clone(),
                reason: format!("{stage} contains blocked phrase '{phrase}'"),
            });
        }
        Ok(())
    }
}
