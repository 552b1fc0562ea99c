//! Reasoning service used by the decision engine

use std::sync::Arc;
use async_trait::async_trait;

use ivr_agent_config::ReasoningConfig;
use ivr_agent_core::{CallSummaryContext, Decision, DecisionContext};

use crate::backend::{LlmBackend, OpenAiCompatibleBackend};
use crate::parse::parse_decision;
use crate::prompt::PromptBuilder;
use crate::LlmError;

/// External reasoning for navigation decisions
///
/// Callers bound every request with their own timeout.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Decide how to respond to a detected menu
    async fn request_decision(&self, context: &DecisionContext) -> Result<Decision, LlmError>;

    /// Summarize a finished call
    async fn summarize_call(&self, context: &CallSummaryContext) -> Result<String, LlmError>;
}

/// Reasoning service backed by a chat model
pub struct LlmReasoner {
    backend: Arc<dyn LlmBackend>,
}

impl LlmReasoner {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self { backend }
    }

    /// Build the configured reasoning service, or a disabled one when unusable
    pub fn from_config(config: &ReasoningConfig) -> Arc<dyn ReasoningService> {
        if !config.enabled {
            tracing::info!("Reasoning service disabled; using heuristic decisions");
            return Arc::new(DisabledReasoner::new("disabled by configuration"));
        }

        match OpenAiCompatibleBackend::from_config(config) {
            Ok(backend) => {
                tracing::info!(model = %config.model, "Reasoning service configured");
                Arc::new(Self::new(Arc::new(backend)))
            }
            Err(e) => {
                tracing::warn!("Reasoning service unavailable: {}", e);
                Arc::new(DisabledReasoner::new(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl ReasoningService for LlmReasoner {
    async fn request_decision(&self, context: &DecisionContext) -> Result<Decision, LlmError> {
        let messages = PromptBuilder::decision(context);
        let raw = self.backend.generate(&messages).await?;

        tracing::debug!(
            call_id = %context.call_id,
            model = self.backend.model_name(),
            "Reasoning response: {}",
            raw
        );

        parse_decision(&raw, context)
    }

    async fn summarize_call(&self, context: &CallSummaryContext) -> Result<String, LlmError> {
        let messages = PromptBuilder::summary(context);
        let summary = self.backend.generate(&messages).await?;
        Ok(summary.trim().to_string())
    }
}

/// Reasoning service that always fails, forcing the heuristic path
pub struct DisabledReasoner {
    reason: String,
}

impl DisabledReasoner {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ReasoningService for DisabledReasoner {
    async fn request_decision(&self, _context: &DecisionContext) -> Result<Decision, LlmError> {
        Err(LlmError::Unavailable(self.reason.clone()))
    }

    async fn summarize_call(&self, _context: &CallSummaryContext) -> Result<String, LlmError> {
        Err(LlmError::Unavailable(self.reason.clone()))
    }
}
