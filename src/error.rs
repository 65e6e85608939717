//! Error types for chain configuration and execution.
//!
//! Hard failures out of [`PromptChainOrchestrator::run`] are limited to two
//! cases: a configuration that is rejected before anything executes, and a
//! required stage whose call failed. Every other failure mode is recorded
//! on the individual [`StageResult`](crate::chain::StageResult) instead.
//!
//! [`PromptChainOrchestrator::run`]: crate::chain::PromptChainOrchestrator::run

use thiserror::Error;

use crate::chain::ChainResult;

/// Failure reported by an external text-generation caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LlmError {
    message: String,
}

impl LlmError {
    /// Create a caller failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The underlying failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced by [`PromptChainOrchestrator::run`].
///
/// [`PromptChainOrchestrator::run`]: crate::chain::PromptChainOrchestrator::run
#[derive(Debug, Error)]
pub enum ChainError {
    /// The chain configuration is invalid. Nothing was executed and no run
    /// was started.
    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),

    /// A required stage failed and the chain was aborted after recording
    /// it. The partial result carries every stage attempted up to and
    /// including the failed one.
    #[error("required stage '{stage}' failed: {message}")]
    RequiredStageFailed {
        stage: String,
        message: String,
        result: Box<ChainResult>,
    },
}
