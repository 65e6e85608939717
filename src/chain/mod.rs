//! Prompt chain configuration and execution.
//!
//! # Overview
//!
//! - **[`PromptStage`] / [`ChainConfig`]**: an ordered list of named stages
//!   sharing one [`TokenBudget`](crate::budget::TokenBudget) and one
//!   rendering context
//! - **template**: `{placeholder}` rendering with literal fallback for
//!   unknown keys
//! - **[`PromptChainOrchestrator`]**: drives each stage through the token
//!   optimizer and the external caller, propagates stage outputs into the
//!   context, and assembles the final [`ChainResult`]

mod orchestrator;
mod stage;
pub mod template;

pub use orchestrator::{
    LlmCaller, PromptChainOrchestrator, StubLlmCaller, DEFAULT_CALL_TIMEOUT,
};
pub use stage::{ChainConfig, ChainResult, PromptStage, StageResult, StageTransform};
pub use template::TemplateError;
