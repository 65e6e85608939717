//! Multi-stage prompt chain orchestration with token budgeting and
//! pipeline metrics.
//!
//! A *chain* is an ordered sequence of named stages. Each stage renders a
//! `{placeholder}` template against a context map, runs the result through
//! the token optimizer (which truncates oversized prompts and tracks
//! usage/cost), invokes an external text-generation caller, and merges its
//! output back into the context for later stages. Timing and outcome for
//! every stage, and for the run as a whole, are recorded by the metrics
//! collector and emitted as structured log events.
//!
//! # Example
//!
//! ```ignore
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use promptchain::{
//!     ChainConfig, MetricsCollector, PromptChainOrchestrator, PromptStage,
//!     StubLlmCaller, TokenBudget,
//! };
//!
//! let orchestrator =
//!     PromptChainOrchestrator::new(Arc::new(StubLlmCaller), MetricsCollector::new());
//!
//! let config = ChainConfig::new("grow_subscribers")
//!     .with_stage(PromptStage::new("trend", "Analyze trends in {dataset}"))
//!     .with_stage(PromptStage::new("ranking", "Rank findings: {trend_result}").optional())
//!     .with_budget(TokenBudget::new("gpt-4o-mini").with_max_cost(0.10));
//!
//! let mut context = HashMap::new();
//! context.insert("dataset".to_string(), "…serialized records…".to_string());
//!
//! let result = orchestrator.run(config, context).await?;
//! println!("total cost: ${:.6}", result.token_summary.total_cost_usd());
//! ```

pub mod budget;
pub mod chain;
pub mod error;
pub mod logging;
pub mod metrics;

pub use budget::{
    estimate_cost, estimate_tokens, model_context_limit, ModelRates, PipelineTokenSummary,
    TokenBudget, TokenOptimizer, TokenUsageRecord,
};
pub use chain::{
    ChainConfig, ChainResult, LlmCaller, PromptChainOrchestrator, PromptStage, StageResult,
    StubLlmCaller, TemplateError,
};
pub use error::{ChainError, LlmError};
pub use metrics::{MetricsCollector, PipelineRunMetric, StageMetric, StageTimer};
