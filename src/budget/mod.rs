//! Token budget management for prompt chains.
//!
//! Exact token counts are unavailable without a provider round-trip, so
//! this module estimates them from character counts and converts them to
//! USD via a per-model rate table.
//!
//! # Overview
//!
//! - **estimator**: pure token-count and cost estimation functions
//! - **[`TokenBudget`]**: per-chain ceilings (input/output tokens, cost)
//! - **[`TokenOptimizer`]**: truncates oversized prompts and accumulates a
//!   [`PipelineTokenSummary`] of per-stage usage records
//!
//! # Example
//!
//! ```ignore
//! use promptchain::budget::{TokenBudget, TokenOptimizer};
//!
//! let budget = TokenBudget::new("gpt-4o").with_max_cost(0.10);
//! let mut optimizer = TokenOptimizer::new(budget);
//!
//! let (safe_prompt, record) = optimizer.prepare("trend", raw_prompt);
//! // ... call the LLM with safe_prompt ...
//! optimizer.record_actual(record, 350);
//! ```

mod config;
mod estimator;
mod optimizer;

pub use config::TokenBudget;
pub use estimator::{
    estimate_cost, estimate_tokens, model_context_limit, ModelRates, CHARS_PER_TOKEN,
    DEFAULT_MODEL,
};
pub use optimizer::{PipelineTokenSummary, TokenOptimizer, TokenUsageRecord};
