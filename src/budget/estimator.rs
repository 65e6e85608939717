//! Token and cost estimation.
//!
//! Counts are approximate: four characters per token is a conservative
//! ratio for English text. Costs use published per-1000-token rates; an
//! unknown model falls back to the default model's rates.

use serde::{Deserialize, Serialize};

/// Characters-per-token approximation for English text.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Model used for rate and context-limit lookups when the requested model
/// is not in the table.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// USD rates per 1000 tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    /// Cost per 1K input tokens (USD).
    pub input_per_1k: f64,
    /// Cost per 1K output tokens (USD).
    pub output_per_1k: f64,
}

impl ModelRates {
    pub fn gpt_4o() -> Self {
        Self {
            input_per_1k: 0.005,
            output_per_1k: 0.015,
        }
    }

    pub fn gpt_4o_mini() -> Self {
        Self {
            input_per_1k: 0.000_15,
            output_per_1k: 0.000_6,
        }
    }

    pub fn gpt_3_5_turbo() -> Self {
        Self {
            input_per_1k: 0.000_5,
            output_per_1k: 0.001_5,
        }
    }

    /// Look up rates for a model, falling back to [`DEFAULT_MODEL`].
    pub fn for_model(model: &str) -> Self {
        match model {
            "gpt-4o" => Self::gpt_4o(),
            "gpt-4o-mini" => Self::gpt_4o_mini(),
            "gpt-3.5-turbo" => Self::gpt_3_5_turbo(),
            _ => Self::gpt_4o(),
        }
    }
}

/// Default context-window limit (tokens) for a model.
pub fn model_context_limit(model: &str) -> u64 {
    match model {
        "gpt-4o" | "gpt-4o-mini" => 128_000,
        "gpt-3.5-turbo" => 16_385,
        _ => 128_000,
    }
}

/// Estimate token count from character count. Never returns zero.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    (chars / CHARS_PER_TOKEN).max(1)
}

/// Estimate USD cost for one call, rounded to 6 decimal places.
pub fn estimate_cost(input_tokens: u64, output_tokens: u64, model: &str) -> f64 {
    let rates = ModelRates::for_model(model);
    let cost = (input_tokens as f64 / 1000.0) * rates.input_per_1k
        + (output_tokens as f64 / 1000.0) * rates.output_per_1k;
    round_usd(cost)
}

/// Round a USD amount to 6 decimal places.
pub(crate) fn round_usd(amount: f64) -> f64 {
    (amount * 1_000_000.0).round() / 1_000_000.0
}
