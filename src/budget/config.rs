//! Per-chain token budget configuration.

use serde::{Deserialize, Serialize};

use super::estimator::{model_context_limit, DEFAULT_MODEL};
use crate::error::ChainError;

/// Ceilings applied to one chain run.
///
/// A budget is owned by exactly one run; it is never shared across
/// concurrently executing chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Model identifier used for rate and context-limit lookups.
    pub model: String,
    /// Input token ceiling. `None` uses the model's context limit.
    pub max_input_tokens: Option<u64>,
    /// Output token ceiling passed through to the caller.
    pub max_output_tokens: u64,
    /// Cost ceiling in USD. `None` disables the advisory check.
    pub max_cost_usd: Option<f64>,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_input_tokens: None,
            max_output_tokens: 2000,
            max_cost_usd: None,
        }
    }
}

impl TokenBudget {
    /// Create a budget for the given model with default ceilings.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set the input token ceiling.
    pub fn with_max_input_tokens(mut self, tokens: u64) -> Self {
        self.max_input_tokens = Some(tokens);
        self
    }

    /// Set the output token ceiling.
    pub fn with_max_output_tokens(mut self, tokens: u64) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Set the cost ceiling in USD.
    pub fn with_max_cost(mut self, usd: f64) -> Self {
        self.max_cost_usd = Some(usd);
        self
    }

    /// Effective input ceiling: the configured limit capped at the model's
    /// context window, or the context window when no limit is configured.
    pub fn effective_input_limit(&self) -> u64 {
        let model_limit = model_context_limit(&self.model);
        match self.max_input_tokens {
            Some(limit) => limit.min(model_limit),
            None => model_limit,
        }
    }

    /// Reject ceilings that would make every call unsatisfiable.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.model.trim().is_empty() {
            return Err(ChainError::InvalidConfig(
                "budget model must not be empty".to_string(),
            ));
        }
        if self.max_output_tokens == 0 {
            return Err(ChainError::InvalidConfig(
                "max_output_tokens must be greater than zero".to_string(),
            ));
        }
        if self.max_input_tokens == Some(0) {
            return Err(ChainError::InvalidConfig(
                "max_input_tokens must be greater than zero when set".to_string(),
            ));
        }
        if let Some(cost) = self.max_cost_usd {
            if !cost.is_finite() || cost <= 0.0 {
                return Err(ChainError::InvalidConfig(
                    "max_cost_usd must be a positive amount".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget() {
        let budget = TokenBudget::default();
        assert_eq!(budget.model, DEFAULT_MODEL);
        assert_eq!(budget.max_input_tokens, None);
        assert_eq!(budget.max_output_tokens, 2000);
        assert_eq!(budget.max_cost_usd, None);
    }

    #[test]
    fn test_default_effective_limit_is_model_limit() {
        let budget = TokenBudget::new("gpt-4o");
        assert_eq!(budget.effective_input_limit(), model_context_limit("gpt-4o"));
    }

    #[test]
    fn test_custom_limit_respected() {
        let budget = TokenBudget::new("gpt-4o").with_max_input_tokens(1000);
        assert_eq!(budget.effective_input_limit(), 1000);
    }

    #[test]
    fn test_cannot_exceed_model_limit() {
        let model_limit = model_context_limit("gpt-3.5-turbo");
        let budget = TokenBudget::new("gpt-3.5-turbo").with_max_input_tokens(model_limit + 99_999);
        assert_eq!(budget.effective_input_limit(), model_limit);
    }

    #[test]
    fn test_builder_pattern() {
        let budget = TokenBudget::new("gpt-4o-mini")
            .with_max_input_tokens(4000)
            .with_max_output_tokens(100)
            .with_max_cost(0.05);
        assert_eq!(budget.model, "gpt-4o-mini");
        assert_eq!(budget.max_input_tokens, Some(4000));
        assert_eq!(budget.max_output_tokens, 100);
        assert_eq!(budget.max_cost_usd, Some(0.05));
    }

    #[test]
    fn test_validate_accepts_default() {
        assert!(TokenBudget::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_output_tokens() {
        let budget = TokenBudget::default().with_max_output_tokens(0);
        assert!(budget.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_input_tokens() {
        let budget = TokenBudget::default().with_max_input_tokens(0);
        assert!(budget.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_cost() {
        assert!(TokenBudget::default().with_max_cost(0.0).validate().is_err());
        assert!(TokenBudget::default()
            .with_max_cost(-1.0)
            .validate()
            .is_err());
        assert!(TokenBudget::default()
            .with_max_cost(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_validate_rejects_empty_model() {
        let budget = TokenBudget::new("  ");
        assert!(budget.validate().is_err());
    }
}
