//! Prompt preparation and usage accounting for one chain run.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::config::TokenBudget;
use super::estimator::{estimate_cost, estimate_tokens, round_usd, CHARS_PER_TOKEN};

/// Token usage for one call attempt.
///
/// Created by [`TokenOptimizer::prepare`] with placeholder output tokens
/// and finalized exactly once by [`TokenOptimizer::record_actual`],
/// whether the call succeeded or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenUsageRecord {
    pub stage: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// USD, rounded to 6 decimal places.
    pub cost_usd: f64,
    pub truncated: bool,
}

/// Append-only usage records for one chain run.
///
/// Totals are monotonically non-decreasing; records are never mutated or
/// removed after being appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineTokenSummary {
    records: Vec<TokenUsageRecord>,
}

impl PipelineTokenSummary {
    /// Usage records in the order they were finalized.
    pub fn records(&self) -> &[TokenUsageRecord] {
        &self.records
    }

    pub fn total_input_tokens(&self) -> u64 {
        self.records.iter().map(|r| r.input_tokens).sum()
    }

    pub fn total_output_tokens(&self) -> u64 {
        self.records.iter().map(|r| r.output_tokens).sum()
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens() + self.total_output_tokens()
    }

    /// Total cost in USD, rounded to 6 decimal places.
    pub fn total_cost_usd(&self) -> f64 {
        round_usd(self.records.iter().map(|r| r.cost_usd).sum())
    }

    fn add(&mut self, record: TokenUsageRecord) {
        self.records.push(record);
    }
}

/// Applies a [`TokenBudget`] to each outgoing prompt and accumulates the
/// run's usage summary.
///
/// One optimizer is scoped to one chain run and never shared.
#[derive(Debug, Clone)]
pub struct TokenOptimizer {
    budget: TokenBudget,
    summary: PipelineTokenSummary,
}

impl TokenOptimizer {
    pub fn new(budget: TokenBudget) -> Self {
        Self {
            budget,
            summary: PipelineTokenSummary::default(),
        }
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    /// Truncate `prompt` if it exceeds the effective input limit and return
    /// it together with a pending usage record (output tokens still zero,
    /// not yet in the summary).
    ///
    /// When a cost ceiling is configured, a projected cost over the
    /// remaining budget logs a warning. The check is advisory only: it
    /// never blocks or alters the call.
    pub fn prepare(&self, stage: &str, prompt: String) -> (String, TokenUsageRecord) {
        let limit = self.budget.effective_input_limit();
        let mut input_tokens = estimate_tokens(&prompt);
        let mut truncated = false;
        let mut prompt = prompt;

        if input_tokens > limit {
            let max_chars = (limit * CHARS_PER_TOKEN) as usize;
            prompt = prompt.chars().take(max_chars).collect();
            input_tokens = limit;
            truncated = true;
            warn!(stage, limit, "prompt truncated to fit input token limit");
        }

        if let Some(max_cost) = self.budget.max_cost_usd {
            let projected =
                estimate_cost(input_tokens, self.budget.max_output_tokens, &self.budget.model);
            let remaining = max_cost - self.summary.total_cost_usd();
            if projected > remaining {
                warn!(
                    stage,
                    projected_cost_usd = projected,
                    remaining_budget_usd = remaining,
                    "projected stage cost exceeds remaining budget"
                );
            }
        }

        let record = TokenUsageRecord {
            stage: stage.to_string(),
            model: self.budget.model.clone(),
            input_tokens,
            output_tokens: 0,
            cost_usd: 0.0,
            truncated,
        };
        (prompt, record)
    }

    /// Finalize a prepared record with the actual output token count,
    /// append it to the summary, and return the finalized record.
    ///
    /// Taking the record by value makes double finalization unrepresentable.
    /// Failed calls pass `actual_output_tokens = 0`.
    pub fn record_actual(
        &mut self,
        mut record: TokenUsageRecord,
        actual_output_tokens: u64,
    ) -> TokenUsageRecord {
        record.output_tokens = actual_output_tokens;
        record.cost_usd = estimate_cost(record.input_tokens, actual_output_tokens, &record.model);
        debug!(
            stage = %record.stage,
            input_tokens = record.input_tokens,
            output_tokens = actual_output_tokens,
            cost_usd = record.cost_usd,
            "stage usage recorded"
        );
        self.summary.add(record.clone());
        record
    }

    /// Read access to the running summary.
    pub fn summary(&self) -> &PipelineTokenSummary {
        &self.summary
    }

    /// Consume the optimizer and hand the summary to the run result.
    pub fn into_summary(self) -> PipelineTokenSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(stage: &str, input: u64, output: u64, cost: f64) -> TokenUsageRecord {
        TokenUsageRecord {
            stage: stage.to_string(),
            model: "gpt-4o".to_string(),
            input_tokens: input,
            output_tokens: output,
            cost_usd: cost,
            truncated: false,
        }
    }

    #[test]
    fn test_empty_summary() {
        let summary = PipelineTokenSummary::default();
        assert_eq!(summary.total_input_tokens(), 0);
        assert_eq!(summary.total_output_tokens(), 0);
        assert_eq!(summary.total_tokens(), 0);
        assert_eq!(summary.total_cost_usd(), 0.0);
        assert!(summary.records().is_empty());
    }

    #[test]
    fn test_summary_totals() {
        let mut summary = PipelineTokenSummary::default();
        summary.add(record("trend", 100, 50, 0.001));
        summary.add(record("ranking", 200, 25, 0.002));
        assert_eq!(summary.total_input_tokens(), 300);
        assert_eq!(summary.total_output_tokens(), 75);
        assert_eq!(summary.total_tokens(), 375);
        assert!((summary.total_cost_usd() - 0.003).abs() < 1e-9);
    }

    #[test]
    fn test_prepare_within_limit_unchanged() {
        let optimizer = TokenOptimizer::new(TokenBudget::default());
        let prompt = "analyze the dataset".to_string();
        let (safe, record) = optimizer.prepare("trend", prompt.clone());
        assert_eq!(safe, prompt);
        assert!(!record.truncated);
        assert_eq!(record.input_tokens, estimate_tokens(&prompt));
        assert_eq!(record.output_tokens, 0);
        assert_eq!(record.cost_usd, 0.0);
    }

    #[test]
    fn test_prepare_truncates_oversized_prompt() {
        let budget = TokenBudget::new("gpt-4o").with_max_input_tokens(5);
        let optimizer = TokenOptimizer::new(budget);
        let prompt = "x".repeat(200); // ~50 tokens
        let (safe, record) = optimizer.prepare("trend", prompt);
        assert_eq!(safe.chars().count(), 20); // 5 tokens * 4 chars
        assert!(record.truncated);
        assert_eq!(record.input_tokens, 5);
    }

    #[test]
    fn test_prepare_keeps_prefix() {
        let budget = TokenBudget::new("gpt-4o").with_max_input_tokens(1);
        let optimizer = TokenOptimizer::new(budget);
        let (safe, _) = optimizer.prepare("trend", "abcdefgh".to_string());
        assert_eq!(safe, "abcd");
    }

    #[test]
    fn test_cost_ceiling_is_advisory() {
        // A projected overrun must not block or alter the call.
        let budget = TokenBudget::new("gpt-4o").with_max_cost(0.000_001);
        let optimizer = TokenOptimizer::new(budget);
        let prompt = "p".repeat(4000);
        let (safe, record) = optimizer.prepare("trend", prompt.clone());
        assert_eq!(safe, prompt);
        assert_eq!(record.input_tokens, 1000);
        assert!(!record.truncated);
    }

    #[test]
    fn test_record_actual_finalizes_and_appends() {
        let mut optimizer = TokenOptimizer::new(TokenBudget::default());
        let (_, pending) = optimizer.prepare("trend", "q".repeat(400));
        let finalized = optimizer.record_actual(pending, 250);
        assert_eq!(finalized.output_tokens, 250);
        assert_eq!(finalized.cost_usd, estimate_cost(100, 250, "gpt-4o"));
        assert_eq!(optimizer.summary().records().len(), 1);
        assert_eq!(optimizer.summary().total_tokens(), 350);
    }

    #[test]
    fn test_failed_call_recorded_with_zero_output() {
        let mut optimizer = TokenOptimizer::new(TokenBudget::default());
        let (_, pending) = optimizer.prepare("trend", "q".repeat(400));
        let finalized = optimizer.record_actual(pending, 0);
        assert_eq!(finalized.output_tokens, 0);
        assert_eq!(finalized.cost_usd, estimate_cost(100, 0, "gpt-4o"));
        assert_eq!(optimizer.summary().records().len(), 1);
    }
}
