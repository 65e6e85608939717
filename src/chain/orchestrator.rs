//! Chain execution.
//!
//! The orchestrator drives each configured stage through template
//! rendering, the token optimizer, and the external caller, strictly in
//! declaration order: stage N+1's template may reference stage N's output,
//! so no stage starts before its predecessor finishes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::stage::{ChainConfig, ChainResult, StageResult};
use super::template;
use crate::budget::{estimate_tokens, TokenOptimizer};
use crate::error::{ChainError, LlmError};
use crate::metrics::MetricsCollector;

/// Default ceiling on a single text-generation call. The upstream system
/// had no timeout at all, which let one hung call block a chain forever.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(120);

/// External text-generation call.
///
/// Supplied by the composition root; the orchestrator never constructs one
/// itself.
#[async_trait]
pub trait LlmCaller: Send + Sync {
    async fn call(
        &self,
        prompt: &str,
        model: &str,
        max_output_tokens: u64,
    ) -> Result<String, LlmError>;
}

/// Deterministic offline caller for tests and unconfigured deployments.
///
/// Returns a fixed JSON-shaped string embedding the model name, prompt
/// length, and output token ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubLlmCaller;

#[async_trait]
impl LlmCaller for StubLlmCaller {
    async fn call(
        &self,
        prompt: &str,
        model: &str,
        max_output_tokens: u64,
    ) -> Result<String, LlmError> {
        Ok(format!(
            "{{\"stub\": true, \"model\": \"{}\", \"prompt_length\": {}, \"max_tokens\": {}}}",
            model,
            prompt.chars().count(),
            max_output_tokens
        ))
    }
}

/// Executes prompt chains stage by stage with token optimization, timing,
/// and structured metrics logging.
///
/// Collaborators are explicit: both the caller and the metrics collector
/// are passed in at construction, so concurrent chains and concurrent
/// tests never observe shared hidden state.
pub struct PromptChainOrchestrator {
    caller: Arc<dyn LlmCaller>,
    metrics: MetricsCollector,
    call_timeout: Duration,
    cancel: CancellationToken,
}

impl PromptChainOrchestrator {
    pub fn new(caller: Arc<dyn LlmCaller>, metrics: MetricsCollector) -> Self {
        Self {
            caller,
            metrics,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Use an external cancellation token. Cancelling it fails the
    /// in-flight stage with a caller error.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this orchestrator's in-flight calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Execute all stages of `config` in order.
    ///
    /// `context` provides the template variables for the first stage; each
    /// successful stage's output is merged back in under
    /// `"{stage_name}_result"` for the stages after it.
    ///
    /// Returns `Err` only for invalid configuration (before anything runs)
    /// or a failed *required* stage (after recording it). Optional-stage
    /// failures are visible on the individual [`StageResult`]s of an `Ok`
    /// result.
    pub async fn run(
        &self,
        config: ChainConfig,
        context: HashMap<String, String>,
    ) -> Result<ChainResult, ChainError> {
        validate_config(&config)?;

        let pipeline_id = config
            .pipeline_id
            .clone()
            .unwrap_or_else(generate_pipeline_id);
        let mut optimizer = TokenOptimizer::new(config.budget.clone().unwrap_or_default());
        let mut context = context;
        let mut run = self.metrics.start_run(&pipeline_id, &config.goal);
        info!(
            pipeline_id = %pipeline_id,
            goal = %config.goal,
            stages = config.stages.len(),
            "starting chain"
        );

        let mut stage_results: Vec<StageResult> = Vec::with_capacity(config.stages.len());
        let mut aborted: Option<(String, String)> = None;

        for stage in &config.stages {
            let rendered = match template::render(&stage.template, &context) {
                Ok(prompt) => prompt,
                Err(err) => {
                    debug!(
                        stage = %stage.name,
                        error = %err,
                        "template rendering failed; using raw template"
                    );
                    stage.template.clone()
                }
            };

            let (safe_prompt, pending) = optimizer.prepare(&stage.name, rendered);
            let model = optimizer.budget().model.clone();
            let max_output_tokens = optimizer.budget().max_output_tokens;

            let timer = self.metrics.time_stage(&run, &stage.name);
            match self.invoke(&safe_prompt, &model, max_output_tokens).await {
                Ok(raw) => {
                    let response = match &stage.transform {
                        Some(transform) => transform(raw),
                        None => raw,
                    };
                    let record = optimizer.record_actual(pending, estimate_tokens(&response));
                    timer.succeed(&mut run);
                    context.insert(stage.output_key(), response.clone());
                    stage_results.push(StageResult {
                        stage: stage.name.clone(),
                        prompt: safe_prompt,
                        response: Some(response),
                        input_tokens: record.input_tokens,
                        output_tokens: record.output_tokens,
                        cost_usd: record.cost_usd,
                        truncated: record.truncated,
                        success: true,
                        error: None,
                    });
                }
                Err(err) => {
                    let record = optimizer.record_actual(pending, 0);
                    let message = err.to_string();
                    timer.fail(&mut run, message.clone());
                    stage_results.push(StageResult {
                        stage: stage.name.clone(),
                        prompt: safe_prompt,
                        response: None,
                        input_tokens: record.input_tokens,
                        output_tokens: 0,
                        cost_usd: record.cost_usd,
                        truncated: record.truncated,
                        success: false,
                        error: Some(message.clone()),
                    });
                    if stage.required {
                        error!(
                            pipeline_id = %pipeline_id,
                            stage = %stage.name,
                            "required stage failed; aborting chain"
                        );
                        aborted = Some((stage.name.clone(), message));
                        break;
                    }
                }
            }
        }

        let summary = optimizer.into_summary();
        let success = aborted.is_none();
        self.metrics
            .finish_run(&mut run, success, stage_results.len() as u64, summary.clone());
        info!(
            pipeline_id = %pipeline_id,
            goal = %config.goal,
            stages = stage_results.len(),
            total_cost_usd = summary.total_cost_usd(),
            "chain complete"
        );

        let result = ChainResult {
            goal: config.goal,
            pipeline_id,
            stage_results,
            token_summary: summary,
            run_metric: run,
        };
        match aborted {
            Some((stage, message)) => Err(ChainError::RequiredStageFailed {
                stage,
                message,
                result: Box::new(result),
            }),
            None => Ok(result),
        }
    }

    async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        max_output_tokens: u64,
    ) -> Result<String, LlmError> {
        let call = self.caller.call(prompt, model, max_output_tokens);
        tokio::select! {
            _ = self.cancel.cancelled() => Err(LlmError::new("text-generation call cancelled")),
            outcome = tokio::time::timeout(self.call_timeout, call) => match outcome {
                Ok(result) => result,
                Err(_) => Err(LlmError::new(format!(
                    "text-generation call timed out after {}s",
                    self.call_timeout.as_secs()
                ))),
            },
        }
    }
}

impl fmt::Debug for PromptChainOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptChainOrchestrator")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

fn generate_pipeline_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("run_{}", &hex[..8])
}

fn validate_config(config: &ChainConfig) -> Result<(), ChainError> {
    if config.goal.trim().is_empty() {
        return Err(ChainError::InvalidConfig(
            "chain goal must not be empty".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for stage in &config.stages {
        if stage.name.trim().is_empty() {
            return Err(ChainError::InvalidConfig(
                "stage names must not be empty".to_string(),
            ));
        }
        if !seen.insert(stage.name.as_str()) {
            return Err(ChainError::InvalidConfig(format!(
                "duplicate stage name '{}'",
                stage.name
            )));
        }
    }
    if let Some(budget) = &config.budget {
        budget.validate()?;
    }
    Ok(())
}
