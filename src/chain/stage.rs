//! Chain configuration and result types.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::budget::{PipelineTokenSummary, TokenBudget};
use crate::metrics::PipelineRunMetric;

/// Post-processing applied to a stage's raw response before it is stored
/// and propagated into the context.
pub type StageTransform = Arc<dyn Fn(String) -> String + Send + Sync>;

/// One named unit of work in a chain. Immutable once the chain starts.
#[derive(Clone)]
pub struct PromptStage {
    /// Unique within the chain.
    pub name: String,
    /// Text with `{placeholder}` slots.
    pub template: String,
    pub transform: Option<StageTransform>,
    /// When true, a failed call aborts the whole chain.
    pub required: bool,
}

impl PromptStage {
    /// Create a required stage with no post-processing.
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            transform: None,
            required: true,
        }
    }

    /// Mark the stage optional: its failure is recorded but does not abort
    /// the chain.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attach a post-processing transform.
    pub fn with_transform(
        mut self,
        transform: impl Fn(String) -> String + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Context key under which this stage's output is stored for later
    /// stages' templates.
    pub fn output_key(&self) -> String {
        format!("{}_result", self.name)
    }
}

impl fmt::Debug for PromptStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptStage")
            .field("name", &self.name)
            .field("template", &self.template)
            .field("transform", &self.transform.is_some())
            .field("required", &self.required)
            .finish()
    }
}

/// Configuration for a complete prompt chain. Stage order is significant
/// and preserved throughout execution.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Opaque label for the chain's purpose.
    pub goal: String,
    pub stages: Vec<PromptStage>,
    /// Defaults are used when absent.
    pub budget: Option<TokenBudget>,
    /// Generated when absent.
    pub pipeline_id: Option<String>,
}

impl ChainConfig {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            stages: Vec::new(),
            budget: None,
            pipeline_id: None,
        }
    }

    pub fn with_stage(mut self, stage: PromptStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_stages(mut self, stages: impl IntoIterator<Item = PromptStage>) -> Self {
        self.stages.extend(stages);
        self
    }

    pub fn with_budget(mut self, budget: TokenBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_pipeline_id(mut self, pipeline_id: impl Into<String>) -> Self {
        self.pipeline_id = Some(pipeline_id.into());
        self
    }
}

/// Outcome of one attempted stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: String,
    /// The final prompt sent to the caller (after truncation, if any).
    pub prompt: String,
    /// Transformed response; `None` when the call failed.
    pub response: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub truncated: bool,
    pub success: bool,
    pub error: Option<String>,
}

/// Terminal, caller-visible output of one chain execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainResult {
    pub goal: String,
    pub pipeline_id: String,
    /// One entry per attempted stage, in execution order.
    pub stage_results: Vec<StageResult>,
    pub token_summary: PipelineTokenSummary,
    pub run_metric: PipelineRunMetric,
}

impl ChainResult {
    /// Look up a stage result by name.
    pub fn get_stage(&self, name: &str) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| r.stage == name)
    }

    /// True only when every attempted stage succeeded. A chain that
    /// completed despite optional failures returns `Ok` from the
    /// orchestrator but `false` here.
    pub fn fully_succeeded(&self) -> bool {
        self.stage_results.iter().all(|r| r.success)
    }
}
