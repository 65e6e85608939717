//! Pipeline run metrics and structured log events.
//!
//! One [`PipelineRunMetric`] is created per chain run via
//! [`MetricsCollector::start_run`], accumulates a [`StageMetric`] per
//! timed stage in execution order, and is closed exactly once by
//! [`MetricsCollector::finish_run`]. Every transition emits a structured
//! log event with stable fields per event type (`pipeline_id`, `goal`,
//! `stage`, `duration_ms`, `success`, `error`, `record_count`,
//! `total_duration_ms`) so downstream log processors can rely on them.
//!
//! The collector itself is cheap to clone and safe to share across
//! concurrently executing runs; each run's stage list is only ever touched
//! by the single task driving that run.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::budget::PipelineTokenSummary;

/// Timing and outcome for one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageMetric {
    pub stage: String,
    pub goal: String,
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration, rounded to 3 decimal places.
    pub duration_ms: f64,
    pub success: bool,
    pub error: Option<String>,
}

/// Aggregated metrics for one complete pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRunMetric {
    pub pipeline_id: String,
    pub goal: String,
    pub started_at: DateTime<Utc>,
    /// Per-stage metrics in execution order; append-only.
    pub stages: Vec<StageMetric>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_duration_ms: Option<f64>,
    pub success: Option<bool>,
    pub record_count: u64,
    pub token_summary: Option<PipelineTokenSummary>,
}

/// Scoped timer for one stage execution.
///
/// Created by [`MetricsCollector::time_stage`]; closed by exactly one of
/// [`succeed`](Self::succeed) or [`fail`](Self::fail). The timer only
/// observes the outcome — the caller keeps ownership of any failure and
/// propagates it itself.
#[derive(Debug)]
pub struct StageTimer {
    stage: String,
    goal: String,
    pipeline_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl StageTimer {
    /// Close the timer for a successful stage.
    pub fn succeed(self, run: &mut PipelineRunMetric) {
        self.finish(run, true, None);
    }

    /// Close the timer for a failed stage.
    pub fn fail(self, run: &mut PipelineRunMetric, error: impl Into<String>) {
        self.finish(run, false, Some(error.into()));
    }

    fn finish(self, run: &mut PipelineRunMetric, success: bool, error: Option<String>) {
        let duration_ms = round_ms(self.started.elapsed().as_secs_f64() * 1000.0);
        let metric = StageMetric {
            stage: self.stage,
            goal: self.goal,
            started_at: self.started_at,
            duration_ms,
            success,
            error,
        };
        if success {
            info!(
                pipeline_id = %self.pipeline_id,
                stage = %metric.stage,
                goal = %metric.goal,
                duration_ms,
                success,
                "stage completed"
            );
        } else {
            error!(
                pipeline_id = %self.pipeline_id,
                stage = %metric.stage,
                goal = %metric.goal,
                duration_ms,
                success,
                error = metric.error.as_deref(),
                "stage completed"
            );
        }
        run.stages.push(metric);
    }
}

/// Collector for pipeline run metrics.
///
/// May be shared across concurrently running chains; finished runs are
/// archived in an internal registry behind a lock.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    finished: Arc<RwLock<Vec<PipelineRunMetric>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new run record and emit the "run started" event.
    pub fn start_run(
        &self,
        pipeline_id: impl Into<String>,
        goal: impl Into<String>,
    ) -> PipelineRunMetric {
        let run = PipelineRunMetric {
            pipeline_id: pipeline_id.into(),
            goal: goal.into(),
            started_at: Utc::now(),
            stages: Vec::new(),
            finished_at: None,
            total_duration_ms: None,
            success: None,
            record_count: 0,
            token_summary: None,
        };
        info!(pipeline_id = %run.pipeline_id, goal = %run.goal, "pipeline run started");
        run
    }

    /// Start timing one stage of `run`.
    pub fn time_stage(&self, run: &PipelineRunMetric, stage: impl Into<String>) -> StageTimer {
        StageTimer {
            stage: stage.into(),
            goal: run.goal.clone(),
            pipeline_id: run.pipeline_id.clone(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Close a run record, emit the "run finished" event, and archive a
    /// snapshot in the collector's registry.
    pub fn finish_run(
        &self,
        run: &mut PipelineRunMetric,
        success: bool,
        record_count: u64,
        token_summary: PipelineTokenSummary,
    ) {
        let finished_at = Utc::now();
        let elapsed = (finished_at - run.started_at).to_std().unwrap_or_default();
        run.finished_at = Some(finished_at);
        run.total_duration_ms = Some(round_ms(elapsed.as_secs_f64() * 1000.0));
        run.success = Some(success);
        run.record_count = record_count;
        run.token_summary = Some(token_summary);
        info!(
            pipeline_id = %run.pipeline_id,
            goal = %run.goal,
            success,
            total_duration_ms = run.total_duration_ms,
            record_count,
            "pipeline run finished"
        );
        if let Ok(mut finished) = self.finished.write() {
            finished.push(run.clone());
        }
    }

    /// Snapshots of every run finished through this collector.
    pub fn finished_runs(&self) -> Vec<PipelineRunMetric> {
        self.finished
            .read()
            .map(|runs| runs.clone())
            .unwrap_or_default()
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_run_fields() {
        let collector = MetricsCollector::new();
        let run = collector.start_run("run_abc", "grow_subscribers");
        assert_eq!(run.pipeline_id, "run_abc");
        assert_eq!(run.goal, "grow_subscribers");
        assert!(run.stages.is_empty());
        assert!(run.finished_at.is_none());
        assert!(run.success.is_none());
    }

    #[test]
    fn test_timer_success_appends_stage() {
        let collector = MetricsCollector::new();
        let mut run = collector.start_run("run_abc", "g");
        let timer = collector.time_stage(&run, "trend");
        timer.succeed(&mut run);

        assert_eq!(run.stages.len(), 1);
        let stage = &run.stages[0];
        assert_eq!(stage.stage, "trend");
        assert_eq!(stage.goal, "g");
        assert!(stage.success);
        assert!(stage.error.is_none());
        assert!(stage.duration_ms >= 0.0);
    }

    #[test]
    fn test_timer_failure_records_error() {
        let collector = MetricsCollector::new();
        let mut run = collector.start_run("run_abc", "g");
        let timer = collector.time_stage(&run, "trend");
        timer.fail(&mut run, "provider unavailable");

        assert_eq!(run.stages.len(), 1);
        assert!(!run.stages[0].success);
        assert_eq!(run.stages[0].error.as_deref(), Some("provider unavailable"));
    }

    #[test]
    fn test_stages_accumulate_in_order() {
        let collector = MetricsCollector::new();
        let mut run = collector.start_run("run_abc", "g");
        for name in ["a", "b", "c"] {
            let timer = collector.time_stage(&run, name);
            timer.succeed(&mut run);
        }
        let names: Vec<_> = run.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_finish_run_closes_record() {
        let collector = MetricsCollector::new();
        let mut run = collector.start_run("run_abc", "g");
        collector.finish_run(&mut run, true, 3, PipelineTokenSummary::default());

        assert_eq!(run.success, Some(true));
        assert_eq!(run.record_count, 3);
        assert!(run.finished_at.is_some());
        assert!(run.total_duration_ms.is_some());
        assert!(run.token_summary.is_some());
    }

    #[test]
    fn test_finished_runs_registry() {
        let collector = MetricsCollector::new();
        let mut first = collector.start_run("run_1", "g");
        collector.finish_run(&mut first, true, 0, PipelineTokenSummary::default());
        let mut second = collector.start_run("run_2", "g");
        collector.finish_run(&mut second, false, 1, PipelineTokenSummary::default());

        let runs = collector.finished_runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].pipeline_id, "run_1");
        assert_eq!(runs[1].pipeline_id, "run_2");
        assert_eq!(runs[1].success, Some(false));
    }

    #[test]
    fn test_run_metric_serializes() {
        let collector = MetricsCollector::new();
        let mut run = collector.start_run("run_abc", "g");
        let timer = collector.time_stage(&run, "trend");
        timer.succeed(&mut run);
        collector.finish_run(&mut run, true, 1, PipelineTokenSummary::default());

        let json = serde_json::to_string(&run).expect("run metric serializes");
        assert!(json.contains("\"pipeline_id\":\"run_abc\""));
        assert!(json.contains("\"stages\""));
        assert!(json.contains("\"total_duration_ms\""));
    }
}
