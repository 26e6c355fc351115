use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn, Instrument};

use adlens_core::collaborators::{ChartRenderer, Planner, QueryRunner, Synthesizer};
use adlens_core::errors::StateError;
use adlens_core::ids::RunId;
use adlens_core::plan::Plan;
use adlens_core::result::{RunOutput, RunResult};
use adlens_core::state::{RunState, Stage};

use crate::chart::NoopChartRenderer;
use crate::error::PipelineError;
use crate::metrics;
use crate::router::{self, Route};
use crate::supervisor;

pub const DEFAULT_EMPTY_DATA_MESSAGE: &str =
    "No data was found for this query. Please try another question.";

/// Read-only settings shared by every run of a pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub charts_enabled: bool,
    /// Narrative returned when retrieval produced no data.
    pub empty_data_message: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            charts_enabled: true,
            empty_data_message: DEFAULT_EMPTY_DATA_MESSAGE.to_string(),
        }
    }
}

/// Emitted whenever a run enters a stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    pub run_id: RunId,
    pub stage: Stage,
}

pub struct PipelineBuilder {
    config: PipelineConfig,
    planner: Arc<dyn Planner>,
    runner: Arc<dyn QueryRunner>,
    synthesizer: Arc<dyn Synthesizer>,
    renderer: Option<Arc<dyn ChartRenderer>>,
    stage_tx: Option<broadcast::Sender<StageEvent>>,
}

impl PipelineBuilder {
    pub fn chart_renderer(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn on_stage(mut self, tx: broadcast::Sender<StageEvent>) -> Self {
        self.stage_tx = Some(tx);
        self
    }

    /// Charts disabled in the config, or no renderer given, means a no-op renderer.
    pub fn build(self) -> Pipeline {
        let renderer = match self.renderer {
            Some(renderer) if self.config.charts_enabled => renderer,
            _ => Arc::new(NoopChartRenderer),
        };
        Pipeline {
            config: Arc::new(self.config),
            planner: self.planner,
            runner: self.runner,
            renderer,
            synthesizer: self.synthesizer,
            stage_tx: self.stage_tx,
        }
    }
}

/// Question in, answer out. Each call to [`Pipeline::run`] is an independent
/// run with its own state; a pipeline can serve concurrent runs.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    planner: Arc<dyn Planner>,
    runner: Arc<dyn QueryRunner>,
    renderer: Arc<dyn ChartRenderer>,
    synthesizer: Arc<dyn Synthesizer>,
    stage_tx: Option<broadcast::Sender<StageEvent>>,
}

impl Pipeline {
    pub fn builder(
        config: PipelineConfig,
        planner: Arc<dyn Planner>,
        runner: Arc<dyn QueryRunner>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            config,
            planner,
            runner,
            synthesizer,
            renderer: None,
            stage_tx: None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one question through every stage.
    pub async fn run(&self, question: &str) -> Result<RunOutput, PipelineError> {
        let run_id = RunId::new();
        let span = info_span!("run", run_id = %run_id);

        async move {
            info!(question, "run started");
            let result = self.execute(run_id, question).await;
            match &result {
                Ok(output) => info!(
                    rows = output.table.row_count(),
                    derived = output.calculation_log.len(),
                    chart = output.chart_reference.is_some(),
                    "run completed"
                ),
                Err(e) => error!(kind = e.error_kind(), error = %e, "run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Like [`Pipeline::run`], folding any failure into a single error message.
    pub async fn answer(&self, question: &str) -> RunResult {
        match self.run(question).await {
            Ok(output) => RunResult::Completed(output),
            Err(e) => RunResult::Failed {
                error: e.to_string(),
            },
        }
    }

    /// Planning and sanitization only. Nothing is executed.
    pub async fn plan(&self, question: &str) -> Result<Plan, PipelineError> {
        let raw = self
            .planner
            .generate_plan(question)
            .await
            .map_err(PipelineError::Planning)?;
        Ok(supervisor::validate(raw))
    }

    fn emit(&self, run_id: &RunId, stage: Stage) {
        if let Some(tx) = &self.stage_tx {
            // No subscribers is fine.
            let _ = tx.send(StageEvent {
                run_id: run_id.clone(),
                stage,
            });
        }
    }

    fn transition(&self, state: &mut RunState, next: Stage) -> Result<(), PipelineError> {
        state.advance(next)?;
        info!(stage = next.as_str(), "stage entered");
        self.emit(state.run_id(), next);
        Ok(())
    }

    async fn execute(&self, run_id: RunId, question: &str) -> Result<RunOutput, PipelineError> {
        let mut state = RunState::new(run_id.clone(), question);
        info!(stage = Stage::Planning.as_str(), "stage entered");
        self.emit(&run_id, Stage::Planning);

        let plan = self.plan(question).await?;
        debug!(
            show_table = plan.show_table,
            chart = plan.chart_spec.is_some(),
            "plan frozen"
        );
        state.set_plan(plan)?;

        self.transition(&mut state, Stage::Executing)?;
        let plan = state
            .plan()
            .cloned()
            .ok_or(StateError::Incomplete { field: "plan" })?;
        let query = plan.executable_query().ok_or(PipelineError::MissingQuery)?;
        let raw = self
            .runner
            .run_query(query)
            .await
            .map_err(PipelineError::Retrieval)?;
        if raw.is_empty() {
            warn!(stage = Stage::Executing.as_str(), "retrieval returned no data");
        }
        state.set_raw_result(raw)?;

        self.transition(&mut state, Stage::DerivingMetrics)?;
        let raw = state
            .raw_result()
            .cloned()
            .ok_or(StateError::Incomplete { field: "raw_result" })?;
        let (enriched, log) = metrics::derive(raw);
        state.set_enriched(enriched, log)?;

        match router::decide(&plan) {
            Route::RenderChart => {
                self.transition(&mut state, Stage::RenderingChart)?;
                let chart = match (plan.chart_spec.as_ref(), state.enriched_result()) {
                    (Some(spec), Some(table)) => self.renderer.render_chart(&run_id, table, spec).await,
                    _ => None,
                };
                match chart {
                    Some(chart) => state.set_chart(chart)?,
                    None => warn!(
                        stage = Stage::RenderingChart.as_str(),
                        "chart not rendered, continuing without chart"
                    ),
                }
            }
            Route::Skip => debug!("no chart requested"),
        }

        self.transition(&mut state, Stage::Synthesizing)?;
        let narrative = match (state.enriched_result(), state.calculation_log()) {
            (Some(table), Some(log)) if !table.is_empty() => self
                .synthesizer
                .synthesize(question, table, log)
                .await
                .map_err(PipelineError::Synthesis)?,
            _ => {
                info!("no data to synthesize, using empty-data message");
                self.config.empty_data_message.clone()
            }
        };
        state.set_narrative(narrative)?;

        self.transition(&mut state, Stage::Done)?;
        state.into_output().map_err(PipelineError::from)
    }
}
