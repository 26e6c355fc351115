use serde::{Deserialize, Serialize};

use crate::collaborators::ChartReference;
use crate::errors::StateError;
use crate::ids::RunId;
use crate::plan::Plan;
use crate::result::RunOutput;
use crate::table::Table;

/// Pipeline stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Executing,
    DerivingMetrics,
    RenderingChart,
    Synthesizing,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::DerivingMetrics => "deriving_metrics",
            Self::RenderingChart => "rendering_chart",
            Self::Synthesizing => "synthesizing",
            Self::Done => "done",
        }
    }

    /// Linear path with a single fork after metric derivation.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Self::Planning, Self::Executing)
                | (Self::Executing, Self::DerivingMetrics)
                | (Self::DerivingMetrics, Self::RenderingChart)
                | (Self::DerivingMetrics, Self::Synthesizing)
                | (Self::RenderingChart, Self::Synthesizing)
                | (Self::Synthesizing, Self::Done)
        )
    }
}

fn assign<T>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<(), StateError> {
    if slot.is_some() {
        return Err(StateError::AlreadySet { field });
    }
    *slot = Some(value);
    Ok(())
}

/// Single-assignment record threading every stage output for one question.
///
/// Each field may be written once. Stages read earlier outputs through the
/// getters and never get mutable access to them.
#[derive(Debug)]
pub struct RunState {
    run_id: RunId,
    question: String,
    stage: Stage,
    plan: Option<Plan>,
    raw_result: Option<Table>,
    enriched_result: Option<Table>,
    calculation_log: Option<Vec<String>>,
    chart: Option<ChartReference>,
    narrative: Option<String>,
}

impl RunState {
    pub fn new(run_id: RunId, question: impl Into<String>) -> Self {
        Self {
            run_id,
            question: question.into(),
            stage: Stage::Planning,
            plan: None,
            raw_result: None,
            enriched_result: None,
            calculation_log: None,
            chart: None,
            narrative: None,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advance(&mut self, next: Stage) -> Result<(), StateError> {
        if !self.stage.can_advance_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.stage = next;
        Ok(())
    }

    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    pub fn set_plan(&mut self, plan: Plan) -> Result<(), StateError> {
        assign(&mut self.plan, plan, "plan")
    }

    pub fn raw_result(&self) -> Option<&Table> {
        self.raw_result.as_ref()
    }

    pub fn set_raw_result(&mut self, table: Table) -> Result<(), StateError> {
        assign(&mut self.raw_result, table, "raw_result")
    }

    pub fn enriched_result(&self) -> Option<&Table> {
        self.enriched_result.as_ref()
    }

    /// Metric derivation writes the enriched table and its log together.
    pub fn set_enriched(&mut self, table: Table, log: Vec<String>) -> Result<(), StateError> {
        if self.enriched_result.is_some() {
            return Err(StateError::AlreadySet {
                field: "enriched_result",
            });
        }
        assign(&mut self.calculation_log, log, "calculation_log")?;
        assign(&mut self.enriched_result, table, "enriched_result")
    }

    pub fn calculation_log(&self) -> Option<&[String]> {
        self.calculation_log.as_deref()
    }

    pub fn chart(&self) -> Option<&ChartReference> {
        self.chart.as_ref()
    }

    pub fn set_chart(&mut self, chart: ChartReference) -> Result<(), StateError> {
        assign(&mut self.chart, chart, "chart_path")
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn set_narrative(&mut self, narrative: String) -> Result<(), StateError> {
        assign(&mut self.narrative, narrative, "narrative")
    }

    /// Consume a finished run into the caller-facing record.
    pub fn into_output(self) -> Result<RunOutput, StateError> {
        if self.stage != Stage::Done {
            return Err(StateError::InvalidTransition {
                from: self.stage,
                to: Stage::Done,
            });
        }
        let plan = self.plan.ok_or(StateError::Incomplete { field: "plan" })?;
        Ok(RunOutput {
            narrative: self.narrative.ok_or(StateError::Incomplete { field: "narrative" })?,
            table: self
                .enriched_result
                .ok_or(StateError::Incomplete { field: "enriched_result" })?,
            chart_reference: self.chart,
            show_table: plan.show_table,
            calculation_log: self
                .calculation_log
                .ok_or(StateError::Incomplete { field: "calculation_log" })?,
        })
    }
}
