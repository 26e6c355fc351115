use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::CollaboratorError;
use crate::ids::RunId;
use crate::plan::{ChartSpec, RawPlan};
use crate::table::Table;

/// Location of a rendered chart artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartReference(PathBuf);

impl ChartReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ChartReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Turns a natural-language question into a candidate plan.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn generate_plan(&self, question: &str) -> Result<RawPlan, CollaboratorError>;
}

/// Executes a retrieval statement against the relational store.
///
/// Implementations return an empty table, not an error, when the statement
/// itself fails. Errors are reserved for faults of the runner.
#[async_trait]
pub trait QueryRunner: Send + Sync {
    async fn run_query(&self, query: &str) -> Result<Table, CollaboratorError>;
}

/// Renders a chart for one run. Never fails: `None` means no chart.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render_chart(
        &self,
        run_id: &RunId,
        table: &Table,
        spec: &ChartSpec,
    ) -> Option<ChartReference>;
}

/// Writes the narrative answer from the enriched data.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        question: &str,
        table: &Table,
        calculation_log: &[String],
    ) -> Result<String, CollaboratorError>;
}
