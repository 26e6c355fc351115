use serde::{Deserialize, Serialize};

use crate::collaborators::ChartReference;
use crate::table::Table;

/// Everything a completed run hands back to its caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub narrative: String,
    pub table: Table,
    pub chart_reference: Option<ChartReference>,
    pub show_table: bool,
    pub calculation_log: Vec<String>,
}

/// Run-level result: a full record or a single error message, never a mix.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunResult {
    Completed(RunOutput),
    Failed { error: String },
}

impl RunResult {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn output(&self) -> Option<&RunOutput> {
        match self {
            Self::Completed(output) => Some(output),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Failed { error } => Some(error),
        }
    }
}
