//! Plan sanitization between the planner and execution.
//!
//! `validate` never fails. Chart intent that is incomplete or that names
//! columns the query does not mention is dropped, and the rest of the plan
//! goes through.

use tracing::{debug, warn};

use adlens_core::plan::{ChartSpec, ChartType, Plan, RawChartSpec, RawPlan};

/// Freeze a planner plan. Total and idempotent.
pub fn validate(raw: RawPlan) -> Plan {
    let chart_spec = raw
        .chart_spec
        .and_then(complete_chart)
        .and_then(|spec| coherent_with(spec, raw.query.as_deref()));

    Plan {
        query: raw.query,
        show_table: raw.show_table.unwrap_or(true),
        chart_spec,
    }
}

fn non_empty(field: Option<String>) -> Option<String> {
    field
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// All-or-nothing: x, y and title must all be present.
fn complete_chart(raw: RawChartSpec) -> Option<ChartSpec> {
    let (Some(x_column), Some(y_column), Some(title)) = (
        non_empty(raw.x_column),
        non_empty(raw.y_column),
        non_empty(raw.title),
    ) else {
        debug!("incomplete chart spec discarded");
        return None;
    };

    Some(ChartSpec {
        chart_type: raw.chart_type.as_deref().map(ChartType::parse).unwrap_or_default(),
        x_column,
        y_column,
        title,
    })
}

/// Best-effort check that both chart columns appear in the query text.
///
/// Plain case-insensitive substring containment: a column aliased under a
/// different name is rejected, and a name that is part of a longer token is
/// accepted.
fn coherent_with(spec: ChartSpec, query: Option<&str>) -> Option<ChartSpec> {
    let query = query.unwrap_or_default().to_lowercase();
    let missing: Vec<&str> = [spec.x_column.as_str(), spec.y_column.as_str()]
        .into_iter()
        .filter(|col| !query.contains(&col.to_lowercase()))
        .collect();

    if missing.is_empty() {
        Some(spec)
    } else {
        warn!(?missing, "chart columns not found in query, chart discarded");
        None
    }
}
