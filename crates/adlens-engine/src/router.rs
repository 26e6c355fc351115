use serde::{Deserialize, Serialize};

use adlens_core::plan::Plan;

/// Presentation branch taken after metric derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    RenderChart,
    Skip,
}

/// Render iff the frozen plan kept its chart spec. Nothing else is consulted.
pub fn decide(plan: &Plan) -> Route {
    match plan.chart_spec {
        Some(_) => Route::RenderChart,
        None => Route::Skip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlens_core::plan::{ChartSpec, ChartType};

    #[test]
    fn routes_on_chart_spec_presence() {
        let mut plan = Plan {
            query: Some("SELECT date, clicks FROM daily_performance".into()),
            show_table: false,
            chart_spec: None,
        };
        assert_eq!(decide(&plan), Route::Skip);

        plan.chart_spec = Some(ChartSpec {
            chart_type: ChartType::Line,
            x_column: "date".into(),
            y_column: "clicks".into(),
            title: "Clicks".into(),
        });
        assert_eq!(decide(&plan), Route::RenderChart);
    }
}
