use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of chart a plan may ask for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    #[default]
    Bar,
    Line,
    Pie,
    Scatter,
}

impl ChartType {
    /// Lenient parse: unknown names fall back to a bar chart.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "line" => Self::Line,
            "pie" => Self::Pie,
            "scatter" => Self::Scatter,
            _ => Self::Bar,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Pie => "pie",
            Self::Scatter => "scatter",
        }
    }
}

impl<'de> Deserialize<'de> for ChartType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Any JSON value is accepted; one that does not fit `T` becomes `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Chart intent exactly as the planner produced it. Nothing is trusted:
/// a field of the wrong JSON type reads as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawChartSpec {
    #[serde(deserialize_with = "lenient")]
    pub chart_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub x_column: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub y_column: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub title: Option<String>,
}

/// Planner output before sanitization. Missing and `null` fields are both `None`.
///
/// `query` must be a string when present. The presentation fields only
/// shape the output, so a mistyped `show_table` or `chart_spec` reads as
/// absent and the supervisor falls back to its defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPlan {
    pub query: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub show_table: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub chart_spec: Option<RawChartSpec>,
}

impl RawPlan {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }
}

/// A structurally complete chart request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub x_column: String,
    pub y_column: String,
    pub title: String,
}

/// The frozen plan for one run.
///
/// `query` stays optional: a plan without a query is still a plan, and the
/// pipeline refuses it when it reaches the executing stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub query: Option<String>,
    pub show_table: bool,
    pub chart_spec: Option<ChartSpec>,
}

impl Plan {
    /// The retrieval statement, if it has any non-whitespace content.
    pub fn executable_query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    /// Re-express a frozen plan in planner shape.
    pub fn to_raw(&self) -> RawPlan {
        RawPlan {
            query: self.query.clone(),
            show_table: Some(self.show_table),
            chart_spec: self.chart_spec.as_ref().map(|c| RawChartSpec {
                chart_type: Some(c.chart_type.as_str().to_string()),
                x_column: Some(c.x_column.clone()),
                y_column: Some(c.y_column.clone()),
                title: Some(c.title.clone()),
            }),
        }
    }
}
