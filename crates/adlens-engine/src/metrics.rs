//! Derived marketing metrics.
//!
//! [`derive`] is pure: it takes the retrieved table and returns the enriched
//! table plus one log line per metric column it added. Base columns that are
//! present get coerced to floats first; metrics whose base columns are absent
//! are skipped without error.

use tracing::{debug, warn};

use adlens_core::table::{Table, Value};

/// Raw counters coerced to numbers before any metric is computed.
pub const NUMERIC_COLUMNS: &[&str] = &["impressions", "clicks", "conversions", "spend", "reach"];

/// A ratio metric: `numerator / denominator * scale`, floored to 0 when the
/// denominator is missing or not positive.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MetricDefinition {
    pub column: &'static str,
    pub numerator: &'static str,
    pub denominator: &'static str,
    pub scale: f64,
    pub formula: &'static str,
}

impl MetricDefinition {
    /// Human-readable line recorded in the calculation log.
    pub fn describe(&self) -> String {
        format!(
            "{} = {} (0 when {} <= 0)",
            self.column, self.formula, self.denominator
        )
    }

    fn compute(&self, numerator: &Value, denominator: &Value) -> Value {
        let den = match denominator.as_f64() {
            Some(d) if d > 0.0 => d,
            _ => return Value::Float(0.0),
        };
        match numerator.as_f64() {
            Some(num) => {
                let ratio = round2(num / den * self.scale);
                if ratio.is_finite() {
                    Value::Float(ratio)
                } else {
                    Value::Null
                }
            }
            None => Value::Null,
        }
    }
}

/// Evaluated in this order; the calculation log follows it.
pub const METRICS: &[MetricDefinition] = &[
    MetricDefinition {
        column: "click_through_rate",
        numerator: "clicks",
        denominator: "impressions",
        scale: 100.0,
        formula: "clicks / impressions * 100",
    },
    MetricDefinition {
        column: "cost_per_click",
        numerator: "spend",
        denominator: "clicks",
        scale: 1.0,
        formula: "spend / clicks",
    },
    MetricDefinition {
        column: "cost_per_acquisition",
        numerator: "spend",
        denominator: "conversions",
        scale: 1.0,
        formula: "spend / conversions",
    },
];

/// Round to two decimals, halves away from zero.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Coerce one cell of a counter column. Missing counts as zero; text that is
/// not a finite number becomes null.
fn to_numeric(value: &Value) -> Value {
    match value {
        Value::Null => Value::Float(0.0),
        Value::Bool(b) => Value::Float(if *b { 1.0 } else { 0.0 }),
        Value::Int(i) => Value::Float(*i as f64),
        Value::Float(f) if f.is_finite() => Value::Float(*f),
        Value::Float(_) => Value::Null,
        Value::Text(s) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Null,
        },
    }
}

fn coerce_numeric_columns(table: &mut Table) {
    for &name in NUMERIC_COLUMNS {
        let Some(cells) = table.column(name) else {
            continue;
        };
        let converted: Vec<Value> = cells.map(to_numeric).collect();
        if let Err(e) = table.replace_column(name, converted) {
            warn!(column = name, error = %e, "failed to coerce metric column");
        }
    }
}

fn metric_values(table: &Table, metric: &MetricDefinition) -> Option<Vec<Value>> {
    let numerators = table.column(metric.numerator)?;
    let denominators = table.column(metric.denominator)?;
    Some(
        numerators
            .zip(denominators)
            .map(|(num, den)| metric.compute(num, den))
            .collect(),
    )
}

/// Enrich `table` with every applicable metric.
///
/// Empty input comes back unchanged with an empty log. Existing columns are
/// never renamed or dropped, and a metric whose column already exists is left
/// alone.
pub fn derive(table: Table) -> (Table, Vec<String>) {
    if table.is_empty() {
        return (table, Vec::new());
    }

    let mut enriched = table;
    coerce_numeric_columns(&mut enriched);

    let mut log = Vec::new();
    for metric in METRICS {
        if enriched.has_column(metric.column) {
            debug!(column = metric.column, "metric column already present, skipped");
            continue;
        }
        let Some(values) = metric_values(&enriched, metric) else {
            continue;
        };
        match enriched.push_column(metric.column, values) {
            Ok(()) => log.push(metric.describe()),
            Err(e) => warn!(column = metric.column, error = %e, "failed to add metric column"),
        }
    }

    debug!(derived = log.len(), "metrics derived");
    (enriched, log)
}
