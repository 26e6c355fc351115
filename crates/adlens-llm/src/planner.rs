use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use adlens_core::errors::CollaboratorError;
use adlens_core::plan::RawPlan;
use adlens_core::provider::{ChatModel, ChatRequest};
use adlens_core::Planner;

use crate::extract::first_json_object;
use crate::prompts::plan_prompt;

/// Planner backed by a chat model asked for a JSON plan.
pub struct LlmPlanner {
    model: Arc<dyn ChatModel>,
    temperature: f64,
}

impl LlmPlanner {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Parse a model reply into a raw plan. Only the shape is checked here: a
/// non-string `query` is an error, mistyped chart or table hints are dropped.
pub fn parse_plan(reply: &str) -> Result<RawPlan, CollaboratorError> {
    let json = first_json_object(reply).ok_or_else(|| {
        CollaboratorError::MalformedOutput(format!("no JSON object in planner reply: {}", preview(reply)))
    })?;
    serde_json::from_str(json)
        .map_err(|e| CollaboratorError::MalformedOutput(format!("invalid plan JSON: {e}")))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    #[instrument(skip_all, fields(model = %self.model.model()))]
    async fn generate_plan(&self, question: &str) -> Result<RawPlan, CollaboratorError> {
        let request = ChatRequest::prompt(plan_prompt(question))
            .with_temperature(self.temperature)
            .json();
        let reply = self.model.complete(&request).await?;
        let plan = parse_plan(&reply)?;
        debug!(
            has_query = plan.query.is_some(),
            has_chart = plan.chart_spec.is_some(),
            "plan received"
        );
        Ok(plan)
    }
}
