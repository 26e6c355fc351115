use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use adlens_core::errors::CollaboratorError;
use adlens_core::provider::{ChatModel, ChatRequest};
use adlens_core::table::Table;
use adlens_core::Synthesizer;

use crate::prompts::insights_prompt;

/// Narrative writer backed by a chat model.
pub struct LlmSynthesizer {
    model: Arc<dyn ChatModel>,
    temperature: f64,
}

impl LlmSynthesizer {
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

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    #[instrument(skip_all, fields(model = %self.model.model(), rows = table.row_count()))]
    async fn synthesize(
        &self,
        question: &str,
        table: &Table,
        calculation_log: &[String],
    ) -> Result<String, CollaboratorError> {
        let prompt = insights_prompt(question, &table.to_text(), calculation_log);
        let request = ChatRequest::prompt(prompt).with_temperature(self.temperature);
        let reply = self.model.complete(&request).await?;

        let narrative = reply.trim();
        if narrative.is_empty() {
            return Err(CollaboratorError::MalformedOutput("empty narrative".into()));
        }
        debug!(chars = narrative.len(), "narrative received");
        Ok(narrative.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockChatModel, MockReply};
    use adlens_core::table::Value;

    fn one_row() -> Table {
        Table::new(
            vec!["spend".into(), "clicks".into(), "cost_per_click".into()],
            vec![vec![Value::Float(200.0), Value::Float(20.0), Value::Float(10.0)]],
        )
    }

    #[tokio::test]
    async fn synthesize_sends_table_text_and_log() {
        let model = Arc::new(MockChatModel::new(vec![MockReply::text("  CPC is 10.  \n")]));
        let synth = LlmSynthesizer::new(model.clone());
        let log = vec!["cost_per_click = spend / clicks (0 when clicks <= 0)".to_string()];

        let narrative = synth.synthesize("what is my CPC?", &one_row(), &log).await.unwrap();
        assert_eq!(narrative, "CPC is 10.");

        let request = &model.requests()[0];
        assert!(!request.json_output);
        let prompt = &request.messages[0].content;
        assert!(prompt.contains("what is my CPC?"));
        assert!(prompt.contains("cost_per_click"));
        assert!(prompt.contains("10.0"));
    }

    #[tokio::test]
    async fn blank_reply_is_malformed() {
        let model = Arc::new(MockChatModel::new(vec![MockReply::text("   ")]));
        let err = LlmSynthesizer::new(model)
            .synthesize("q", &one_row(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::MalformedOutput(_)));
    }
}
