use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use adlens_core::errors::{CollaboratorError, GatewayError};
use adlens_core::plan::{RawChartSpec, RawPlan};
use adlens_core::state::Stage;
use adlens_core::table::{Table, Value};
use adlens_core::{Planner, QueryRunner, RunResult, Synthesizer};
use adlens_engine::{Pipeline, PipelineConfig, PipelineError, StageEvent, SvgChartRenderer};
use adlens_llm::{LlmPlanner, LlmSynthesizer, MockChatModel, MockReply};
use adlens_store::{seed_demo, Database, SqliteQueryRunner};

const SPEND_BY_CAMPAIGN: &str = "SELECT c.campaign_name, SUM(dp.spend) AS spend, SUM(dp.clicks) AS clicks, \
     SUM(dp.impressions) AS impressions, SUM(dp.conversions) AS conversions \
     FROM daily_performance dp JOIN campaigns c ON dp.campaign_id = c.campaign_id \
     GROUP BY c.campaign_name ORDER BY c.campaign_name";

struct StaticPlanner(RawPlan);

#[async_trait]
impl Planner for StaticPlanner {
    async fn generate_plan(&self, _question: &str) -> Result<RawPlan, CollaboratorError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct RecordingSynthesizer {
    calls: Mutex<Vec<(String, Table, Vec<String>)>>,
}

impl RecordingSynthesizer {
    fn calls(&self) -> Vec<(String, Table, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for RecordingSynthesizer {
    async fn synthesize(
        &self,
        question: &str,
        table: &Table,
        calculation_log: &[String],
    ) -> Result<String, CollaboratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((question.to_string(), table.clone(), calculation_log.to_vec()));
        Ok(format!("{} rows analysed", table.row_count()))
    }
}

/// Wraps a runner and counts calls.
struct CountingRunner<R> {
    inner: R,
    calls: AtomicUsize,
}

impl<R> CountingRunner<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: QueryRunner> QueryRunner for CountingRunner<R> {
    async fn run_query(&self, query: &str) -> Result<Table, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.run_query(query).await
    }
}

struct FailingRunner;

#[async_trait]
impl QueryRunner for FailingRunner {
    async fn run_query(&self, _query: &str) -> Result<Table, CollaboratorError> {
        Err(CollaboratorError::Retrieval("connection reset".into()))
    }
}

fn seeded_runner() -> SqliteQueryRunner {
    let db = Database::in_memory().unwrap();
    seed_demo(&db).unwrap();
    SqliteQueryRunner::new(db)
}

fn plan(query: Option<&str>, show_table: Option<bool>, chart: Option<(&str, &str, &str)>) -> RawPlan {
    RawPlan {
        query: query.map(String::from),
        show_table,
        chart_spec: chart.map(|(x, y, title)| RawChartSpec {
            chart_type: Some("bar".into()),
            x_column: Some(x.into()),
            y_column: Some(y.into()),
            title: Some(title.into()),
        }),
    }
}

fn drain(rx: &mut broadcast::Receiver<StageEvent>) -> Vec<Stage> {
    let mut stages = Vec::new();
    while let Ok(event) = rx.try_recv() {
        stages.push(event.stage);
    }
    stages
}

#[tokio::test]
async fn single_row_cost_per_click_without_chart() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let (tx, mut rx) = broadcast::channel(16);
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(
            Some("SELECT 200 AS spend, 20 AS clicks"),
            Some(false),
            None,
        ))),
        Arc::new(seeded_runner()),
        synth.clone(),
    )
    .on_stage(tx)
    .build();

    let output = pipeline.run("what is my cost per click?").await.unwrap();

    assert_eq!(output.table.columns, vec!["spend", "clicks", "cost_per_click"]);
    assert_eq!(output.table.rows, vec![vec![Value::Float(200.0), Value::Float(20.0), Value::Float(10.0)]]);
    assert_eq!(output.calculation_log.len(), 1);
    assert!(output.calculation_log[0].starts_with("cost_per_click = "));
    assert!(output.chart_reference.is_none());
    assert!(!output.show_table);
    assert_eq!(output.narrative, "1 rows analysed");

    let calls = synth.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "what is my cost per click?");
    assert_eq!(calls[0].1, output.table);
    assert_eq!(calls[0].2, output.calculation_log);

    assert_eq!(
        drain(&mut rx),
        vec![
            Stage::Planning,
            Stage::Executing,
            Stage::DerivingMetrics,
            Stage::Synthesizing,
            Stage::Done
        ]
    );
}

#[tokio::test]
async fn missing_query_aborts_before_execution() {
    let runner = Arc::new(CountingRunner::new(seeded_runner()));
    let synth = Arc::new(RecordingSynthesizer::default());
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some("   "), None, None))),
        runner.clone(),
        synth.clone(),
    )
    .build();

    let err = pipeline.run("anything").await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingQuery));
    assert_eq!(runner.calls(), 0);
    assert!(synth.calls().is_empty());

    let result = pipeline.answer("anything").await;
    assert_eq!(result.error(), Some("the plan has no query to execute"));
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        serde_json::json!({"error": "the plan has no query to execute"})
    );
}

#[tokio::test]
async fn empty_result_skips_synthesis() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let config = PipelineConfig {
        empty_data_message: "nothing here".into(),
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::builder(
        config,
        Arc::new(StaticPlanner(plan(
            Some("SELECT campaign_name FROM campaigns WHERE campaign_id = 999"),
            None,
            None,
        ))),
        Arc::new(seeded_runner()),
        synth.clone(),
    )
    .build();

    let output = pipeline.run("campaign 999?").await.unwrap();
    assert_eq!(output.narrative, "nothing here");
    assert!(output.table.is_empty());
    assert!(output.calculation_log.is_empty());
    assert!(output.show_table);
    assert!(synth.calls().is_empty());
}

#[tokio::test]
async fn invalid_sql_degrades_to_empty_data() {
    let synth = Arc::new(RecordingSynthesizer::default());
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some("SELECT nope FROM nowhere"), None, None))),
        Arc::new(seeded_runner()),
        synth.clone(),
    )
    .build();

    let output = pipeline.run("q").await.unwrap();
    assert_eq!(output.narrative, PipelineConfig::default().empty_data_message);
    assert!(output.table.is_empty());
    assert!(synth.calls().is_empty());
}

#[tokio::test]
async fn retrieval_fault_fails_the_run() {
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some("SELECT 1"), None, None))),
        Arc::new(FailingRunner),
        Arc::new(RecordingSynthesizer::default()),
    )
    .build();

    let err = pipeline.run("q").await.unwrap_err();
    assert!(matches!(err, PipelineError::Retrieval(_)));

    let result = pipeline.answer("q").await;
    assert!(result.is_error());
    assert!(result.output().is_none());
    assert!(result.error().unwrap().contains("connection reset"));
}

#[tokio::test]
async fn llm_collaborators_end_to_end_with_chart() {
    let dir = tempfile::tempdir().unwrap();
    let plan_reply = serde_json::json!({
        "query": SPEND_BY_CAMPAIGN,
        "show_table": true,
        "chart_spec": {
            "chart_type": "bar",
            "x_column": "campaign_name",
            "y_column": "cost_per_click",
            "title": "CPC by campaign"
        }
    });
    // cost_per_click is derived, not selected, so the chart is discarded.
    let model = Arc::new(MockChatModel::new(vec![
        MockReply::text(format!("Here you go:\n```json\n{plan_reply}\n```")),
        MockReply::text("Spring Sale has the lowest CPC."),
    ]));
    let (tx, mut rx) = broadcast::channel(16);
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(LlmPlanner::new(model.clone())),
        Arc::new(seeded_runner()),
        Arc::new(LlmSynthesizer::new(model.clone())),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(dir.path())))
    .on_stage(tx)
    .build();

    let output = pipeline.run("Which campaign has the best CPC?").await.unwrap();

    assert_eq!(output.narrative, "Spring Sale has the lowest CPC.");
    assert_eq!(output.table.row_count(), 4);
    assert_eq!(output.calculation_log.len(), 3);
    assert!(output.chart_reference.is_none());
    assert!(!drain(&mut rx).contains(&Stage::RenderingChart));

    let requests = model.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].json_output);
    let insights = &requests[1].messages[0].content;
    assert!(insights.contains("Which campaign has the best CPC?"));
    assert!(insights.contains("cost_per_acquisition = spend / conversions"));
    assert!(insights.contains("Spring Sale"));
}

#[tokio::test]
async fn mistyped_chart_intent_only_loses_the_chart() {
    let dir = tempfile::tempdir().unwrap();
    let plan_reply = serde_json::json!({
        "query": SPEND_BY_CAMPAIGN,
        "show_table": "yes",
        "chart_spec": "none"
    });
    let model = Arc::new(MockChatModel::new(vec![
        MockReply::text(plan_reply.to_string()),
        MockReply::text("Spend is concentrated in two campaigns."),
    ]));
    let (tx, mut rx) = broadcast::channel(16);
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(LlmPlanner::new(model.clone())),
        Arc::new(seeded_runner()),
        Arc::new(LlmSynthesizer::new(model)),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(dir.path())))
    .on_stage(tx)
    .build();

    let output = pipeline.run("Where does spend go?").await.unwrap();

    assert_eq!(output.narrative, "Spend is concentrated in two campaigns.");
    assert!(output.show_table);
    assert_eq!(output.table.row_count(), 4);
    assert!(output.chart_reference.is_none());
    assert!(!drain(&mut rx).contains(&Stage::RenderingChart));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn chart_is_rendered_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, mut rx) = broadcast::channel(16);
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(
            Some(SPEND_BY_CAMPAIGN),
            Some(true),
            Some(("campaign_name", "spend", "Spend by campaign")),
        ))),
        Arc::new(seeded_runner()),
        Arc::new(RecordingSynthesizer::default()),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(dir.path())))
    .on_stage(tx)
    .build();

    let (first, second) = tokio::join!(pipeline.run("spend?"), pipeline.run("spend again?"));
    let first = first.unwrap().chart_reference.unwrap();
    let second = second.unwrap().chart_reference.unwrap();

    assert_ne!(first.path(), second.path());
    assert!(first.path().starts_with(dir.path()));
    assert!(first.path().exists());
    assert!(second.path().exists());

    let rendering = drain(&mut rx)
        .into_iter()
        .filter(|stage| *stage == Stage::RenderingChart)
        .count();
    assert_eq!(rendering, 2);
}

#[tokio::test]
async fn failed_render_still_completes() {
    let dir = tempfile::tempdir().unwrap();
    // The query mentions campaign_name but aliases it, so the renderer cannot find it.
    let query = "SELECT c.campaign_name AS name, SUM(dp.spend) AS spend \
                 FROM daily_performance dp JOIN campaigns c ON dp.campaign_id = c.campaign_id \
                 GROUP BY c.campaign_name";
    let (tx, mut rx) = broadcast::channel(16);
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(
            Some(query),
            None,
            Some(("campaign_name", "spend", "Spend")),
        ))),
        Arc::new(seeded_runner()),
        Arc::new(RecordingSynthesizer::default()),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(dir.path())))
    .on_stage(tx)
    .build();

    let output = pipeline.run("spend by campaign").await.unwrap();
    assert!(output.chart_reference.is_none());
    assert_eq!(output.narrative, "4 rows analysed");
    assert!(drain(&mut rx).contains(&Stage::RenderingChart));
}

#[tokio::test]
async fn charts_disabled_never_render() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        charts_enabled: false,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::builder(
        config,
        Arc::new(StaticPlanner(plan(
            Some(SPEND_BY_CAMPAIGN),
            None,
            Some(("campaign_name", "spend", "Spend")),
        ))),
        Arc::new(seeded_runner()),
        Arc::new(RecordingSynthesizer::default()),
    )
    .chart_renderer(Arc::new(SvgChartRenderer::new(dir.path())))
    .build();

    let output = pipeline.run("spend").await.unwrap();
    assert!(output.chart_reference.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn synthesis_fault_returns_error_only() {
    let model = Arc::new(MockChatModel::new(vec![MockReply::Error(
        GatewayError::Timeout(std::time::Duration::from_secs(120)),
    )]));
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some(SPEND_BY_CAMPAIGN), None, None))),
        Arc::new(seeded_runner()),
        Arc::new(LlmSynthesizer::new(model)),
    )
    .build();

    let result = pipeline.answer("spend").await;
    let json = serde_json::to_value(&result).unwrap();
    let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["error"]);
    assert!(result.error().unwrap().starts_with("narrative synthesis failed"));
}

#[tokio::test]
async fn planner_fault_fails_the_run() {
    let model = Arc::new(MockChatModel::new(vec![MockReply::text("I am not sure.")]));
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(LlmPlanner::new(model)),
        Arc::new(seeded_runner()),
        Arc::new(RecordingSynthesizer::default()),
    )
    .build();

    let err = pipeline.run("q").await.unwrap_err();
    assert!(matches!(err, PipelineError::Planning(CollaboratorError::MalformedOutput(_))));
}

#[tokio::test]
async fn plan_dry_run_sanitizes_without_executing() {
    let runner = Arc::new(CountingRunner::new(seeded_runner()));
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some("SELECT a, b FROM t"), None, Some(("a", "c", "T"))))),
        runner.clone(),
        Arc::new(RecordingSynthesizer::default()),
    )
    .build();

    let frozen = pipeline.plan("q").await.unwrap();
    assert!(frozen.chart_spec.is_none());
    assert!(frozen.show_table);
    assert_eq!(runner.calls(), 0);
}

#[tokio::test]
async fn completed_result_serializes_flat() {
    let pipeline = Pipeline::builder(
        PipelineConfig::default(),
        Arc::new(StaticPlanner(plan(Some("SELECT 50 AS clicks, 1000 AS impressions"), None, None))),
        Arc::new(seeded_runner()),
        Arc::new(RecordingSynthesizer::default()),
    )
    .build();

    let result = pipeline.answer("ctr?").await;
    let RunResult::Completed(output) = &result else {
        panic!("expected completed run, got {result:?}");
    };
    assert_eq!(output.table.rows[0][2], Value::Float(5.0));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["show_table"], true);
    assert_eq!(json["chart_reference"], serde_json::Value::Null);
    assert_eq!(json["table"]["columns"][2], "click_through_rate");
    assert_eq!(json["calculation_log"].as_array().unwrap().len(), 1);
}
