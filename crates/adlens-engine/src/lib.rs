//! The question-answering core: plan sanitization, execution, metric
//! derivation, optional chart rendering and narrative synthesis, driven as a
//! single-pass state machine over [`adlens_core::RunState`].

pub mod chart;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod router;
pub mod supervisor;

pub use chart::{NoopChartRenderer, SvgChartRenderer};
pub use error::PipelineError;
pub use metrics::{derive, MetricDefinition, METRICS};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineConfig, StageEvent};
pub use router::{decide, Route};
pub use supervisor::validate;
