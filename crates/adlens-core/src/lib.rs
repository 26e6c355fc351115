pub mod collaborators;
pub mod errors;
pub mod ids;
pub mod plan;
pub mod provider;
pub mod result;
pub mod state;
pub mod table;

pub use collaborators::{ChartReference, ChartRenderer, Planner, QueryRunner, Synthesizer};
pub use errors::{CollaboratorError, GatewayError, StateError};
pub use ids::RunId;
pub use plan::{ChartSpec, ChartType, Plan, RawChartSpec, RawPlan};
pub use result::{RunOutput, RunResult};
pub use state::{RunState, Stage};
pub use table::{Table, TableError, Value};
