pub mod database;
pub mod error;
pub mod query;
pub mod schema;
pub mod seed;

pub use database::Database;
pub use error::StoreError;
pub use query::SqliteQueryRunner;
pub use seed::seed_demo;
