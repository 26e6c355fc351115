use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::{debug, instrument, warn};

use adlens_core::errors::CollaboratorError;
use adlens_core::table::{Table, Value};
use adlens_core::QueryRunner;

use crate::database::Database;
use crate::error::StoreError;

/// Runs planner-written statements against the SQLite store.
///
/// Any failure of the statement itself (syntax, unknown column, write
/// attempt) yields an empty table and a warning. Only a failure to reach the
/// blocking worker is reported as an error.
#[derive(Clone)]
pub struct SqliteQueryRunner {
    db: Database,
}

impl SqliteQueryRunner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Synchronous execution; errors are returned, not swallowed.
    pub fn execute(&self, query: &str) -> Result<Table, StoreError> {
        self.db.with_conn(|conn| read_table(conn, query))
    }
}

fn is_read_statement(query: &str) -> bool {
    let keyword: String = query
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    keyword.eq_ignore_ascii_case("select") || keyword.eq_ignore_ascii_case("with")
}

fn read_table(conn: &Connection, query: &str) -> Result<Table, StoreError> {
    if !is_read_statement(query) {
        return Err(StoreError::Database("only SELECT/WITH statements are allowed".into()));
    }
    let mut stmt = conn.prepare(query)?;
    if !stmt.readonly() {
        return Err(StoreError::Database("only read-only statements are allowed".into()));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(to_value(row.get_ref(idx)?));
        }
        rows.push(values);
    }

    Ok(Table::new(columns, rows))
}

fn to_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Text(format!("<blob {} bytes>", bytes.len())),
    }
}

#[async_trait]
impl QueryRunner for SqliteQueryRunner {
    #[instrument(skip(self, query), fields(db = %self.db.path().display()))]
    async fn run_query(&self, query: &str) -> Result<Table, CollaboratorError> {
        let runner = self.clone();
        let statement = query.to_string();
        let outcome = tokio::task::spawn_blocking(move || runner.execute(&statement))
            .await
            .map_err(|e| CollaboratorError::Retrieval(format!("query worker failed: {e}")))?;

        match outcome {
            Ok(table) => {
                debug!(rows = table.row_count(), columns = table.columns.len(), "query executed");
                Ok(table)
            }
            Err(e) => {
                warn!(error = %e, query, "query failed, returning empty result");
                Ok(Table::empty())
            }
        }
    }
}
