//! Per-scenario context: schema, table, registry and clock
//!
//! A `Scenario` is the only owner of its table. Every dispatch takes the
//! scenario's exclusive section, so overlapping requests from one page are
//! applied one at a time in arrival order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use neonmock_common::{
    Clock, FixedClock, MockError, MockResult, RowRecord, Schema, TableState,
};

use crate::encoder::{encode, QueryResponse};
use crate::interceptor::Phase;
use crate::protocol::QueryRequest;
use crate::registry::{HandlerContext, Params, QueryRegistry, QueryResult};

/// A failed request, kept for teardown assertions and debugging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub phase: Phase,
    pub sql: Option<String>,
    pub code: String,
    pub message: String,
    /// The mock itself is wrong, not the request the application sent
    pub defect: bool,
}

impl Failure {
    pub fn new(phase: Phase, sql: Option<&str>, err: &MockError) -> Self {
        Self {
            phase,
            sql: sql.map(str::to_string),
            code: err.code().to_string(),
            message: err.to_string(),
            defect: err.is_harness_defect(),
        }
    }
}

/// A failed statement of a transaction batch
#[derive(Debug, Error)]
#[error("batch statement {index} failed: {error}")]
pub struct BatchError {
    /// Zero-based position in the batch
    pub index: usize,
    pub sql: String,
    #[source]
    pub error: MockError,
}

impl From<BatchError> for MockError {
    fn from(err: BatchError) -> Self {
        err.error
    }
}

pub struct Scenario {
    name: String,
    schema: Arc<Schema>,
    registry: QueryRegistry,
    table: Mutex<TableState>,
    clock: Box<dyn Clock>,
    failures: Mutex<Vec<Failure>>,
}

impl Scenario {
    pub fn builder(schema: Schema) -> ScenarioBuilder {
        ScenarioBuilder::new(schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    /// Dispatch one statement and encode its result. The table is restored
    /// if either step fails.
    pub fn execute(&self, sql: &str, params: impl Into<Params>) -> MockResult<QueryResponse> {
        let params = params.into();
        let mut table = self.table.lock();
        let saved = table.clone();
        let outcome = self.run(&mut table, sql, &params);
        if outcome.is_err() {
            *table = saved;
        }
        outcome
    }

    /// Run a batch as one transaction: all statements run inside a single
    /// exclusive section and the table is restored if any of them fails.
    pub fn execute_batch(&self, queries: &[QueryRequest]) -> Result<Vec<QueryResponse>, BatchError> {
        let mut table = self.table.lock();
        let saved = table.clone();

        let mut responses = Vec::with_capacity(queries.len());
        for (index, query) in queries.iter().enumerate() {
            let params = Params::new(query.params.clone());
            match self.run(&mut table, &query.query, &params) {
                Ok(response) => responses.push(response),
                Err(error) => {
                    warn!(index, sql = %query.query, "batch statement failed, rolling back");
                    *table = saved;
                    return Err(BatchError {
                        index,
                        sql: query.query.clone(),
                        error,
                    });
                }
            }
        }
        Ok(responses)
    }

    fn run(&self, table: &mut TableState, sql: &str, params: &Params) -> MockResult<QueryResponse> {
        let result = {
            let mut ctx = HandlerContext::new(table, self.clock.as_ref());
            self.registry.dispatch(sql, params, &mut ctx)?
        };
        debug!(phase = %Phase::Executed, rows = result.rows.len());

        let response = encode(&self.schema, &result)?;
        debug!(
            phase = %Phase::Encoded,
            command = %response.command,
            row_count = response.row_count
        );
        Ok(response)
    }

    /// Consistent copy of the current rows
    pub fn snapshot(&self) -> Vec<RowRecord> {
        self.table.lock().rows().to_vec()
    }

    pub fn record_failure(&self, failure: Failure) {
        self.failures.lock().push(failure);
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.lock().clone()
    }

    /// `Err` with every recorded failure, if any
    pub fn check_failures(&self) -> Result<(), Vec<Failure>> {
        let failures = self.failures();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }

    /// Teardown assertion: panics listing each failed request
    pub fn assert_no_failures(&self) {
        if let Err(failures) = self.check_failures() {
            let lines: Vec<String> = failures
                .iter()
                .map(|f| {
                    let tag = if f.defect { " mock defect" } else { "" };
                    match &f.sql {
                        Some(sql) => format!("  [{}{}] {} ({})", f.code, tag, f.message, sql),
                        None => format!("  [{}{}] {}", f.code, tag, f.message),
                    }
                })
                .collect();
            panic!(
                "scenario '{}' saw {} failed request(s):\n{}",
                self.name,
                failures.len(),
                lines.join("\n")
            );
        }
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Scenario`]
pub struct ScenarioBuilder {
    name: String,
    schema: Arc<Schema>,
    seed: Vec<RowRecord>,
    registry: QueryRegistry,
    clock: Option<Box<dyn Clock>>,
}

impl ScenarioBuilder {
    pub fn new(schema: Schema) -> Self {
        Self {
            name: "scenario".to_string(),
            schema: Arc::new(schema),
            seed: Vec::new(),
            registry: QueryRegistry::new(),
            clock: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Initial rows, in order
    pub fn seed(mut self, rows: impl IntoIterator<Item = RowRecord>) -> Self {
        self.seed.extend(rows);
        self
    }

    pub fn row(mut self, row: RowRecord) -> Self {
        self.seed.push(row);
        self
    }

    /// Register a handler for the exact statement `sql`
    pub fn on<F>(mut self, sql: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Params, &mut HandlerContext<'_>) -> MockResult<QueryResult> + Send + Sync + 'static,
    {
        self.registry.register(sql, handler);
        self
    }

    /// Clock used for generated timestamps. Defaults to a [`FixedClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    pub fn boxed_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> MockResult<Scenario> {
        let table = TableState::with_rows(self.schema.clone(), self.seed)?;
        if self.registry.is_empty() {
            warn!(scenario = %self.name, "scenario has no registered queries");
        }
        debug!(
            scenario = %self.name,
            rows = table.len(),
            queries = self.registry.len(),
            "built scenario"
        );
        Ok(Scenario {
            name: self.name,
            schema: self.schema,
            registry: self.registry,
            table: Mutex::new(table),
            clock: self.clock.unwrap_or_else(|| Box::new(FixedClock::default())),
            failures: Mutex::new(Vec::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{insert_returning, select_all};
    use neonmock_common::{ColumnDescriptor, CommandKind, TypeOid, Value};

    fn schema() -> Schema {
        Schema::new(vec![
            ColumnDescriptor::new("id", TypeOid::INT4),
            ColumnDescriptor::new("title", TypeOid::TEXT),
        ])
        .unwrap()
    }

    fn scenario() -> Scenario {
        Scenario::builder(schema())
            .name("batch")
            .on("SELECT * FROM todos;", select_all())
            .on(
                "INSERT INTO todos (title) VALUES ($1) RETURNING *;",
                insert_returning(|params, id, _| {
                    Ok(RowRecord::new().with("id", id).with("title", params.text(0)?))
                }),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_rejects_bad_seed() {
        let err = Scenario::builder(schema())
            .row(RowRecord::new().with("id", 1))
            .build()
            .unwrap_err();
        assert!(matches!(err, MockError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let scenario = scenario();
        let insert = QueryRequest {
            query: "INSERT INTO todos (title) VALUES ($1) RETURNING *;".to_string(),
            params: vec![Value::from("first")],
        };
        let unmatched = QueryRequest {
            query: "DROP TABLE todos;".to_string(),
            params: vec![],
        };

        let err = scenario
            .execute_batch(&[insert.clone(), unmatched])
            .unwrap_err();
        assert_eq!(err.index, 1);
        assert_eq!(err.sql, "DROP TABLE todos;");
        assert!(matches!(err.error, MockError::UnmatchedQuery { .. }));
        assert!(scenario.snapshot().is_empty());

        let responses = scenario.execute_batch(&[insert.clone(), insert]).unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(scenario.snapshot().len(), 2);
    }

    #[test]
    fn test_failed_encode_restores_table() {
        const SQL: &str = "INSERT INTO todos (title) VALUES ($1) RETURNING *;";
        let scenario = Scenario::builder(schema())
            .on(SQL, |params, ctx| {
                let row = RowRecord::new().with("id", 1).with("title", params.text(0)?);
                ctx.table.push(row.clone())?;
                Ok(QueryResult::new(CommandKind::Insert, vec![row.with("colour", "green")]))
            })
            .build()
            .unwrap();

        let err = scenario
            .execute(SQL, vec![Value::from("Make tea")])
            .unwrap_err();
        assert!(matches!(err, MockError::ShapeMismatch { .. }));
        assert!(scenario.snapshot().is_empty());
    }

    #[test]
    fn test_failed_handler_restores_table() {
        const SQL: &str = "DELETE FROM todos;";
        let scenario = Scenario::builder(schema())
            .row(RowRecord::new().with("id", 1).with("title", "Make tea"))
            .on(SQL, |params, ctx| {
                ctx.table.remove_unique("id", &Value::Int(1))?;
                params.int(0)?;
                Ok(QueryResult::new(CommandKind::Delete, vec![]))
            })
            .build()
            .unwrap();

        let err = scenario.execute(SQL, Vec::<Value>::new()).unwrap_err();
        assert!(matches!(err, MockError::MissingParam { .. }));
        assert_eq!(scenario.snapshot().len(), 1);
    }

    #[test]
    fn test_failures_are_recorded() {
        let scenario = scenario();
        assert!(scenario.check_failures().is_ok());
        let err = MockError::UnmatchedQuery {
            sql: "DROP TABLE todos;".to_string(),
        };
        scenario.record_failure(Failure::new(Phase::Failed, Some("DROP TABLE todos;"), &err));
        let failures = scenario.check_failures().unwrap_err();
        assert_eq!(failures[0].code, "unmatched_query");
        assert!(failures[0].defect);

        let err = MockError::MissingParam { index: 0, len: 0 };
        scenario.record_failure(Failure::new(Phase::Failed, None, &err));
        assert!(!scenario.failures()[1].defect);
    }

    #[test]
    #[should_panic(expected = "[unmatched_query mock defect]")]
    fn test_assert_no_failures_panics() {
        let scenario = scenario();
        let err = MockError::UnmatchedQuery {
            sql: "DROP TABLE todos;".to_string(),
        };
        scenario.record_failure(Failure::new(Phase::Failed, Some("DROP TABLE todos;"), &err));
        scenario.assert_no_failures();
    }
}
