//! Query registry: exact SQL text -> handler

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

use neonmock_common::{Clock, CommandKind, MockError, MockResult, RowRecord, TableState, Value};

use crate::interceptor::Phase;

/// A registered query handler.
///
/// Receives the positional bound parameters and the scenario context; may
/// read and mutate the table.
pub type QueryHandler =
    Box<dyn Fn(&Params, &mut HandlerContext<'_>) -> MockResult<QueryResult> + Send + Sync>;

/// Positional bound parameters of one statement (`$1` is index 0)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> MockResult<&Value> {
        self.0.get(index).ok_or(MockError::MissingParam {
            index,
            len: self.0.len(),
        })
    }

    pub fn text(&self, index: usize) -> MockResult<String> {
        let value = self.get(index)?;
        value.as_text().ok_or_else(|| MockError::InvalidParam {
            index,
            expected: "text",
            found: value.kind().to_string(),
        })
    }

    pub fn int(&self, index: usize) -> MockResult<i64> {
        let value = self.get(index)?;
        value.as_int().ok_or_else(|| MockError::InvalidParam {
            index,
            expected: "integer",
            found: value.to_string(),
        })
    }

    pub fn bool(&self, index: usize) -> MockResult<bool> {
        let value = self.get(index)?;
        value.as_bool().ok_or_else(|| MockError::InvalidParam {
            index,
            expected: "boolean",
            found: value.to_string(),
        })
    }
}

impl From<Vec<Value>> for Params {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Per-invocation view of the scenario handed to a handler
pub struct HandlerContext<'a> {
    pub table: &'a mut TableState,
    pub clock: &'a dyn Clock,
}

impl<'a> HandlerContext<'a> {
    pub fn new(table: &'a mut TableState, clock: &'a dyn Clock) -> Self {
        Self { table, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// What a handler produced: the command tag plus affected/returned rows
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub command: CommandKind,
    pub rows: Vec<RowRecord>,
    row_count: Option<u64>,
}

impl QueryResult {
    pub fn new(command: CommandKind, rows: Vec<RowRecord>) -> Self {
        Self {
            command,
            rows,
            row_count: None,
        }
    }

    /// Report an affected-row count that differs from the returned rows
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.row_count = Some(row_count);
        self
    }

    pub fn row_count(&self) -> u64 {
        self.row_count.unwrap_or(self.rows.len() as u64)
    }
}

/// Mapping from literal statement text to handler. Built fresh per scenario.
#[derive(Default)]
pub struct QueryRegistry {
    handlers: HashMap<String, QueryHandler>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the exact statement `sql`. A second
    /// registration of the same text replaces the first.
    pub fn register<F>(&mut self, sql: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&Params, &mut HandlerContext<'_>) -> MockResult<QueryResult> + Send + Sync + 'static,
    {
        let sql = sql.into();
        if self.handlers.insert(sql.clone(), Box::new(handler)).is_some() {
            warn!(sql = %sql, "replacing previously registered handler");
        }
        self
    }

    /// Exact-text lookup. No whitespace or case normalization.
    pub fn lookup(&self, sql: &str) -> Option<&QueryHandler> {
        self.handlers.get(sql)
    }

    /// Look up and run the handler for `sql`
    pub fn dispatch(
        &self,
        sql: &str,
        params: &Params,
        ctx: &mut HandlerContext<'_>,
    ) -> MockResult<QueryResult> {
        let handler = self.lookup(sql).ok_or_else(|| {
            warn!(sql = %sql, "unmatched query");
            MockError::UnmatchedQuery {
                sql: sql.to_string(),
            }
        })?;
        debug!(phase = %Phase::Matched, sql = %sql, params = params.len());
        handler(params, ctx)
    }

    /// Registered statements, sorted
    pub fn statements(&self) -> Vec<&str> {
        let mut sql: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        sql.sort_unstable();
        sql
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for QueryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRegistry")
            .field("statements", &self.statements())
            .finish()
    }
}
