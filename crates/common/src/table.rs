//! In-memory row store for one virtual table

use std::sync::Arc;
use tracing::debug;

use crate::error::{MockError, MockResult};
use crate::types::{RowRecord, Schema, Value};

/// Ordered rows of one virtual table, owned by a single scenario.
///
/// Insertion order is the order a select returns. Every stored record has
/// exactly the declared column set.
#[derive(Debug, Clone)]
pub struct TableState {
    schema: Arc<Schema>,
    rows: Vec<RowRecord>,
}

impl TableState {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Create a table pre-populated with `rows`
    pub fn with_rows(schema: Arc<Schema>, rows: Vec<RowRecord>) -> MockResult<Self> {
        let mut table = Self::new(schema);
        table.seed(rows)?;
        Ok(table)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn rows(&self) -> &[RowRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Generated identifier for the next insert
    pub fn next_id(&self) -> i64 {
        self.rows.len() as i64 + 1
    }

    /// Append several records, all or nothing
    pub fn seed(&mut self, rows: Vec<RowRecord>) -> MockResult<()> {
        for row in &rows {
            self.schema.check_record(row)?;
        }
        self.rows.extend(rows);
        Ok(())
    }

    /// Append one record and return a reference to it
    pub fn push(&mut self, row: RowRecord) -> MockResult<&RowRecord> {
        self.schema.check_record(&row)?;
        self.rows.push(row);
        debug!(len = self.rows.len(), "appended row");
        Ok(&self.rows[self.rows.len() - 1])
    }

    /// Index of the single record whose `column` equals `value`
    pub fn find_unique(&self, column: &str, value: &Value) -> MockResult<usize> {
        if !self.schema.contains(column) {
            return Err(MockError::UnknownColumn(column.to_string()));
        }

        let mut matches = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.get(column).is_some_and(|v| v.loose_eq(value)))
            .map(|(i, _)| i);

        let first = matches.next().ok_or_else(|| MockError::RecordNotFound {
            column: column.to_string(),
            value: value.to_string(),
        })?;

        let extra = matches.count();
        if extra > 0 {
            return Err(MockError::AmbiguousRecord {
                column: column.to_string(),
                value: value.to_string(),
                count: extra + 1,
            });
        }
        Ok(first)
    }

    /// Set the given columns on the single matching record, in place
    pub fn update_unique<I>(&mut self, column: &str, value: &Value, set: I) -> MockResult<&RowRecord>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let idx = self.find_unique(column, value)?;
        let changes: Vec<(String, Value)> = set.into_iter().collect();
        for (name, _) in &changes {
            if !self.schema.contains(name) {
                return Err(MockError::UnknownColumn(name.clone()));
            }
        }

        let row = &mut self.rows[idx];
        for (name, new_value) in changes {
            row.set(name, new_value);
        }
        debug!(index = idx, "updated row");
        Ok(&self.rows[idx])
    }

    /// Remove the single matching record; survivors keep their order
    pub fn remove_unique(&mut self, column: &str, value: &Value) -> MockResult<RowRecord> {
        let idx = self.find_unique(column, value)?;
        debug!(index = idx, "removed row");
        Ok(self.rows.remove(idx))
    }
}
