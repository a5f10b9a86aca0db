//! Result encoder
//!
//! Turns a handler result into the response object the serverless driver
//! parses. The driver reads each row positionally against `fields`, so the
//! projection order is the schema order and never the record's key order.

use serde::{Deserialize, Serialize};

use neonmock_common::{ColumnDescriptor, CommandKind, MockResult, RowRecord, Schema, Value};

use crate::registry::QueryResult;

/// One query's response body. These four keys are the whole contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub rows: Vec<Vec<Value>>,
    pub fields: Vec<ColumnDescriptor>,
    pub row_count: u64,
    pub command: CommandKind,
}

/// Project one record onto the schema's column order
pub fn encode_row(schema: &Schema, record: &RowRecord) -> MockResult<Vec<Value>> {
    schema.check_record(record)?;
    Ok(schema
        .columns()
        .iter()
        .map(|c| record.get(&c.name).cloned().unwrap_or(Value::Null))
        .collect())
}

/// Encode a handler result against the declared schema
pub fn encode(schema: &Schema, result: &QueryResult) -> MockResult<QueryResponse> {
    let rows = result
        .rows
        .iter()
        .map(|record| encode_row(schema, record))
        .collect::<MockResult<Vec<_>>>()?;

    Ok(QueryResponse {
        rows,
        fields: schema.columns().to_vec(),
        row_count: result.row_count(),
        command: result.command,
    })
}
