//! Canonical select/insert/update/delete handlers
//!
//! Handlers never interpret the statement text. A select returns the table
//! as-is; scenarios pre-filter their seed rows to the identity under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use neonmock_common::{CommandKind, MockResult, RowRecord, Value};

use crate::registry::{HandlerContext, Params, QueryHandler, QueryResult};

/// What a delete handler reports back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReturn {
    /// The rows left in the table after the delete
    #[default]
    Remaining,
    /// Only the removed row
    Removed,
}

/// What an insert handler reports back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertReturn {
    /// The appended row (`RETURNING *`)
    #[default]
    Row,
    /// Every row in the table after the append
    Table,
}

/// Return the current rows unfiltered
pub fn select_all() -> QueryHandler {
    Box::new(|_params: &Params, ctx: &mut HandlerContext<'_>| {
        Ok(QueryResult::new(CommandKind::Select, ctx.table.rows().to_vec()))
    })
}

/// Append a record built from the bound parameters.
///
/// `build` receives the parameters, the generated id (`len + 1`) and the
/// clock reading for timestamp columns.
pub fn insert<F>(returning: InsertReturn, build: F) -> QueryHandler
where
    F: Fn(&Params, i64, DateTime<Utc>) -> MockResult<RowRecord> + Send + Sync + 'static,
{
    Box::new(move |params: &Params, ctx: &mut HandlerContext<'_>| {
        let now = ctx.now();
        let record = build(params, ctx.table.next_id(), now)?;
        let appended = ctx.table.push(record)?.clone();
        let rows = match returning {
            InsertReturn::Row => vec![appended],
            InsertReturn::Table => ctx.table.rows().to_vec(),
        };
        Ok(QueryResult::new(CommandKind::Insert, rows).with_row_count(1))
    })
}

/// Insert returning the appended row
pub fn insert_returning<F>(build: F) -> QueryHandler
where
    F: Fn(&Params, i64, DateTime<Utc>) -> MockResult<RowRecord> + Send + Sync + 'static,
{
    insert(InsertReturn::Row, build)
}

/// Update the unique record whose `id_column` equals parameter `id_param`.
///
/// `changes` computes the `(column, value)` pairs to set; the mutated record
/// is returned.
pub fn update_by_id_with<F>(id_column: impl Into<String>, id_param: usize, changes: F) -> QueryHandler
where
    F: Fn(&Params, DateTime<Utc>) -> MockResult<Vec<(String, Value)>> + Send + Sync + 'static,
{
    let id_column = id_column.into();
    Box::new(move |params: &Params, ctx: &mut HandlerContext<'_>| {
        let id = params.get(id_param)?.clone();
        let now = ctx.now();
        let set = changes(params, now)?;
        let row = ctx.table.update_unique(&id_column, &id, set)?.clone();
        Ok(QueryResult::new(CommandKind::Update, vec![row]))
    })
}

/// Update handler that copies parameters straight into columns, optionally
/// stamping `touch` with the current time.
pub fn update_by_id(
    id_column: impl Into<String>,
    id_param: usize,
    set: &[(&str, usize)],
    touch: Option<&str>,
) -> QueryHandler {
    let set: Vec<(String, usize)> = set.iter().map(|(c, i)| (c.to_string(), *i)).collect();
    let touch = touch.map(str::to_string);
    update_by_id_with(id_column, id_param, move |params, now| {
        let mut changes = set
            .iter()
            .map(|(column, idx)| Ok((column.clone(), params.get(*idx)?.clone())))
            .collect::<MockResult<Vec<_>>>()?;
        if let Some(column) = &touch {
            changes.push((column.clone(), Value::Timestamp(now)));
        }
        Ok(changes)
    })
}

/// Remove the unique record whose `id_column` equals parameter `id_param`
pub fn delete_by_id(id_column: impl Into<String>, id_param: usize, returning: DeleteReturn) -> QueryHandler {
    let id_column = id_column.into();
    Box::new(move |params: &Params, ctx: &mut HandlerContext<'_>| {
        let id = params.get(id_param)?;
        let removed = ctx.table.remove_unique(&id_column, id)?;
        let rows = match returning {
            DeleteReturn::Remaining => ctx.table.rows().to_vec(),
            DeleteReturn::Removed => vec![removed],
        };
        Ok(QueryResult::new(CommandKind::Delete, rows).with_row_count(1))
    })
}
