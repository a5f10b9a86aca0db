//! Declarative YAML mock specifications
//!
//! A spec describes one virtual table and the literal statements the
//! application under test sends against it:
//!
//! ```yaml
//! name: todos
//! id_column: id
//! columns:
//!   - { name: id, dataTypeID: 25 }
//!   - { name: title, dataTypeID: 25 }
//!   - { name: done, dataTypeID: 16 }
//! seed:
//!   - { id: 1, title: Make a cup of tea, done: "false" }
//! queries:
//!   "SELECT * FROM todos WHERE user_id = $1;":
//!     kind: select
//!   "UPDATE todos SET done = $1 WHERE id = $2 RETURNING *;":
//!     kind: update
//!     where_param: 2
//!     set: { done: $1 }
//! ```
//!
//! Template values are literals, `$N` (bound parameter N, optionally cast
//! with `::int`, `::text` or `::bool`), `$next_id` or `$now`. A literal
//! string starting with `$` is written `$$...`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use neonmock_common::{
    Clock, ColumnDescriptor, MockError, MockResult, RowRecord, Schema, Value,
};

use crate::handlers::{self, DeleteReturn, InsertReturn};
use crate::registry::Params;
use crate::scenario::{Scenario, ScenarioBuilder};

/// A complete mock spec parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSpec {
    /// Unique name for this mock
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Declared result columns, in wire order
    pub columns: Vec<ColumnDescriptor>,

    /// Column used by update and delete lookups
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Initial rows
    #[serde(default)]
    pub seed: Vec<BTreeMap<String, Template>>,

    /// Literal statement text -> behavior
    pub queries: BTreeMap<String, QuerySpec>,
}

fn default_id_column() -> String {
    "id".to_string()
}

/// Behavior of one registered statement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuerySpec {
    /// Return every row
    Select,

    /// Append a row built from `values`
    Insert {
        values: BTreeMap<String, Template>,
        #[serde(default)]
        returning: InsertReturn,
    },

    /// Set columns on the row whose id equals parameter `where_param`
    Update {
        where_param: usize,
        set: BTreeMap<String, Template>,
        #[serde(default)]
        touch: Option<String>,
    },

    /// Remove the row whose id equals parameter `where_param`
    Delete {
        where_param: usize,
        #[serde(default)]
        returning: DeleteReturn,
    },
}

/// A value in a spec that may refer to request data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Template {
    Literal(Value),
    /// Zero-based bound parameter index
    Param { index: usize, cast: Option<Cast> },
    NextId,
    Now,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cast {
    Int,
    Text,
    Bool,
}

impl TryFrom<Value> for Template {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Text(s) = &value else {
            return Ok(Template::Literal(value));
        };
        let Some(rest) = s.strip_prefix('$') else {
            return Ok(Template::Literal(value));
        };

        match rest {
            _ if rest.starts_with('$') => Ok(Template::Literal(Value::Text(rest.to_string()))),
            "next_id" => Ok(Template::NextId),
            "now" => Ok(Template::Now),
            _ => {
                let (num, cast) = match rest.split_once("::") {
                    Some((num, cast)) => (num, Some(parse_cast(cast)?)),
                    None => (rest, None),
                };
                let n: usize = num
                    .parse()
                    .map_err(|_| format!("invalid template '{}'", s))?;
                if n == 0 {
                    return Err(format!("parameters are numbered from $1, got '{}'", s));
                }
                Ok(Template::Param { index: n - 1, cast })
            }
        }
    }
}

fn parse_cast(cast: &str) -> Result<Cast, String> {
    match cast {
        "int" | "integer" | "int4" | "int8" => Ok(Cast::Int),
        "text" => Ok(Cast::Text),
        "bool" | "boolean" => Ok(Cast::Bool),
        other => Err(format!("unsupported cast '::{}'", other)),
    }
}

impl From<Template> for Value {
    fn from(t: Template) -> Self {
        match t {
            Template::Literal(Value::Text(s)) if s.starts_with('$') => Value::Text(format!("${}", s)),
            Template::Literal(v) => v,
            Template::Param { index, cast } => {
                let cast = match cast {
                    Some(Cast::Int) => "::int",
                    Some(Cast::Text) => "::text",
                    Some(Cast::Bool) => "::bool",
                    None => "",
                };
                Value::Text(format!("${}{}", index + 1, cast))
            }
            Template::NextId => Value::Text("$next_id".to_string()),
            Template::Now => Value::Text("$now".to_string()),
        }
    }
}

impl Template {
    fn param_index(&self) -> Option<usize> {
        match self {
            Template::Param { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Resolve against a request
    pub fn resolve(&self, params: &Params, next_id: i64, now: DateTime<Utc>) -> MockResult<Value> {
        match self {
            Template::Literal(v) => Ok(v.clone()),
            Template::NextId => Ok(Value::Int(next_id)),
            Template::Now => Ok(Value::Timestamp(now)),
            Template::Param { index, cast } => match cast {
                None => Ok(params.get(*index)?.clone()),
                Some(Cast::Int) => params.int(*index).map(Value::Int),
                Some(Cast::Text) => params.text(*index).map(Value::Text),
                Some(Cast::Bool) => params.bool(*index).map(Value::Bool),
            },
        }
    }
}

fn resolve_row(
    templates: &BTreeMap<String, Template>,
    params: &Params,
    next_id: i64,
    now: DateTime<Utc>,
) -> MockResult<RowRecord> {
    templates
        .iter()
        .map(|(column, t)| Ok((column.clone(), t.resolve(params, next_id, now)?)))
        .collect::<MockResult<Vec<(String, Value)>>>()
        .map(|pairs| pairs.into_iter().collect())
}

impl MockSpec {
    /// Parse a mock spec from YAML string
    pub fn from_yaml(yaml: &str) -> MockResult<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a mock spec from a YAML file
    pub fn from_file(path: &Path) -> MockResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| match e {
            MockError::InvalidSpec(msg) => {
                MockError::InvalidSpec(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load all mock specs from a directory, sorted by path
    pub fn load_all(dir: &Path) -> MockResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            debug!(path = %entry.path().display(), "loading mock spec");
            specs.push(Self::from_file(entry.path())?);
        }

        Ok(specs)
    }

    pub fn schema(&self) -> MockResult<Schema> {
        Schema::new(self.columns.clone())
    }

    /// Check columns, seed rows and templates against each other
    pub fn validate(&self) -> MockResult<()> {
        let invalid = |msg: String| MockError::InvalidSpec(format!("{}: {}", self.name, msg));
        let schema = self.schema().map_err(|e| invalid(e.to_string()))?;

        if !schema.contains(&self.id_column) {
            return Err(invalid(format!("id_column '{}' is not a declared column", self.id_column)));
        }

        let check_full = |what: String, row: &BTreeMap<String, Template>| {
            let missing: Vec<&str> = schema
                .columns()
                .iter()
                .map(|c| c.name.as_str())
                .filter(|name| !row.contains_key(*name))
                .collect();
            let extra: Vec<&str> = row
                .keys()
                .map(String::as_str)
                .filter(|name| !schema.contains(name))
                .collect();
            if missing.is_empty() && extra.is_empty() {
                Ok(())
            } else {
                Err(invalid(format!(
                    "{} must set exactly the declared columns (missing: [{}], unknown: [{}])",
                    what,
                    missing.join(", "),
                    extra.join(", ")
                )))
            }
        };

        for (i, row) in self.seed.iter().enumerate() {
            check_full(format!("seed row {}", i + 1), row)?;
            if row.values().any(|t| t.param_index().is_some()) {
                return Err(invalid(format!(
                    "seed row {} refers to a bound parameter",
                    i + 1
                )));
            }
        }

        for (sql, query) in &self.queries {
            match query {
                QuerySpec::Select => {}
                QuerySpec::Insert { values, .. } => {
                    check_full(format!("insert '{}'", sql), values)?;
                }
                QuerySpec::Update {
                    where_param,
                    set,
                    touch,
                } => {
                    if *where_param == 0 {
                        return Err(invalid(format!("'{}': where_param is numbered from 1", sql)));
                    }
                    if let Some(column) = set
                        .iter()
                        .find_map(|(column, t)| matches!(t, Template::NextId).then_some(column))
                    {
                        return Err(invalid(format!(
                            "'{}': $next_id cannot be used in update column '{}'",
                            sql, column
                        )));
                    }
                    let columns = set.keys().chain(touch.iter());
                    for column in columns {
                        if !schema.contains(column) {
                            return Err(invalid(format!(
                                "'{}': unknown column '{}'",
                                sql, column
                            )));
                        }
                    }
                }
                QuerySpec::Delete { where_param, .. } => {
                    if *where_param == 0 {
                        return Err(invalid(format!("'{}': where_param is numbered from 1", sql)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Seed rows with `$now` / `$next_id` resolved
    pub fn seed_rows(&self, clock: &dyn Clock) -> MockResult<Vec<RowRecord>> {
        let now = clock.now();
        let params = Params::default();
        self.seed
            .iter()
            .enumerate()
            .map(|(i, row)| resolve_row(row, &params, i as i64 + 1, now))
            .collect()
    }

    /// Build a scenario that answers this spec's statements
    pub fn into_scenario(self, clock: Box<dyn Clock>) -> MockResult<Scenario> {
        self.validate()?;
        let seed = self.seed_rows(clock.as_ref())?;
        let mut builder = ScenarioBuilder::new(self.schema()?)
            .name(self.name.clone())
            .seed(seed)
            .boxed_clock(clock);

        for (sql, query) in self.queries {
            builder = match query {
                QuerySpec::Select => builder.on(sql, handlers::select_all()),
                QuerySpec::Insert { values, returning } => builder.on(
                    sql,
                    handlers::insert(returning, move |params, next_id, now| {
                        resolve_row(&values, params, next_id, now)
                    }),
                ),
                QuerySpec::Update {
                    where_param,
                    set,
                    touch,
                } => builder.on(
                    sql,
                    handlers::update_by_id_with(
                        self.id_column.clone(),
                        where_param - 1,
                        move |params, now| {
                            let mut changes = set
                                .iter()
                                .map(|(column, t)| Ok((column.clone(), t.resolve(params, 0, now)?)))
                                .collect::<MockResult<Vec<_>>>()?;
                            if let Some(column) = &touch {
                                changes.push((column.clone(), Value::Timestamp(now)));
                            }
                            Ok(changes)
                        },
                    ),
                ),
                QuerySpec::Delete {
                    where_param,
                    returning,
                } => builder.on(
                    sql,
                    handlers::delete_by_id(self.id_column.clone(), where_param - 1, returning),
                ),
            };
        }

        builder.build()
    }
}
