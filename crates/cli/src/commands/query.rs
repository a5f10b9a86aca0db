//! Dry-run one statement against a spec

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use neonmock_common::{FixedClock, Value};
use neonmock_harness::{MockSpec, QueryResponse};

use crate::output::{print_info, print_rows, OutputFormat};

#[derive(Args)]
pub struct QueryArgs {
    /// Mock spec (YAML)
    #[arg(short, long)]
    pub spec: PathBuf,

    /// Exact statement text
    #[arg(long)]
    pub sql: String,

    /// Bound parameters as a JSON array
    #[arg(short, long, default_value = "[]")]
    pub params: String,
}

pub fn parse_params(raw: &str) -> Result<Vec<Value>> {
    serde_json::from_str(raw).with_context(|| format!("--params must be a JSON array, got {}", raw))
}

pub fn execute(args: QueryArgs, format: OutputFormat) -> Result<()> {
    let params = parse_params(&args.params)?;
    let spec = MockSpec::from_file(&args.spec)
        .with_context(|| format!("loading spec {}", args.spec.display()))?;
    let scenario = spec.into_scenario(Box::new(FixedClock::default()))?;

    let response = scenario.execute(&args.sql, params)?;
    render(&response, format)
}

fn render(response: &QueryResponse, format: OutputFormat) -> Result<()> {
    let headers = response.fields.iter().map(|f| f.name.clone()).collect();
    let rows = response
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_string).collect())
        .collect();
    print_rows(headers, rows, response, format)?;
    if matches!(format, OutputFormat::Table) {
        print_info(&format!("{} {}", response.command, response.row_count));
    }
    Ok(())
}
