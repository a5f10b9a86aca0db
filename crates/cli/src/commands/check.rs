//! Validate mock specs and list their statements

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use neonmock_harness::spec::QuerySpec;
use neonmock_harness::MockSpec;

use crate::output::{print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct CheckArgs {
    /// Spec file or directory of specs
    #[arg(short, long)]
    pub spec: PathBuf,
}

/// One registered statement for display
#[derive(Serialize, Clone)]
pub struct StatementInfo {
    pub spec: String,
    pub kind: &'static str,
    pub sql: String,
}

impl TableDisplay for StatementInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Spec", "Kind", "Statement"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.spec.clone(), self.kind.to_string(), self.sql.clone()]
    }
}

pub fn statements(specs: &[MockSpec]) -> Vec<StatementInfo> {
    specs
        .iter()
        .flat_map(|spec| {
            spec.queries.iter().map(move |(sql, query)| StatementInfo {
                spec: spec.name.clone(),
                kind: match query {
                    QuerySpec::Select => "select",
                    QuerySpec::Insert { .. } => "insert",
                    QuerySpec::Update { .. } => "update",
                    QuerySpec::Delete { .. } => "delete",
                },
                sql: sql.clone(),
            })
        })
        .collect()
}

pub fn execute(args: CheckArgs, format: OutputFormat) -> Result<()> {
    let specs = super::load_specs(&args.spec)?;
    print_list(&statements(&specs), format)?;
    if matches!(format, OutputFormat::Table) {
        print_success(&format!("{} spec(s) valid", specs.len()));
    }
    Ok(())
}
