//! CLI Commands

pub mod check;
pub mod query;
pub mod serve;

use anyhow::{Context, Result};
use std::path::Path;

use neonmock_harness::MockSpec;

/// Load a single spec file, or every spec under a directory
pub(crate) fn load_specs(path: &Path) -> Result<Vec<MockSpec>> {
    if path.is_dir() {
        MockSpec::load_all(path).with_context(|| format!("loading specs from {}", path.display()))
    } else {
        let spec = MockSpec::from_file(path)
            .with_context(|| format!("loading spec {}", path.display()))?;
        Ok(vec![spec])
    }
}
