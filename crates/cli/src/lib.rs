//! Neonmock CLI
//!
//! Serve declarative mock specs over HTTP, validate them, and dry-run
//! statements against them.

pub mod commands;
pub mod output;
