//! Neonmock Common Library
//!
//! Data model shared by the harness: cell values, column descriptors, the
//! per-scenario row store, the clock used for generated timestamps, and the
//! error taxonomy.

pub mod clock;
pub mod error;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{MockError, MockResult};
pub use table::TableState;
pub use types::*;

/// Neonmock version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
