//! Time source for generated timestamp columns

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Supplies "now" to handlers that stamp creation/update times
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock. Each reading advances by `step_ms`.
#[derive(Debug)]
pub struct FixedClock {
    next_ms: AtomicI64,
    step_ms: i64,
}

impl FixedClock {
    /// Default starting point for scenarios: 2024-01-01T00:00:00Z
    pub const DEFAULT_START_MS: i64 = 1_704_067_200_000;

    pub fn new(start_ms: i64) -> Self {
        Self::stepping(start_ms, 0)
    }

    pub fn stepping(start_ms: i64, step_ms: i64) -> Self {
        Self {
            next_ms: AtomicI64::new(start_ms),
            step_ms,
        }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Self::DEFAULT_START_MS)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.next_ms.fetch_add(self.step_ms, Ordering::SeqCst);
        Utc.timestamp_millis_opt(ms)
            .single()
            .unwrap_or_default()
    }
}
