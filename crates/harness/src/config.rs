//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

use neonmock_common::{Clock, FixedClock, MockError, MockResult, SystemClock};

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Listen address for the HTTP mock endpoint
    pub listen: String,

    /// Which requests count as database queries
    pub endpoint: EndpointConfig,

    /// Time source for generated timestamps
    pub clock: ClockConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:4444".to_string(),
            endpoint: EndpointConfig::default(),
            clock: ClockConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn from_toml(content: &str) -> MockResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| MockError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> MockResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> MockResult<()> {
        check_path(&self.endpoint.path)
    }

    /// Apply `NEONMOCK_*` environment overrides
    pub fn apply_env(&mut self) -> MockResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> MockResult<()> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(listen) = get("NEONMOCK_LISTEN") {
            self.listen = listen;
        }
        if let Some(suffix) = get("NEONMOCK_HOST_SUFFIX") {
            self.endpoint.host_suffix = suffix;
        }
        if let Some(path) = get("NEONMOCK_PATH") {
            self.endpoint.path = path;
        }
        if let Some(mode) = get("NEONMOCK_CLOCK") {
            self.clock.mode = match mode.to_ascii_lowercase().as_str() {
                "fixed" => ClockMode::Fixed,
                "system" => ClockMode::System,
                other => {
                    return Err(MockError::Config(format!(
                        "NEONMOCK_CLOCK must be 'fixed' or 'system', got '{}'",
                        other
                    )))
                }
            };
        }
        self.validate()
    }
}

/// Routes and URL paths are absolute
pub(crate) fn check_path(path: &str) -> MockResult<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(MockError::Config(format!(
            "endpoint path must start with '/', got '{}'",
            path
        )))
    }
}

/// Mocked database endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Host suffix of the serverless database
    pub host_suffix: String,

    /// HTTP path queries are posted to
    pub path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host_suffix: ".neon.tech".to_string(),
            path: "/sql".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    #[default]
    Fixed,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub mode: ClockMode,

    /// First reading of a fixed clock, epoch milliseconds
    pub start_ms: i64,

    /// Advance per reading of a fixed clock
    pub step_ms: i64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            mode: ClockMode::Fixed,
            start_ms: FixedClock::DEFAULT_START_MS,
            step_ms: 0,
        }
    }
}

impl ClockConfig {
    pub fn build(&self) -> Box<dyn Clock> {
        match self.mode {
            ClockMode::Fixed => Box::new(FixedClock::stepping(self.start_ms, self.step_ms)),
            ClockMode::System => Box::new(SystemClock),
        }
    }
}
