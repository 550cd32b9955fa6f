//! Configuration types for the decoy proxy.
//!
//! Every section has defaults, so an empty file is a valid configuration.

mod capture;
mod listen;
mod middleware;
mod upstream;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use capture::{CaptureConfig, JournalConfig};
pub use listen::{ListenConfig, MetricsConfig};
pub use middleware::MiddlewareConfig;
pub use upstream::UpstreamConfig;

use crate::matching::MatchingStrategy;
use crate::proxy::ControllerSettings;
use crate::recording::Mode;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Initial proxy mode
    #[serde(default)]
    pub mode: Mode,
    /// Status returned when no pair matches in simulate or spy mode
    #[serde(default = "default_no_match_status")]
    pub no_match_status: u16,
    /// `strongest` (default) or `first`
    #[serde(default)]
    pub matching_strategy: MatchingStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware: Option<MiddlewareConfig>,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Simulation document imported at start-up
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation: Option<PathBuf>,
}

fn default_no_match_status() -> u16 {
    502
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            metrics: MetricsConfig::default(),
            mode: Mode::default(),
            no_match_status: default_no_match_status(),
            matching_strategy: MatchingStrategy::default(),
            middleware: None,
            capture: CaptureConfig::default(),
            journal: JournalConfig::default(),
            upstream: UpstreamConfig::default(),
            simulation: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        // An empty document deserializes as null
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(100..=599).contains(&self.no_match_status) {
            anyhow::bail!(
                "noMatchStatus must be a valid HTTP status (100-599), got {}",
                self.no_match_status
            );
        }

        if self.metrics.enabled && self.metrics.port == self.listen.port {
            anyhow::bail!(
                "metrics.port and listen.port must differ (both are {})",
                self.listen.port
            );
        }

        if let Some(ref middleware) = self.middleware {
            if middleware.command.trim().is_empty() {
                anyhow::bail!("middleware.command must not be empty");
            }
            if middleware.timeout_ms == 0 {
                anyhow::bail!("middleware.timeoutMs must be greater than 0");
            }
        }

        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("upstream.timeoutSecs must be greater than 0");
        }
        match self.upstream.default_scheme.as_str() {
            "http" | "https" => {}
            other => anyhow::bail!(
                "upstream.defaultScheme must be 'http' or 'https', got '{}'",
                other
            ),
        }

        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            no_match_status: self.no_match_status,
            capture_headers: self.capture.headers.clone(),
            overwrite_duplicate: self.capture.overwrite_duplicate,
            capture_delay: self.capture.delay,
            matching_strategy: self.matching_strategy,
            journal_entry_limit: Some(self.journal.entry_limit),
        }
    }
}
