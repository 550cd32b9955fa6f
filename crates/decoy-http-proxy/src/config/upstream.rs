//! Real upstream call configuration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    /// Whole-request timeout for forwarded calls
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Scheme assumed for origin-form requests (no absolute URI)
    #[serde(default = "default_scheme")]
    pub default_scheme: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_scheme() -> String {
    "http".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            default_scheme: default_scheme(),
        }
    }
}
