//! Capture and journal configuration.

use crate::recording::DEFAULT_ENTRY_LIMIT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Header names recorded into captured pairs (`*` for all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    /// Replace a pair with an identical matcher instead of appending
    #[serde(default)]
    pub overwrite_duplicate: bool,
    /// Record measured upstream latency as each captured response's fixedDelay
    #[serde(default)]
    pub delay: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalConfig {
    /// Maximum retained entries; 0 disables the limit
    #[serde(default = "default_entry_limit")]
    pub entry_limit: usize,
}

fn default_entry_limit() -> usize {
    DEFAULT_ENTRY_LIMIT
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            entry_limit: default_entry_limit(),
        }
    }
}
