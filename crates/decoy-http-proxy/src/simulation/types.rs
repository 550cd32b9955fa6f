//! In-memory simulation model: pairs, response templates and document metadata.

use super::views::string_or_seq_map;
use crate::behaviors::{DelayRule, LogNormalDelayRule};
use crate::predicate::RequestMatcher;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Schema version tag of a simulation document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "v1")]
    V1,
    #[default]
    #[serde(rename = "v2")]
    V2,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "v1" => Some(SchemaVersion::V1),
            "v2" => Some(SchemaVersion::V2),
            _ => None,
        }
    }
}

/// Canned response returned for a matched pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseTemplate {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub body: String,
    /// When set, `body` is standard base64 of the raw bytes.
    #[serde(default)]
    pub encoded_body: bool,
    #[serde(default, deserialize_with = "string_or_seq_map")]
    pub headers: BTreeMap<String, Vec<String>>,
    /// Milliseconds to wait before sending this response.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub fixed_delay: u64,
}

fn default_status() -> u16 {
    200
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Default for ResponseTemplate {
    fn default() -> Self {
        Self {
            status: default_status(),
            body: String::new(),
            encoded_body: false,
            headers: BTreeMap::new(),
            fixed_delay: 0,
        }
    }
}

impl ResponseTemplate {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Default::default()
        }
    }

    /// Build from raw bytes, base64-encoding bodies that are not UTF-8.
    pub fn from_bytes(status: u16, body: &[u8], headers: BTreeMap<String, Vec<String>>) -> Self {
        let (body, encoded_body) = match std::str::from_utf8(body) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (base64::engine::general_purpose::STANDARD.encode(body), true),
        };
        Self {
            status,
            body,
            encoded_body,
            headers,
            fixed_delay: 0,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.fixed_delay)
    }

    /// Raw body bytes, decoding base64 when `encoded_body` is set.
    pub fn body_bytes(&self) -> Result<Bytes, base64::DecodeError> {
        if self.encoded_body {
            base64::engine::general_purpose::STANDARD
                .decode(&self.body)
                .map(Bytes::from)
        } else {
            Ok(Bytes::from(self.body.clone()))
        }
    }
}

/// A request matcher and the response it produces.
///
/// The id is assigned at construction and is not part of the document format.
#[derive(Debug, Clone)]
pub struct Pair {
    pub id: Uuid,
    pub matcher: RequestMatcher,
    pub response: ResponseTemplate,
}

impl Pair {
    pub fn new(matcher: RequestMatcher, response: ResponseTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            matcher,
            response,
        }
    }
}

/// Document metadata carried through import and export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationMeta {
    pub hoverfly_version: Option<String>,
    pub time_exported: Option<String>,
}

/// Canonical simulation: ordered pairs plus global delay rules.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    pub schema_version: SchemaVersion,
    pub pairs: Vec<Pair>,
    pub delays: Vec<DelayRule>,
    pub delays_log_normal: Vec<LogNormalDelayRule>,
    pub meta: SimulationMeta,
}

impl Simulation {
    pub fn new(pairs: Vec<Pair>) -> Self {
        Self {
            pairs,
            ..Default::default()
        }
    }

    pub fn with_delays(mut self, delays: Vec<DelayRule>) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_log_normal_delays(mut self, delays: Vec<LogNormalDelayRule>) -> Self {
        self.delays_log_normal = delays;
        self
    }
}
