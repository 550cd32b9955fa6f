//! The closed set of matcher types a field can be compared with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Comparison strategy applied to one request field value.
///
/// Serialized with the simulation document key names (`exactMatch`, `globMatch`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum MatcherType {
    #[serde(rename = "exactMatch")]
    Exact,
    #[serde(rename = "globMatch")]
    Glob,
    #[serde(rename = "regexMatch")]
    Regex,
    #[serde(rename = "jsonMatch")]
    Json,
    #[serde(rename = "jsonPathMatch")]
    JsonPath,
    #[serde(rename = "xmlMatch")]
    Xml,
    #[serde(rename = "xpathMatch")]
    Xpath,
}

impl MatcherType {
    pub const ALL: [MatcherType; 7] = [
        MatcherType::Exact,
        MatcherType::Glob,
        MatcherType::Regex,
        MatcherType::Json,
        MatcherType::JsonPath,
        MatcherType::Xml,
        MatcherType::Xpath,
    ];

    /// Document key for this matcher type.
    pub fn key(&self) -> &'static str {
        match self {
            MatcherType::Exact => "exactMatch",
            MatcherType::Glob => "globMatch",
            MatcherType::Regex => "regexMatch",
            MatcherType::Json => "jsonMatch",
            MatcherType::JsonPath => "jsonPathMatch",
            MatcherType::Xml => "xmlMatch",
            MatcherType::Xpath => "xpathMatch",
        }
    }
}

impl fmt::Display for MatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMatcherType(pub String);

impl fmt::Display for UnknownMatcherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown matcher type '{}'", self.0)
    }
}

impl std::error::Error for UnknownMatcherType {}

impl FromStr for MatcherType {
    type Err = UnknownMatcherType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatcherType::ALL
            .iter()
            .copied()
            .find(|t| t.key() == s)
            .ok_or_else(|| UnknownMatcherType(s.to_string()))
    }
}
