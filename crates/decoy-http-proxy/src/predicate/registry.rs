//! Matcher registry: evaluates one field value against one pattern.
//!
//! Patterns are compiled once into a [`CompiledPattern`] so the hot path does
//! not re-parse regexes or JSON per request. A pattern that fails to compile
//! never matches anything; the failure is logged and counted instead of
//! being surfaced to request handling.

use super::matcher_type::MatcherType;
use super::structured::{
    compile_json_path, json_equals, json_path_selects, parse_json, parse_xml, validate_xpath,
    xml_equals, xpath_selects, XmlElement,
};
use crate::metrics;
use regex::Regex;
use serde_json_path::JsonPath;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A pattern that could not be compiled for its matcher type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub matcher_type: MatcherType,
    pub pattern: String,
    pub reason: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} pattern '{}': {}",
            self.matcher_type, self.pattern, self.reason
        )
    }
}

impl std::error::Error for PatternError {}

/// Pre-compiled pattern for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum CompiledPattern {
    Exact(String),
    Glob(glob::Pattern),
    Regex(Arc<Regex>),
    Json(serde_json::Value),
    JsonPath(Arc<JsonPath>),
    Xml(XmlElement),
    /// XPath expressions are validated up front but evaluated per document.
    Xpath(String),
    /// Malformed pattern; fails closed.
    Invalid,
}

impl CompiledPattern {
    /// Compile a pattern for the given matcher type.
    pub fn compile(matcher_type: MatcherType, pattern: &str) -> Result<Self, PatternError> {
        let fail = |reason: String| PatternError {
            matcher_type,
            pattern: pattern.to_string(),
            reason,
        };

        match matcher_type {
            MatcherType::Exact => Ok(CompiledPattern::Exact(pattern.to_string())),
            MatcherType::Glob => glob::Pattern::new(pattern)
                .map(CompiledPattern::Glob)
                .map_err(|e| fail(e.to_string())),
            MatcherType::Regex => Regex::new(pattern)
                .map(|r| CompiledPattern::Regex(Arc::new(r)))
                .map_err(|e| fail(e.to_string())),
            MatcherType::Json => parse_json(pattern)
                .map(CompiledPattern::Json)
                .map_err(|e| fail(e.to_string())),
            MatcherType::JsonPath => compile_json_path(pattern)
                .map(|p| CompiledPattern::JsonPath(Arc::new(p)))
                .map_err(|e| fail(e.to_string())),
            MatcherType::Xml => parse_xml(pattern)
                .map(CompiledPattern::Xml)
                .ok_or_else(|| fail("pattern is not well-formed XML".to_string())),
            MatcherType::Xpath => validate_xpath(pattern)
                .map(|_| CompiledPattern::Xpath(pattern.to_string()))
                .map_err(fail),
        }
    }

    /// Compile, logging and counting failures and falling back to [`CompiledPattern::Invalid`].
    pub fn compile_or_invalid(matcher_type: MatcherType, pattern: &str) -> Self {
        match Self::compile(matcher_type, pattern) {
            Ok(compiled) => compiled,
            Err(err) => {
                report_pattern_error(&err);
                CompiledPattern::Invalid
            }
        }
    }

    /// Check if a field value matches this pattern.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            CompiledPattern::Exact(expected) => value.as_bytes() == expected.as_bytes(),
            CompiledPattern::Glob(glob) => glob.matches(value),
            CompiledPattern::Regex(regex) => regex.is_match(value),
            CompiledPattern::Json(expected) => json_equals(value, expected),
            CompiledPattern::JsonPath(path) => json_path_selects(path, value),
            CompiledPattern::Xml(expected) => xml_equals(value, expected),
            CompiledPattern::Xpath(expression) => xpath_selects(value, expression),
            CompiledPattern::Invalid => false,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, CompiledPattern::Invalid)
    }
}

fn report_pattern_error(err: &PatternError) {
    warn!(
        matcher = %err.matcher_type,
        pattern = %err.pattern,
        "Matcher pattern rejected, field will never match: {}",
        err.reason
    );
    metrics::record_matcher_error(err.matcher_type.key());
}

/// Evaluate a single value against a pattern.
///
/// Never fails: malformed patterns evaluate to `false` with a logged diagnostic.
pub fn evaluate(matcher_type: MatcherType, value: &str, pattern: &str) -> bool {
    CompiledPattern::compile_or_invalid(matcher_type, pattern).matches(value)
}
