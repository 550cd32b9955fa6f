//! Field matchers and the per-field / per-header specifications built from them.

use super::matcher_type::MatcherType;
use super::registry::CompiledPattern;
use std::collections::BTreeMap;
use std::fmt;

/// One (matcher type, pattern) pair, compiled at construction.
///
/// Equality and hashing ignore the compiled form.
#[derive(Clone)]
pub struct FieldMatcher {
    matcher_type: MatcherType,
    pattern: String,
    compiled: CompiledPattern,
}

impl FieldMatcher {
    pub fn new(matcher_type: MatcherType, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        let compiled = CompiledPattern::compile_or_invalid(matcher_type, &pattern);
        Self {
            matcher_type,
            pattern,
            compiled,
        }
    }

    pub fn exact(pattern: impl Into<String>) -> Self {
        Self::new(MatcherType::Exact, pattern)
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        Self::new(MatcherType::Glob, pattern)
    }

    pub fn matcher_type(&self) -> MatcherType {
        self.matcher_type
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// True when the pattern failed to compile and can never match.
    pub fn is_invalid(&self) -> bool {
        self.compiled.is_invalid()
    }

    pub fn matches(&self, value: &str) -> bool {
        self.compiled.matches(value)
    }
}

impl PartialEq for FieldMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.matcher_type == other.matcher_type && self.pattern == other.pattern
    }
}

impl Eq for FieldMatcher {}

impl fmt::Debug for FieldMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMatcher")
            .field("matcher_type", &self.matcher_type)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Matchers for a single request field, combined with AND.
///
/// An empty spec is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec(Vec<FieldMatcher>);

impl FieldSpec {
    pub fn new(matchers: Vec<FieldMatcher>) -> Self {
        Self(matchers)
    }

    pub fn wildcard() -> Self {
        Self::default()
    }

    pub fn exact(pattern: impl Into<String>) -> Self {
        Self(vec![FieldMatcher::exact(pattern)])
    }

    pub fn is_wildcard(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matchers(&self) -> &[FieldMatcher] {
        &self.0
    }

    pub fn push(&mut self, matcher: FieldMatcher) {
        self.0.push(matcher);
    }

    pub fn matches(&self, value: &str) -> bool {
        self.0.iter().all(|m| m.matches(value))
    }
}

impl From<Vec<FieldMatcher>> for FieldSpec {
    fn from(matchers: Vec<FieldMatcher>) -> Self {
        Self(matchers)
    }
}

/// Expected header values keyed by header name.
///
/// Names compare case-insensitively. Every listed value must be present among
/// the request's values for that name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSpec(BTreeMap<String, Vec<String>>);

impl HeaderSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.0.insert(name.into(), values);
    }

    pub fn with(mut self, name: impl Into<String>, values: &[&str]) -> Self {
        self.insert(name, values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of header names this spec constrains.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Header names whose expected values are not all present in `headers`.
    ///
    /// `headers` must be keyed by lower-cased name.
    pub fn missing<'a>(&'a self, headers: &BTreeMap<String, Vec<String>>) -> Vec<&'a str> {
        self.0
            .iter()
            .filter(|(name, expected)| {
                let actual = headers.get(&name.to_ascii_lowercase());
                !expected
                    .iter()
                    .all(|value| actual.is_some_and(|values| values.contains(value)))
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn matches(&self, headers: &BTreeMap<String, Vec<String>>) -> bool {
        self.missing(headers).is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for HeaderSpec {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_equality_ignores_compiled_state() {
        let a = FieldMatcher::new(MatcherType::Regex, "^/api");
        let b = FieldMatcher::new(MatcherType::Regex, "^/api");
        let c = FieldMatcher::new(MatcherType::Glob, "^/api");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_pattern_is_kept_but_never_matches() {
        let matcher = FieldMatcher::new(MatcherType::Regex, "(");
        assert!(matcher.is_invalid());
        assert_eq!(matcher.pattern(), "(");
        assert!(!matcher.matches("("));
    }

    #[test]
    fn test_field_spec_is_and_combined() {
        let spec = FieldSpec::new(vec![
            FieldMatcher::glob("*.com"),
            FieldMatcher::exact("destination.com"),
        ]);
        assert!(spec.matches("destination.com"));
        assert!(!spec.matches("other.com"));
        assert!(!spec.matches("destination.org"));
    }

    #[test]
    fn test_wildcard_spec() {
        let spec = FieldSpec::wildcard();
        assert!(spec.is_wildcard());
        assert!(spec.matches("anything"));
    }

    #[test]
    fn test_header_names_case_insensitive() {
        let spec = HeaderSpec::new().with("Content-Type", &["application/json"]);
        let actual = headers(&[("content-type", &["application/json"])]);
        assert!(spec.matches(&actual));
    }

    #[test]
    fn test_header_values_must_all_be_present() {
        let spec = HeaderSpec::new().with("accept", &["text/html", "application/json"]);
        assert!(spec.matches(&headers(&[(
            "accept",
            &["application/json", "text/html", "*/*"]
        )])));
        assert_eq!(
            spec.missing(&headers(&[("accept", &["text/html"])])),
            vec!["accept"]
        );
        assert!(!spec.matches(&headers(&[])));
    }
}
