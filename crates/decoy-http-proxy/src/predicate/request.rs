//! Whole-request matcher: one [`FieldSpec`] per request field plus headers.

use super::field_matcher::{FieldSpec, HeaderSpec};
use crate::request::RequestDetails;
use std::borrow::Cow;
use std::fmt;

/// The matchable request fields, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestField {
    Path,
    Method,
    Destination,
    Scheme,
    Query,
    Body,
}

impl RequestField {
    pub const ALL: [RequestField; 6] = [
        RequestField::Path,
        RequestField::Method,
        RequestField::Destination,
        RequestField::Scheme,
        RequestField::Query,
        RequestField::Body,
    ];

    /// Document key for this field.
    pub fn name(&self) -> &'static str {
        match self {
            RequestField::Path => "path",
            RequestField::Method => "method",
            RequestField::Destination => "destination",
            RequestField::Scheme => "scheme",
            RequestField::Query => "query",
            RequestField::Body => "body",
        }
    }

    pub fn value<'a>(&self, request: &'a RequestDetails) -> Cow<'a, str> {
        match self {
            RequestField::Path => Cow::Borrowed(&request.path),
            RequestField::Method => Cow::Borrowed(&request.method),
            RequestField::Destination => Cow::Borrowed(&request.destination),
            RequestField::Scheme => Cow::Borrowed(&request.scheme),
            RequestField::Query => Cow::Borrowed(&request.query),
            RequestField::Body => request.body_text(),
        }
    }
}

impl fmt::Display for RequestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of checking one [`RequestMatcher`] against one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatcherReport {
    /// Non-wildcard fields plus constrained header names that passed.
    pub passed: usize,
    /// Names of the fields and headers that failed.
    pub missed: Vec<String>,
}

impl MatcherReport {
    pub fn is_match(&self) -> bool {
        self.missed.is_empty()
    }
}

/// Matchers for every field of a request. Every sub-field defaults to wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMatcher {
    pub path: FieldSpec,
    pub method: FieldSpec,
    pub destination: FieldSpec,
    pub scheme: FieldSpec,
    pub query: FieldSpec,
    pub body: FieldSpec,
    pub headers: HeaderSpec,
}

impl RequestMatcher {
    pub fn field(&self, field: RequestField) -> &FieldSpec {
        match field {
            RequestField::Path => &self.path,
            RequestField::Method => &self.method,
            RequestField::Destination => &self.destination,
            RequestField::Scheme => &self.scheme,
            RequestField::Query => &self.query,
            RequestField::Body => &self.body,
        }
    }

    pub fn field_mut(&mut self, field: RequestField) -> &mut FieldSpec {
        match field {
            RequestField::Path => &mut self.path,
            RequestField::Method => &mut self.method,
            RequestField::Destination => &mut self.destination,
            RequestField::Scheme => &mut self.scheme,
            RequestField::Query => &mut self.query,
            RequestField::Body => &mut self.body,
        }
    }

    /// Specificity: non-wildcard fields plus constrained header names.
    pub fn specificity(&self) -> usize {
        RequestField::ALL
            .iter()
            .filter(|f| !self.field(**f).is_wildcard())
            .count()
            + self.headers.len()
    }

    /// Evaluate every constrained field, recording what passed and what missed.
    pub fn check(&self, request: &RequestDetails) -> MatcherReport {
        let mut report = MatcherReport::default();
        for field in RequestField::ALL {
            let spec = self.field(field);
            if spec.is_wildcard() {
                continue;
            }
            if spec.matches(&field.value(request)) {
                report.passed += 1;
            } else {
                report.missed.push(field.name().to_string());
            }
        }

        let missing_headers = self.headers.missing(&request.headers);
        report.passed += self.headers.len() - missing_headers.len();
        report
            .missed
            .extend(missing_headers.into_iter().map(|h| format!("headers.{h}")));
        report
    }

    pub fn matches(&self, request: &RequestDetails) -> bool {
        self.check(request).is_match()
    }
}
