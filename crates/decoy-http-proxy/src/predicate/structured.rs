//! Structured body comparisons: JSON, JSONPath, XML and XPath.
//!
//! Candidate values that cannot be parsed never match; only the pattern side
//! is treated as a configuration error (see `registry`).
//!
//! XML must be well-formed: HTML-style void elements such as `<br>` are
//! rejected by the parser rather than repaired.

use serde_json::Value;
use serde_json_path::JsonPath;
use std::borrow::Cow;
use std::collections::BTreeMap;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::QName;
use tracing::debug;

/// Parse a JSON pattern or candidate.
pub fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

/// Deep structural equality of a candidate against an already parsed pattern.
pub fn json_equals(candidate: &str, expected: &Value) -> bool {
    match parse_json(candidate) {
        Ok(actual) => &actual == expected,
        Err(_) => false,
    }
}

/// Compile a JSONPath expression. Expressions starting with `.` or `[` are
/// rooted at `$`.
pub fn compile_json_path(expression: &str) -> Result<JsonPath, serde_json_path::ParseError> {
    JsonPath::parse(&root_json_path(expression))
}

fn root_json_path(expression: &str) -> Cow<'_, str> {
    let trimmed = expression.trim();
    if trimmed.starts_with('.') || trimmed.starts_with('[') {
        Cow::Owned(format!("${trimmed}"))
    } else {
        Cow::Borrowed(trimmed)
    }
}

/// True when the expression selects at least one node of the candidate document.
pub fn json_path_selects(path: &JsonPath, candidate: &str) -> bool {
    match parse_json(candidate) {
        Ok(document) => !path.query(&document).is_empty(),
        Err(_) => false,
    }
}

/// Owned, comparable view of an XML element tree.
///
/// Attributes compare as an unordered set, child elements in document order,
/// text content is concatenated and trimmed. Comments and processing
/// instructions are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_dom(element: Element<'_>) -> Self {
        let mut text = String::new();
        let mut children = Vec::new();
        for child in element.children() {
            match child {
                ChildOfElement::Element(e) => children.push(Self::from_dom(e)),
                ChildOfElement::Text(t) => text.push_str(t.text()),
                _ => {}
            }
        }

        let attributes = element
            .attributes()
            .into_iter()
            .map(|a| (qualified_name(a.name()), a.value().to_string()))
            .collect();

        Self {
            name: qualified_name(element.name()),
            attributes,
            text: text.trim().to_string(),
            children,
        }
    }
}

fn qualified_name(name: QName<'_>) -> String {
    match name.namespace_uri() {
        Some(ns) => format!("{{{ns}}}{}", name.local_part()),
        None => name.local_part().to_string(),
    }
}

/// Parse an XML document into its root element tree.
pub fn parse_xml(text: &str) -> Option<XmlElement> {
    let package = parse_document(text)?;
    let document = package.as_document();
    document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(XmlElement::from_dom(element)),
            _ => None,
        })
}

fn parse_document(text: &str) -> Option<sxd_document::Package> {
    match sxd_document::parser::parse(text.trim()) {
        Ok(package) => Some(package),
        Err(e) => {
            debug!(error = ?e, "Body is not well-formed XML");
            None
        }
    }
}

/// Structural XML equality of a candidate against an already parsed pattern.
pub fn xml_equals(candidate: &str, expected: &XmlElement) -> bool {
    parse_xml(candidate).is_some_and(|actual| &actual == expected)
}

/// Check that an XPath expression parses and evaluates against a trivial document.
pub fn validate_xpath(expression: &str) -> Result<(), String> {
    if expression.trim().is_empty() {
        return Err("empty XPath expression".to_string());
    }
    let package = sxd_document::parser::parse("<validate/>").map_err(|e| format!("{e:?}"))?;
    let document = package.as_document();
    sxd_xpath::evaluate_xpath(&document, expression)
        .map(|_| ())
        .map_err(|e| format!("{e:?}"))
}

/// Evaluate an XPath expression against a candidate document.
///
/// Booleans are taken as-is, node-sets and strings must be non-empty,
/// numbers must be non-zero.
pub fn xpath_selects(candidate: &str, expression: &str) -> bool {
    use sxd_xpath::{evaluate_xpath, Value};

    let Some(package) = parse_document(candidate) else {
        return false;
    };
    let document = package.as_document();

    match evaluate_xpath(&document, expression) {
        Ok(Value::Boolean(b)) => b,
        Ok(Value::Nodeset(nodes)) => nodes.size() > 0,
        Ok(Value::String(s)) => !s.is_empty(),
        Ok(Value::Number(n)) => n != 0.0 && !n.is_nan(),
        Err(_) => false,
    }
}
