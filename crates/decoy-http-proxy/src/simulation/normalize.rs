//! Document import: upgrade v1/v2 documents to the canonical model.
//!
//! Import is all-or-nothing; the first problem rejects the whole document.

use super::types::{Pair, ResponseTemplate, SchemaVersion, Simulation, SimulationMeta};
use super::views::{FieldView, PairView, RequestView, SimulationView};
use crate::error::ProxyError;
use crate::predicate::{FieldMatcher, FieldSpec, HeaderSpec, MatcherType, RequestField, RequestMatcher};
use crate::request::decode;
use base64::Engine;

/// Parse and normalize a simulation document.
pub fn import_json(document: &str) -> Result<Simulation, ProxyError> {
    let view: SimulationView = serde_json::from_str(document)
        .map_err(|e| ProxyError::Schema(format!("malformed document: {e}")))?;
    normalize(view)
}

/// Normalize an already parsed document.
pub fn normalize(view: SimulationView) -> Result<Simulation, ProxyError> {
    let meta = view.meta.unwrap_or_default();
    let schema_version = match meta.schema_version.as_deref() {
        None => SchemaVersion::V2,
        Some(tag) => SchemaVersion::parse(tag).ok_or_else(|| {
            ProxyError::Schema(format!("unsupported schemaVersion '{tag}'"))
        })?,
    };

    let pairs = view
        .data
        .pairs
        .into_iter()
        .enumerate()
        .map(|(index, pair)| normalize_pair(schema_version, pair).map_err(|e| at_pair(index, e)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Simulation {
        schema_version,
        pairs,
        delays: view.data.global_actions.delays,
        delays_log_normal: view.data.global_actions.delays_log_normal,
        meta: SimulationMeta {
            hoverfly_version: meta.hoverfly_version,
            time_exported: meta.time_exported,
        },
    })
}

fn at_pair(index: usize, err: ProxyError) -> ProxyError {
    match err {
        ProxyError::Schema(reason) => ProxyError::Schema(format!("pair {index}: {reason}")),
        other => other,
    }
}

fn normalize_pair(version: SchemaVersion, pair: PairView) -> Result<Pair, ProxyError> {
    let matcher = normalize_request(version, pair.request)?;
    let response = normalize_response(pair.response)?;
    Ok(Pair::new(matcher, response))
}

fn normalize_request(version: SchemaVersion, view: RequestView) -> Result<RequestMatcher, ProxyError> {
    let mut matcher = RequestMatcher {
        headers: view.headers.into_iter().collect::<HeaderSpec>(),
        ..Default::default()
    };

    let fields = [
        (RequestField::Path, view.path),
        (RequestField::Method, view.method),
        (RequestField::Destination, view.destination),
        (RequestField::Scheme, view.scheme),
        (RequestField::Query, view.query),
        (RequestField::Body, view.body),
    ];
    for (field, raw) in fields {
        if let Some(raw) = raw {
            *matcher.field_mut(field) = normalize_field(version, field, raw)?;
        }
    }
    Ok(matcher)
}

fn normalize_field(
    version: SchemaVersion,
    field: RequestField,
    raw: FieldView,
) -> Result<FieldSpec, ProxyError> {
    match raw {
        FieldView::Bare(value) => match version {
            SchemaVersion::V1 => Ok(FieldSpec::new(vec![field_matcher(
                field,
                MatcherType::Exact,
                value,
            )])),
            SchemaVersion::V2 => Err(ProxyError::Schema(format!(
                "field '{field}' must be a matcher object"
            ))),
        },
        FieldView::Matchers(entries) => {
            let mut spec = FieldSpec::wildcard();
            for (key, patterns) in entries {
                let matcher_type: MatcherType = key
                    .parse()
                    .map_err(|e| ProxyError::Schema(format!("field '{field}': {e}")))?;
                for pattern in patterns {
                    spec.push(field_matcher(field, matcher_type, pattern));
                }
            }
            Ok(spec)
        }
    }
}

/// Query patterns compared literally are decoded to match the extractor's form.
fn field_matcher(field: RequestField, matcher_type: MatcherType, pattern: String) -> FieldMatcher {
    let literal = matches!(matcher_type, MatcherType::Exact | MatcherType::Glob);
    if field == RequestField::Query && literal {
        FieldMatcher::new(matcher_type, decode(&pattern))
    } else {
        FieldMatcher::new(matcher_type, pattern)
    }
}

fn normalize_response(response: ResponseTemplate) -> Result<ResponseTemplate, ProxyError> {
    if response.encoded_body {
        base64::engine::general_purpose::STANDARD
            .decode(&response.body)
            .map_err(|e| ProxyError::Schema(format!("encodedBody is not valid base64: {e}")))?;
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_doc(request: &str) -> String {
        format!(
            r#"{{"data": {{"pairs": [{{"request": {request}, "response": {{"status": 200, "body": "ok"}}}}]}},
                "meta": {{"schemaVersion": "v1"}}}}"#
        )
    }

    #[test]
    fn test_v1_bare_string_becomes_exact() {
        let sim = import_json(&v1_doc(r#"{"path": "/a", "requestType": "recording"}"#)).unwrap();
        assert_eq!(sim.schema_version, SchemaVersion::V1);
        assert_eq!(sim.pairs[0].matcher.path, FieldSpec::exact("/a"));
        assert!(sim.pairs[0].matcher.method.is_wildcard());
    }

    #[test]
    fn test_v1_accepts_object_fields() {
        let sim = import_json(&v1_doc(r#"{"path": {"globMatch": "/a/*"}}"#)).unwrap();
        assert_eq!(
            sim.pairs[0].matcher.path,
            FieldSpec::new(vec![FieldMatcher::glob("/a/*")])
        );
    }

    #[test]
    fn test_v2_rejects_bare_string() {
        let doc = r#"{"data": {"pairs": [{"request": {"path": "/a"}, "response": {}}]},
                      "meta": {"schemaVersion": "v2"}}"#;
        let err = import_json(doc).unwrap_err();
        assert!(matches!(err, ProxyError::Schema(_)));
        assert!(err.to_string().contains("pair 0"));
    }

    #[test]
    fn test_v2_array_patterns_in_order() {
        let doc = r#"{"data": {"pairs": [{"request":
            {"destination": {"globMatch": "*.com", "exactMatch": ["destination.com", "other"]}},
            "response": {}}]}}"#;
        let sim = import_json(doc).unwrap();
        assert_eq!(sim.schema_version, SchemaVersion::V2);
        let types: Vec<_> = sim.pairs[0]
            .matcher
            .destination
            .matchers()
            .iter()
            .map(|m| (m.matcher_type(), m.pattern().to_string()))
            .collect();
        assert_eq!(
            types,
            vec![
                (MatcherType::Glob, "*.com".to_string()),
                (MatcherType::Exact, "destination.com".to_string()),
                (MatcherType::Exact, "other".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_schema_version() {
        let doc = r#"{"data": {"pairs": []}, "meta": {"schemaVersion": "v9"}}"#;
        let err = import_json(doc).unwrap_err();
        assert_eq!(err.to_string(), "Invalid simulation: unsupported schemaVersion 'v9'");
    }

    #[test]
    fn test_unknown_matcher_type() {
        let doc = r#"{"data": {"pairs": [
            {"request": {"path": {"exactMatch": "/ok"}}, "response": {}},
            {"request": {"path": {"fuzzyMatch": "/a"}}, "response": {}}]}}"#;
        let err = import_json(doc).unwrap_err();
        assert!(err.to_string().contains("pair 1"));
        assert!(err.to_string().contains("fuzzyMatch"));
    }

    #[test]
    fn test_non_string_pattern_is_schema_error() {
        let doc = r#"{"data": {"pairs": [{"request": {"path": {"exactMatch": 3}}, "response": {}}]}}"#;
        assert!(matches!(import_json(doc), Err(ProxyError::Schema(_))));
    }

    #[test]
    fn test_query_patterns_are_decoded() {
        let doc = r#"{"data": {"pairs": [{"request":
            {"query": {"exactMatch": "q=a%20b", "regexMatch": "%20"}}, "response": {}}]}}"#;
        let sim = import_json(doc).unwrap();
        let patterns: Vec<_> = sim.pairs[0]
            .matcher
            .query
            .matchers()
            .iter()
            .map(|m| m.pattern().to_string())
            .collect();
        assert_eq!(patterns, vec!["q=a b", "%20"]);
    }

    #[test]
    fn test_invalid_encoded_body() {
        let doc = r#"{"data": {"pairs": [{"request": {},
            "response": {"body": "not base64!", "encodedBody": true}}]}}"#;
        let err = import_json(doc).unwrap_err();
        assert!(err.to_string().contains("encodedBody"));
    }

    #[test]
    fn test_headers_and_delays() {
        let doc = r#"{"data": {"pairs": [{"request": {"headers": {"Accept": "text/html"}}, "response": {}}],
            "globalActions": {"delays": [{"urlPattern": "host1", "delay": 100}]}},
            "meta": {"schemaVersion": "v2", "hoverflyVersion": "v1.5.0"}}"#;
        let sim = import_json(doc).unwrap();
        assert_eq!(sim.pairs[0].matcher.headers.len(), 1);
        assert_eq!(sim.delays.len(), 1);
        assert_eq!(sim.delays[0].destination(), "host1");
        assert_eq!(sim.meta.hoverfly_version.as_deref(), Some("v1.5.0"));
    }

    #[test]
    fn test_log_normal_delays() {
        let doc = r#"{"data": {"pairs": [], "globalActions": {"delaysLogNormal": [
            {"urlPattern": "*.host", "min": 10, "max": 500, "mean": 100, "median": 80}]}}}"#;
        let sim = import_json(doc).unwrap();
        assert_eq!(sim.delays_log_normal.len(), 1);
        assert_eq!(sim.delays_log_normal[0].bounds().median, 80);

        let doc = r#"{"data": {"pairs": [], "globalActions": {"delaysLogNormal": [
            {"urlPattern": "*", "mean": 0, "median": 80}]}}}"#;
        assert!(matches!(import_json(doc), Err(ProxyError::Schema(_))));
    }

    #[test]
    fn test_malformed_json() {
        let err = import_json("{not json").unwrap_err();
        assert!(err.to_string().starts_with("Invalid simulation: malformed document"));
    }
}
