//! Pair generation from captured exchanges.

use crate::predicate::{FieldSpec, HeaderSpec, RequestMatcher};
use crate::request::RequestDetails;
use crate::simulation::{Pair, ResponseTemplate};

/// Build a pair from a live request and its real response.
///
/// Method, scheme, destination, path and query get exact matchers; the body
/// only when non-empty. Headers are constrained only for the names listed in
/// `capture_headers` (`*` captures all).
pub fn capture_pair(
    request: &RequestDetails,
    response: &ResponseTemplate,
    capture_headers: &[String],
) -> Pair {
    let body = if request.body.is_empty() {
        FieldSpec::wildcard()
    } else {
        FieldSpec::exact(request.body_text())
    };

    let matcher = RequestMatcher {
        method: FieldSpec::exact(request.method.as_str()),
        scheme: FieldSpec::exact(request.scheme.as_str()),
        destination: FieldSpec::exact(request.destination.as_str()),
        path: FieldSpec::exact(request.path.as_str()),
        query: FieldSpec::exact(request.query.as_str()),
        body,
        headers: captured_headers(request, capture_headers),
    };

    Pair::new(matcher, response.clone())
}

fn captured_headers(request: &RequestDetails, capture_headers: &[String]) -> HeaderSpec {
    let capture_all = capture_headers.iter().any(|h| h == "*");
    request
        .headers
        .iter()
        .filter(|(name, _)| {
            capture_all || capture_headers.iter().any(|h| h.eq_ignore_ascii_case(name))
        })
        .map(|(name, values)| (name.clone(), values.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(body: &'static [u8]) -> RequestDetails {
        RequestDetails {
            scheme: "http".into(),
            destination: "destination.com".into(),
            method: "POST".into(),
            path: "/orders".into(),
            query: "a=1".into(),
            raw_query: "a=1".into(),
            body: Bytes::from_static(body),
            headers: [
                ("content-type".to_string(), vec!["application/json".to_string()]),
                ("x-request-id".to_string(), vec!["42".to_string()]),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn test_captured_pair_matches_its_request() {
        let req = request(br#"{"id":1}"#);
        let pair = capture_pair(&req, &ResponseTemplate::new(201, "created"), &[]);
        assert!(pair.matcher.matches(&req));
        assert_eq!(pair.matcher.specificity(), 6);
        assert!(pair.matcher.headers.is_empty());
        assert_eq!(pair.response.status, 201);
    }

    #[test]
    fn test_empty_body_is_wildcard() {
        let pair = capture_pair(&request(b""), &ResponseTemplate::default(), &[]);
        assert!(pair.matcher.body.is_wildcard());
    }

    #[test]
    fn test_capture_selected_headers() {
        let req = request(b"");
        let pair = capture_pair(
            &req,
            &ResponseTemplate::default(),
            &["Content-Type".to_string()],
        );
        let names: Vec<_> = pair.matcher.headers.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["content-type"]);

        let pair = capture_pair(&req, &ResponseTemplate::default(), &["*".to_string()]);
        assert_eq!(pair.matcher.headers.len(), 2);
        assert!(pair.matcher.matches(&req));
    }
}
