//! JSON shapes exchanged with middleware.

use crate::request::RequestDetails;
use crate::simulation::ResponseTemplate;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request as seen by middleware. The body is text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestView {
    pub path: String,
    pub method: String,
    pub destination: String,
    pub scheme: String,
    pub query: String,
    pub body: String,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl From<&RequestDetails> for RequestView {
    fn from(request: &RequestDetails) -> Self {
        Self {
            path: request.path.clone(),
            method: request.method.clone(),
            destination: request.destination.clone(),
            scheme: request.scheme.clone(),
            query: request.query.clone(),
            body: request.body_text().into_owned(),
            headers: request.headers.clone(),
        }
    }
}

impl From<RequestView> for RequestDetails {
    fn from(view: RequestView) -> Self {
        Self {
            scheme: view.scheme.to_ascii_lowercase(),
            destination: view.destination.to_ascii_lowercase(),
            method: view.method.to_ascii_uppercase(),
            path: view.path,
            query: view.query,
            raw_query: String::new(),
            body: Bytes::from(view.body),
            headers: view
                .headers
                .into_iter()
                .map(|(name, values)| (name.to_ascii_lowercase(), values))
                .collect(),
        }
    }
}

/// Payload written to middleware.
#[derive(Debug, Serialize)]
pub struct MiddlewareInput<'a> {
    pub request: RequestView,
    pub response: Option<&'a ResponseTemplate>,
}

/// Document read back from middleware.
#[derive(Debug, Deserialize)]
pub struct MiddlewareReply {
    pub request: RequestView,
    #[serde(default)]
    pub response: Option<ResponseTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_shape() {
        let request = RequestDetails {
            method: "GET".into(),
            path: "/a".into(),
            body: Bytes::from_static(b"hi"),
            ..Default::default()
        };
        let input = MiddlewareInput {
            request: RequestView::from(&request),
            response: None,
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["request"]["method"], "GET");
        assert_eq!(json["request"]["body"], "hi");
        assert!(json["response"].is_null());
    }

    #[test]
    fn test_reply_normalizes_request() {
        let reply: MiddlewareReply = serde_json::from_str(
            r#"{"request": {"method": "post", "headers": {"X-A": ["1"]}},
                "response": {"status": 201, "body": "made"}}"#,
        )
        .unwrap();
        let request = RequestDetails::from(reply.request);
        assert_eq!(request.method, "POST");
        assert_eq!(request.headers["x-a"], vec!["1"]);
        assert_eq!(reply.response.unwrap().status, 201);
    }
}
