//! Conversion of dispatch results into hyper responses.

use super::headers::{is_hop_by_hop, X_DECOY_ERROR, X_DECOY_MODE};
use crate::error::ProxyError;
use crate::recording::Mode;
use crate::simulation::ResponseTemplate;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tracing::warn;

/// Build a client response from a template.
///
/// Invalid header names or values are skipped with a warning. An encoded
/// body that fails to decode becomes a 500.
pub fn template_response(template: &ResponseTemplate, mode: Mode) -> Response<Full<Bytes>> {
    let body = match template.body_bytes() {
        Ok(body) => body,
        Err(e) => {
            warn!("Response body is not valid base64: {}", e);
            return plain_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "response body is not valid base64",
                "invalid_response",
                mode,
            );
        }
    };

    let status = StatusCode::from_u16(template.status).unwrap_or_else(|_| {
        warn!(status = template.status, "Invalid response status, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, values) in &template.headers {
        if is_hop_by_hop(name) || name.eq_ignore_ascii_case(CONTENT_LENGTH.as_str()) {
            continue;
        }
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!(header = %name, "Skipping invalid response header name");
            continue;
        };
        for value in values {
            match HeaderValue::from_str(value) {
                Ok(header_value) => {
                    headers.append(header_name.clone(), header_value);
                }
                Err(_) => warn!(header = %name, "Skipping invalid response header value"),
            }
        }
    }
    headers.insert(X_DECOY_MODE.clone(), HeaderValue::from_static(mode.as_str()));
    response
}

/// Build a `text/plain` error response tagged with the error kind.
pub fn error_response(err: &ProxyError, no_match_status: u16, mode: Mode) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code(no_match_status))
        .unwrap_or(StatusCode::BAD_GATEWAY);
    plain_response(status, &err.to_string(), err.kind().as_str(), mode)
}

fn plain_response(status: StatusCode, message: &str, kind: &'static str, mode: Mode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(format!("{message}\n"))));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_DECOY_ERROR.clone(), HeaderValue::from_static(kind));
    headers.insert(X_DECOY_MODE.clone(), HeaderValue::from_static(mode.as_str()));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_template_response() {
        let template = ResponseTemplate::new(201, "created")
            .with_header("Content-Type", "text/plain")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2")
            .with_header("Transfer-Encoding", "chunked")
            .with_header("Content-Length", "999");
        let response = template_response(&template, Mode::Simulate);
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
        assert!(response.headers().get("transfer-encoding").is_none());
        assert!(response.headers().get("content-length").is_none());
        assert_eq!(response.headers()["x-decoy-mode"], "simulate");
        assert_eq!(body_string(response).await, "created");
    }

    #[tokio::test]
    async fn test_encoded_body_is_decoded() {
        let template = ResponseTemplate::from_bytes(200, &[0xff, 0x00], Default::default());
        let response = template_response(&template, Mode::Spy);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), &[0xff, 0x00]);
    }

    #[tokio::test]
    async fn test_error_response() {
        let err = ProxyError::NoMatch {
            closest_miss: Some("pair #0 matched 1 constraint(s) but missed [method]".into()),
        };
        let response = error_response(&err, 502, Mode::Simulate);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["x-decoy-error"], "no_match");
        let body = body_string(response).await;
        assert!(body.contains("missed [method]"));
    }

    #[test]
    fn test_configured_no_match_status() {
        let err = ProxyError::NoMatch { closest_miss: None };
        assert_eq!(error_response(&err, 404, Mode::Spy).status(), StatusCode::NOT_FOUND);
    }
}
