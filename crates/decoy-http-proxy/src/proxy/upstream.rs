//! Real upstream calls used by capture, modify and spy flows.

use super::headers::is_hop_by_hop;
use crate::metrics;
use crate::request::RequestDetails;
use crate::simulation::ResponseTemplate;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("upstream request to {url} timed out")]
    Timeout { url: String },

    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),
}

/// Makes the real HTTP(S) call for a request.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn forward(&self, request: &RequestDetails) -> Result<ResponseTemplate, UpstreamError>;
}

/// Default upstream over a shared `reqwest` client.
///
/// Redirects are not followed so the client sees what the destination sent.
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| UpstreamError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for ReqwestUpstream {
    async fn forward(&self, request: &RequestDetails) -> Result<ResponseTemplate, UpstreamError> {
        let url = request.url();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| UpstreamError::InvalidRequest(format!("method {}: {e}", request.method)))?;

        let mut builder = self.client.request(method, &url);
        for (name, values) in &request.headers {
            if is_hop_by_hop(name) || name == "host" || name == "content-length" {
                continue;
            }
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        debug!(url = %url, method = %request.method, "Forwarding to upstream");
        let start = Instant::now();
        let response = builder.send().await.map_err(|e| map_error(&url, e))?;

        let status = response.status().as_u16();
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in response.headers() {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        let body = response.bytes().await.map_err(|e| map_error(&url, e))?;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_upstream_duration(&request.method, status, elapsed_ms);
        debug!(url = %url, status, elapsed_ms, "Upstream responded");

        Ok(ResponseTemplate::from_bytes(status, &body, headers))
    }
}

fn map_error(url: &str, err: reqwest::Error) -> UpstreamError {
    if err.is_timeout() {
        UpstreamError::Timeout {
            url: url.to_string(),
        }
    } else {
        UpstreamError::Request {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}
