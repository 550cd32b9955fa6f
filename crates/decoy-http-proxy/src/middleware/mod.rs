//! Middleware bridge: pipe a request/response pair through an external rewriter.
//!
//! A target starting with `http://` or `https://` is a remote endpoint;
//! anything else is a command line run once per invocation. Both exchange
//! one JSON document `{"request": ..., "response": ...}` each way.
//!
//! The inputs are only borrowed. On success new values are returned; on any
//! failure the caller still holds the originals untouched.

mod local;
mod remote;
mod views;

pub use local::LocalMiddleware;
pub use remote::RemoteMiddleware;
pub use views::{MiddlewareInput, MiddlewareReply, RequestView};

use crate::error::ProxyError;
use crate::metrics;
use crate::request::RequestDetails;
use crate::simulation::ResponseTemplate;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Rewritten exchange returned by middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiddlewareOutput {
    pub request: RequestDetails,
    pub response: Option<ResponseTemplate>,
}

#[derive(Debug, Clone)]
pub enum Middleware {
    Local(LocalMiddleware),
    Remote(RemoteMiddleware),
}

impl Middleware {
    pub fn from_target(target: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let trimmed = target.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            RemoteMiddleware::new(trimmed, timeout).map(Middleware::Remote)
        } else {
            LocalMiddleware::new(trimmed, timeout).map(Middleware::Local)
        }
    }

    pub fn describe(&self) -> &str {
        match self {
            Middleware::Local(local) => local.program(),
            Middleware::Remote(remote) => remote.url(),
        }
    }

    /// Run one exchange through the middleware.
    pub async fn run(
        &self,
        request: &RequestDetails,
        response: Option<&ResponseTemplate>,
    ) -> Result<MiddlewareOutput, ProxyError> {
        let start = Instant::now();
        let result = self.run_inner(request, response).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        };
        metrics::record_middleware(outcome, elapsed_ms);

        match &result {
            Ok(_) => debug!(middleware = %self.describe(), elapsed_ms, "Middleware succeeded"),
            Err(e) => warn!(middleware = %self.describe(), elapsed_ms, "Middleware failed: {}", e),
        }
        result
    }

    async fn run_inner(
        &self,
        request: &RequestDetails,
        response: Option<&ResponseTemplate>,
    ) -> Result<MiddlewareOutput, ProxyError> {
        let input = MiddlewareInput {
            request: RequestView::from(request),
            response,
        };
        let payload = serde_json::to_vec(&input)
            .map_err(|e| ProxyError::MiddlewareUnavailable(format!("cannot encode payload: {e}")))?;

        let stdout = match self {
            Middleware::Local(local) => local.exchange(&payload).await?,
            Middleware::Remote(remote) => remote.exchange(&payload).await?,
        };

        parse_reply(&stdout)
    }
}

/// Parse a middleware reply document.
pub fn parse_reply(output: &[u8]) -> Result<MiddlewareOutput, ProxyError> {
    let reply: MiddlewareReply = serde_json::from_slice(output)
        .map_err(|e| ProxyError::MiddlewareInvalidOutput(format!("invalid JSON: {e}")))?;

    if let Some(response) = &reply.response {
        response.body_bytes().map_err(|e| {
            ProxyError::MiddlewareInvalidOutput(format!("encodedBody is not valid base64: {e}"))
        })?;
    }

    Ok(MiddlewareOutput {
        request: RequestDetails::from(reply.request),
        response: reply.response,
    })
}
