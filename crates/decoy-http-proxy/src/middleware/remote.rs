//! Remote middleware: the payload is POSTed to an HTTP endpoint.

use crate::error::ProxyError;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RemoteMiddleware {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl RemoteMiddleware {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::MiddlewareUnavailable(format!("HTTP client: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            timeout,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// POST the payload and return the response body of a 200 reply.
    pub async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ProxyError::MiddlewareInvalidOutput(format!(
                "{} answered {}",
                self.url, status
            )));
        }

        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(body.to_vec())
    }

    fn map_error(&self, err: reqwest::Error) -> ProxyError {
        if err.is_timeout() {
            ProxyError::MiddlewareTimeout(self.timeout)
        } else {
            ProxyError::MiddlewareUnavailable(format!("{}: {}", self.url, err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_refused_is_unavailable() {
        // Port 9 (discard) is not expected to be listening on loopback
        let mw = RemoteMiddleware::new("http://127.0.0.1:9/middleware", Duration::from_secs(2))
            .unwrap();
        let err = mw.exchange(b"{}").await.unwrap_err();
        assert!(matches!(err, ProxyError::MiddlewareUnavailable(_)));
    }
}
