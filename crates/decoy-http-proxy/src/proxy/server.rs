//! ProxyServer struct and accept loops.

use super::controller::ModeController;
use super::response::{error_response, template_response};
use crate::config::Config;
use crate::metrics;
use crate::request;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub struct ProxyServer {
    config: Arc<Config>,
    controller: Arc<ModeController>,
}

impl ProxyServer {
    pub fn new(config: Config, controller: Arc<ModeController>) -> Self {
        Self {
            config: Arc::new(config),
            controller,
        }
    }

    pub fn controller(&self) -> &Arc<ModeController> {
        &self.controller
    }

    /// Bind the proxy (and metrics) listeners and serve until an accept fails.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let addr = format!("{}:{}", self.config.listen.host, self.config.listen.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("Decoy proxy listening on http://{}", listener.local_addr()?);
        info!(
            "Mode: {}, {} pair(s) loaded",
            self.controller.mode(),
            self.controller.store().len()
        );
        if let Some(middleware) = self.controller.middleware() {
            info!("Middleware: {}", middleware.describe());
        }

        if self.config.metrics.enabled {
            let metrics_addr = format!("{}:{}", self.config.listen.host, self.config.metrics.port);
            let metrics_listener = TcpListener::bind(&metrics_addr).await?;
            info!("Metrics available on http://{}/metrics", metrics_listener.local_addr()?);
            tokio::spawn(async move {
                if let Err(e) = serve_metrics(metrics_listener).await {
                    error!("Metrics server stopped: {}", e);
                }
            });
        }

        self.serve(listener).await
    }

    /// Serve proxy traffic on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        let default_scheme: Arc<str> = Arc::from(self.config.upstream.default_scheme.as_str());

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let controller = Arc::clone(&self.controller);
            let default_scheme = Arc::clone(&default_scheme);

            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let controller = Arc::clone(&controller);
                    let default_scheme = Arc::clone(&default_scheme);
                    async move { handle_request(controller, req, &default_scheme).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving HTTP connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

async fn handle_request(
    controller: Arc<ModeController>,
    req: Request<Incoming>,
    default_scheme: &str,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            let mut response = Response::new(Full::new(Bytes::from("failed to read request body\n")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };

    Ok(dispatch(&controller, &parts.method, &parts.uri, &parts.headers, body, default_scheme).await)
}

/// Run one request through the controller and render the client response.
pub async fn dispatch(
    controller: &ModeController,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    default_scheme: &str,
) -> Response<Full<Bytes>> {
    let start = Instant::now();
    let details = request::extract(method, uri, headers, body, default_scheme);
    let dispatched = controller.handle(&details).await;

    let response = match &dispatched.result {
        Ok(template) => template_response(template, dispatched.mode),
        Err(err) => {
            debug!(kind = %err.kind(), "Request failed: {}", err);
            error_response(err, controller.settings().no_match_status, dispatched.mode)
        }
    };

    let status = response.status().as_u16();
    metrics::record_request(dispatched.mode.as_str(), status);
    debug!(
        mode = %dispatched.mode,
        method = %details.method,
        url = %details.url(),
        status,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request served"
    );
    response
}

/// Serve the Prometheus text exposition on `/metrics`.
pub async fn serve_metrics(listener: TcpListener) -> Result<(), anyhow::Error> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(|req: Request<Incoming>| async move {
                Ok::<_, Infallible>(metrics_response(req.method(), req.uri().path()))
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Metrics connection error: {}", e);
            }
        });
    }
}

fn metrics_response(method: &Method, path: &str) -> Response<Full<Bytes>> {
    if method == Method::GET && path == "/metrics" {
        let mut response = Response::new(Full::new(Bytes::from(metrics::collect_metrics())));
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        );
        response
    } else {
        let mut response = Response::new(Full::new(Bytes::from("Not Found\n")));
        *response.status_mut() = StatusCode::NOT_FOUND;
        response
    }
}
