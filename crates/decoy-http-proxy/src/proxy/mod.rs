//! Proxy server module.
//!
//! # Module Structure
//!
//! - `server` - ProxyServer struct, accept loops and request dispatch
//! - `controller` - Per-mode request flows over the pair store and journal
//! - `upstream` - Real upstream calls
//! - `response` - Template and error response rendering
//! - `headers` - Shared header names and hop-by-hop filtering

mod controller;
mod headers;
mod response;
mod server;
mod upstream;

pub use controller::{ControllerSettings, Dispatched, ModeController};
pub use headers::{is_hop_by_hop, X_DECOY_ERROR, X_DECOY_MODE};
pub use response::{error_response, template_response};
pub use server::{dispatch, serve_metrics, ProxyServer};
pub use upstream::{ReqwestUpstream, Upstream, UpstreamError};
