//! Header names and filtering shared by the proxy paths.

use hyper::header::HeaderName;

/// Error kind attached to every error response.
pub static X_DECOY_ERROR: HeaderName = HeaderName::from_static("x-decoy-error");
/// Mode that served the response.
pub static X_DECOY_MODE: HeaderName = HeaderName::from_static("x-decoy-mode");

const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Connection-scoped headers that must not be forwarded or replayed.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}
