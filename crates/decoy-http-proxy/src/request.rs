//! Canonical request fields extracted from an incoming HTTP request.

use bytes::Bytes;
use hyper::{HeaderMap, Method, Uri};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Comparable view of one incoming request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestDetails {
    pub scheme: String,
    pub destination: String,
    pub method: String,
    pub path: String,
    /// Percent-decoded, sorted `key=value` pairs joined with `&`. Matching only.
    pub query: String,
    /// Query string exactly as received. Empty when the request did not come
    /// off the wire, in which case forwarding re-encodes `query`.
    pub raw_query: String,
    pub body: Bytes,
    /// Lower-cased header names to values in arrival order.
    pub headers: BTreeMap<String, Vec<String>>,
}

impl RequestDetails {
    /// Body as text; invalid UTF-8 sequences are replaced.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// `scheme://destination/path?query`, used for forwarding and logging.
    ///
    /// The received query is passed through untouched so escaped delimiters
    /// and parameter order survive the hop.
    pub fn url(&self) -> String {
        let query = if self.raw_query.is_empty() {
            encode_query(&self.query)
        } else {
            self.raw_query.clone()
        };
        if query.is_empty() {
            format!("{}://{}{}", self.scheme, self.destination, self.path)
        } else {
            format!("{}://{}{}?{}", self.scheme, self.destination, self.path, query)
        }
    }
}

/// Extract canonical fields from request parts.
///
/// The scheme and destination come from an absolute (proxy-form) URI when
/// present, otherwise from `default_scheme` and the `Host` header.
pub fn extract(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    default_scheme: &str,
) -> RequestDetails {
    let scheme = uri
        .scheme_str()
        .unwrap_or(default_scheme)
        .to_ascii_lowercase();

    let authority = uri
        .authority()
        .map(|a| a.as_str().to_string())
        .or_else(|| {
            headers
                .get(hyper::header::HOST)
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default();
    let destination = strip_default_port(&scheme, &authority.to_ascii_lowercase());

    let path = match uri.path() {
        "" => "/".to_string(),
        p => p.to_string(),
    };

    let mut header_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers.iter() {
        header_map
            .entry(name.as_str().to_ascii_lowercase())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    RequestDetails {
        scheme,
        destination,
        method: method.as_str().to_ascii_uppercase(),
        path,
        query: canonical_query(uri.query().unwrap_or("")),
        raw_query: uri.query().unwrap_or("").to_string(),
        body,
        headers: header_map,
    }
}

fn strip_default_port(scheme: &str, authority: &str) -> String {
    let default_port = match scheme {
        "http" => ":80",
        "https" => ":443",
        _ => return authority.to_string(),
    };
    authority
        .strip_suffix(default_port)
        .unwrap_or(authority)
        .to_string()
}

/// Percent-decode and sort a raw query string.
///
/// Pairs sort by key, then value. A parameter without `=` is kept as a bare key.
pub fn canonical_query(raw: &str) -> String {
    let mut pairs: Vec<(String, Option<String>)> = raw
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (decode(key), Some(decode(value))),
            None => (decode(pair), None),
        })
        .collect();
    pairs.sort();

    pairs
        .into_iter()
        .map(|(key, value)| match value {
            Some(value) => format!("{key}={value}"),
            None => key,
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Re-encode a canonical query. Only the first `=` of a pair separates key and value.
pub fn encode_query(canonical: &str) -> String {
    canonical
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(value)
            ),
            None => urlencoding::encode(pair).into_owned(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-decode, keeping the input unchanged when it is not valid UTF-8 after decoding.
pub fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| text.to_string())
}
