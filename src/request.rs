//! Transport-agnostic request data handed to the binder.
//!
//! Parameters and headers live in `SmallVec`s so typical requests are bound
//! without heap allocation for the containers themselves. Names are
//! `Arc<str>` because the same names repeat across requests.

use http::Method;
use smallvec::SmallVec;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Maximum inline path/query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Header carrying a caller-supplied request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// ULID identifying one request in logs.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct RequestId(pub ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// The caller's id, or a fresh one when it is absent or not a ULID.
    #[must_use]
    pub fn from_header_or_new(header_value: Option<&str>) -> Self {
        header_value
            .and_then(|value| ulid::Ulid::from_string(value).ok())
            .map_or_else(Self::new, Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// An incoming request as seen by the binder.
///
/// Routing happens outside this crate: the router fills [`path_params`]
/// with the values it extracted from the matched route.
///
/// [`path_params`]: RawRequest::path_params
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Path without the query string
    pub path: String,
    pub path_params: ParamVec,
    /// Decoded query parameters in arrival order
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Request for `target`, a path with an optional `?query`.
    #[must_use]
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };
        Self {
            request_id: RequestId::new(),
            method,
            path: path.to_string(),
            path_params: ParamVec::new(),
            query_params: parse_query_params(query),
            headers: HeaderVec::new(),
            body: Vec::new(),
        }
    }

    /// Adapt an `http::Request` plus the parameters extracted by the router.
    #[must_use]
    pub fn from_http<I, K, V>(request: http::Request<Vec<u8>>, path_params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<String>,
    {
        let (parts, body) = request.into_parts();
        let headers: HeaderVec = parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    Arc::from(name.as_str()),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let request_id = RequestId::from_header_or_new(
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(REQUEST_ID_HEADER))
                .map(|(_, v)| v.as_str()),
        );

        Self {
            request_id,
            method: parts.method,
            path: parts.uri.path().to_string(),
            path_params: path_params
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            query_params: parse_query_params(parts.uri.query().unwrap_or_default()),
            headers,
            body,
        }
    }

    #[must_use]
    pub fn with_path_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.path_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.query_params.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((Arc::from(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Get a path parameter by name
    ///
    /// Uses "last write wins" semantics: with `/org/{id}/user/{id}` the user
    /// id is returned.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name
    ///
    /// Returns the first occurrence for repeated keys (`?tag=a&tag=b` gives `a`).
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decode a raw query string (without the leading `?`).
#[must_use]
pub fn parse_query_params(query: &str) -> ParamVec {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}
