use crate::request::HeaderVec;
use std::sync::Arc;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Response produced by a composed handler.
///
/// The body is already encoded; transports write it as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponse {
    /// HTTP status code (200, 400, 500, etc.)
    pub status: u16,
    /// Response headers (stack-allocated for ≤16 headers)
    pub headers: HeaderVec,
    pub body: Vec<u8>,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with an encoded JSON body.
    #[must_use]
    pub fn json(status: u16, body: Vec<u8>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), CONTENT_TYPE_JSON.to_string()));
        Self::new(status, headers, body)
    }

    /// Response with a plain-text body.
    #[must_use]
    pub fn text(status: u16, message: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), CONTENT_TYPE_TEXT.to_string()));
        Self::new(status, headers, message.into().into_bytes())
    }

    /// Get a header by name
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Body as UTF-8 text, lossy.
    #[must_use]
    pub fn body_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Convert into an `http::Response` for transports built on the `http` crate.
    pub fn into_http(self) -> Result<http::Response<Vec<u8>>, http::Error> {
        let mut builder = http::Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_ref(), value.as_str());
        }
        builder.body(self.body)
    }
}
