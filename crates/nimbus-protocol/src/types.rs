//! The protocol enumeration and the neutral request/response value objects.

use std::collections::HashMap;

use bytes::Bytes;

/// The four wire encodings an emulated service can commit to.
///
/// The protocol is chosen once per service and never changes at runtime; it
/// selects both the request decoding and the response/error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolType {
    /// Form-encoded requests, XML responses wrapped in `<ActionResponse>`
    /// (relational-DB / compute / queue style APIs).
    Query,
    /// Headers-only JSON 1.0 style: action in a target header, JSON bodies.
    Json,
    /// Path-addressed XML (storage APIs).
    RestXml,
    /// Path-addressed JSON (function / gateway APIs).
    RestJson,
}

impl ProtocolType {
    /// The `Content-Type` value this protocol puts on success responses.
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Query => "text/xml",
            Self::Json => "application/x-amz-json-1.0",
            Self::RestXml => "application/xml",
            Self::RestJson => "application/json",
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Json => "json",
            Self::RestXml => "rest-xml",
            Self::RestJson => "rest-json",
        })
    }
}

/// A neutral inbound request, built once per HTTP call and read-only to all
/// downstream components.
///
/// Header names are normalized to lowercase by `http::HeaderMap`; every
/// routing signal in this engine is header-name insensitive.
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method.
    pub method: http::Method,
    /// Request path; may still embed a query string.
    pub path: String,
    /// Request headers as received.
    pub headers: http::HeaderMap,
    /// Raw body bytes. Owned, so reading it never consumes it.
    pub body: Bytes,
    /// Action name, if a prior stage already resolved it.
    pub action: Option<String>,
    /// Pre-parsed parameter map, if a prior stage already produced one.
    pub params: Option<HashMap<String, String>>,
    /// Service name extracted by an upstream authentication step from a
    /// signed request. Highest-priority routing signal when present.
    pub service_hint: Option<String>,
}

impl Request {
    /// Create a request from its transport-level parts.
    #[must_use]
    pub fn new(
        method: http::Method,
        path: impl Into<String>,
        headers: http::HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
            action: None,
            params: None,
            service_hint: None,
        }
    }

    /// Attach the authenticated-service hint an upstream auth step produced.
    #[must_use]
    pub fn with_service_hint(mut self, service: impl Into<String>) -> Self {
        self.service_hint = Some(service.into());
        self
    }

    /// Read a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The path with any query string stripped.
    #[must_use]
    pub fn path_only(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }

    /// The first path segment, if any.
    #[must_use]
    pub fn first_path_segment(&self) -> Option<&str> {
        self.path_only()
            .trim_start_matches('/')
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
    }

    /// The effective host: `X-Forwarded-Host` if set (to survive reverse
    /// proxies), otherwise `Host`. Port stripped.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        let raw = self
            .header("x-forwarded-host")
            .or_else(|| self.header("host"))?;
        Some(raw.split(':').next().unwrap_or(raw))
    }
}

/// A neutral outbound response, constructed exactly once by the encoder and
/// immutable afterward.
#[derive(Debug, Clone)]
pub struct Response {
    /// HTTP status code.
    pub status: http::StatusCode,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// Raw body bytes.
    pub body: Bytes,
}

impl Response {
    /// Create an empty response with the given status.
    #[must_use]
    pub fn new(status: http::StatusCode) -> Self {
        Self {
            status,
            headers: http::HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header. Invalid names or values are skipped rather than
    /// panicking; the encoder only passes constants and UUIDs here.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::try_from(name),
            http::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Read a header value as a string, if present and valid UTF-8.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
