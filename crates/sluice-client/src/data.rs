//! Data layer: immutable request descriptions, payload shapes and
//! pass-through configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How request parameters travel: appended to the query string or sent as a
/// JSON object body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Query,
    Json,
}

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// One part of a multipart upload body, in submission order.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub data: Bytes,
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
}

/// Immutable description of one outbound call.
///
/// A `Request` carries no connection state and performs no network-aware
/// validation; it is a passive value the transport interprets. Parameters
/// live in a sorted map so the derived cache key is canonical regardless of
/// insertion order.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    parameters: BTreeMap<String, Value>,
    headers: Vec<(String, String)>,
    encoding: Encoding,
    basic_auth: Option<BasicAuth>,
    upload_parts: Vec<UploadPart>,
    use_cache: bool,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            parameters: BTreeMap::new(),
            headers: Vec::new(),
            encoding: Encoding::default(),
            basic_auth: None,
            upload_parts: Vec::new(),
            use_cache: false,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.basic_auth = Some(BasicAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_part(mut self, part: UploadPart) -> Self {
        self.upload_parts.push(part);
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn basic_auth(&self) -> Option<&BasicAuth> {
        self.basic_auth.as_ref()
    }

    pub fn upload_parts(&self) -> &[UploadPart] {
        &self.upload_parts
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Canonical identity of this request for store lookups.
    pub fn cache_key(&self) -> String {
        crate::core::cache_key(self)
    }

    /// One-line human-readable rendering for diagnostics.
    pub fn log_line(&self, redact_parameters: bool) -> String {
        let mut line = format!("{} {}", self.method, self.url);
        if !self.parameters.is_empty() {
            line.push_str(" {");
            for (i, (name, value)) in self.parameters.iter().enumerate() {
                if i > 0 {
                    line.push_str(", ");
                }
                line.push_str(name);
                line.push('=');
                if redact_parameters {
                    line.push_str("<redacted>");
                } else {
                    line.push_str(&value.to_string());
                }
            }
            line.push('}');
        }
        if !self.upload_parts.is_empty() {
            line.push_str(&format!(" [{} upload parts]", self.upload_parts.len()));
        }
        line
    }
}

/// Whether a decoded payload is one object or a sequence of objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    Many,
}

/// A decoded response payload: one object or a sequence of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload<T> {
    Single(T),
    Many(Vec<T>),
}

impl<T> Payload<T> {
    pub fn shape(&self) -> Shape {
        match self {
            Payload::Single(_) => Shape::Single,
            Payload::Many(_) => Shape::Many,
        }
    }

    /// The empty sequence, the usual fallback for list endpoints.
    pub fn empty_list() -> Self {
        Payload::Many(Vec::new())
    }
}

/// Independent diagnostic categories; each flag gates one kind of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogFlags {
    pub request: bool,
    pub request_parameters: bool,
    pub raw_request: bool,
    pub response_status: bool,
    pub url_response: bool,
    pub response_data: bool,
    pub error: bool,
    pub cache: bool,
}

impl LogFlags {
    pub const NONE: LogFlags = LogFlags {
        request: false,
        request_parameters: false,
        raw_request: false,
        response_status: false,
        url_response: false,
        response_data: false,
        error: false,
        cache: false,
    };

    pub const ALL: LogFlags = LogFlags {
        request: true,
        request_parameters: true,
        raw_request: true,
        response_status: true,
        url_response: true,
        response_data: true,
        error: true,
        cache: true,
    };
}

/// Terminal disposition of one live call, as seen by the hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

pub type BeforeSend = Arc<dyn Fn(&Request) + Send + Sync>;
pub type AfterResponse = Arc<dyn Fn(Outcome) + Send + Sync>;

/// Optional observer callbacks around the live call, e.g. for a network
/// activity indicator. The pipeline invokes them at fixed points but never
/// depends on what they do.
#[derive(Clone, Default)]
pub struct Hooks {
    pub before_send: Option<BeforeSend>,
    pub after_response: Option<AfterResponse>,
}

impl Hooks {
    pub(crate) fn notify_before(&self, request: &Request) {
        if let Some(ref hook) = self.before_send {
            hook(request);
        }
    }

    pub(crate) fn notify_after(&self, outcome: Outcome) {
        if let Some(ref hook) = self.after_response {
            hook(outcome);
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("before_send", &self.before_send.is_some())
            .field("after_response", &self.after_response.is_some())
            .finish()
    }
}

/// Raw transport result: status, headers and body bytes, untouched.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_line_renders_parameters() {
        let request = Request::new(Method::Get, "https://api.example.com/tracks")
            .with_parameter("artist", "holly")
            .with_parameter("limit", 10);
        assert_eq!(
            request.log_line(false),
            "GET https://api.example.com/tracks {artist=\"holly\", limit=10}"
        );
    }

    #[test]
    fn log_line_redacts_on_request() {
        let request = Request::new(Method::Post, "https://api.example.com/login")
            .with_parameter("password", "hunter2");
        assert_eq!(
            request.log_line(true),
            "POST https://api.example.com/login {password=<redacted>}"
        );
    }

    #[test]
    fn payload_shape_matches_variant() {
        assert_eq!(Payload::Single(1).shape(), Shape::Single);
        assert_eq!(Payload::<i32>::empty_list().shape(), Shape::Many);
    }

    #[test]
    fn cache_is_off_by_default() {
        assert!(!Request::new(Method::Get, "https://example.com").use_cache());
    }
}
