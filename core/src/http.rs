//! HTTP transport types described as plain data.
//!
//! # Design
//! Requests and responses are plain owned values with no I/O attached. The
//! coordinator builds `HttpRequest` values and interprets `HttpResponse`
//! values; an `HttpTransport` implementation executes the round-trip in
//! between. This keeps the core deterministic and lets tests substitute
//! scripted transports for the network.

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// An HTTP request described as plain data.
///
/// Built by the coordinator and handed to an `HttpTransport` for execution.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

/// An HTTP response described as plain data.
///
/// `status_text` carries the reason phrase ("Not Found", "Internal Server
/// Error") so non-2xx failures can be reported as `"{status}: {status_text}"`.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx success range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
