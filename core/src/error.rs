//! Error types for coordinated requests.
//!
//! # Design
//! `Cancelled` gets a dedicated variant because the coordinator treats it
//! fundamentally differently from every other failure: a cancelled request
//! resolves silently and never reaches the error sink. All other variants
//! are formatted into a single human-readable message for the sink.

use std::fmt;

/// Failure of a single coordinated request, after retries where applicable.
#[derive(Debug, Clone)]
pub enum RequestError {
    /// The transport failed before a response was received.
    Transport(String),

    /// An attempt exceeded the per-attempt timeout.
    TimedOut,

    /// The server answered with a status outside the 2xx range.
    Http { status: u16, status_text: String },

    /// The response body was not a valid envelope.
    Decode(String),

    /// The envelope carried `status: "error"` with this message.
    Api(String),

    /// The request was cancelled — external signal or supersession.
    Cancelled,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(msg) => write!(f, "{msg}"),
            RequestError::TimedOut => write!(f, "request timed out"),
            RequestError::Http {
                status,
                status_text,
            } => write!(f, "{status}: {status_text}"),
            RequestError::Decode(msg) => write!(f, "invalid response body: {msg}"),
            RequestError::Api(msg) => write!(f, "{msg}"),
            RequestError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for RequestError {}
