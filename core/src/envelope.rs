//! The normalized result envelope returned to every caller.
//!
//! # Design
//! The server answers with either `{status, data, message?, meta?}` JSON or
//! a bare 204. Callers only ever see `Envelope`: `{status, data, meta?}`.
//! `normalize` performs that mapping for responses already known to be 2xx;
//! everything else (non-2xx, transport failures) is handled by the
//! coordinator before normalization is reached.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;
use crate::http::HttpResponse;

/// Outcome marker of a normalized result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// The only result shape the coordinator ever resolves with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: EnvelopeStatus,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Envelope {
    pub fn success(data: Value, meta: Option<Value>) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            data,
            meta,
        }
    }

    /// The silent error result: null data, no meta.
    pub fn error() -> Self {
        Self {
            status: EnvelopeStatus::Error,
            data: Value::Null,
            meta: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }

    /// Deserialize `data` into a concrete type.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// What the server actually sends in a JSON body.
#[derive(Debug, Deserialize)]
struct WireEnvelope {
    status: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    meta: Option<Value>,
}

/// Normalize a 2xx response into an `Envelope`.
///
/// 204 becomes a success with null data. Any other body must parse as a wire
/// envelope; a wire `status` other than `"success"` fails with the server's
/// message (or a generic fallback).
pub fn normalize(response: &HttpResponse) -> Result<Envelope, RequestError> {
    if response.status == 204 {
        return Ok(Envelope::success(Value::Null, None));
    }

    let wire: WireEnvelope =
        serde_json::from_str(&response.body).map_err(|e| RequestError::Decode(e.to_string()))?;

    if wire.status != "success" {
        return Err(RequestError::Api(
            wire.message.unwrap_or_else(|| "Request failed".to_string()),
        ));
    }

    Ok(Envelope::success(wire.data, wire.meta))
}
