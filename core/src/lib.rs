//! Async client core for a contacts REST API.
//!
//! # Overview
//! The centerpiece is [`RequestCoordinator`]: a single-flight,
//! cancel-on-supersede wrapper around an [`HttpTransport`]. At most one
//! request is outstanding at a time; identical concurrent calls collapse
//! into one flight, a distinct call preempts the outstanding one, transient
//! failures retry with exponential backoff, every attempt is bounded by a
//! timeout, and every outcome is normalized into the uniform [`Envelope`]
//! shape. [`ContactService`] layers the resource-oriented contacts API on
//! top.
//!
//! # Design
//! - Transport is a trait seam: production uses [`ReqwestTransport`], tests
//!   use scripted in-memory transports.
//! - Protocol failures never escape as errors — they go to the caller's
//!   [`ErrorSink`] and resolve as `{status: error, data: null}`.
//! - Cancellation (external [`CancellationToken`], supersession) resolves
//!   silently and never retries.
//! - Request identity uses canonical JSON, so key order never splits a
//!   fingerprint.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod coordinator;
pub mod envelope;
pub mod error;
pub mod fingerprint;
pub mod http;
pub mod service;
pub mod transport;
pub mod types;

pub use coordinator::{CoordinatorConfig, ErrorSink, RequestCoordinator};
pub use envelope::{normalize, Envelope, EnvelopeStatus};
pub use error::RequestError;
pub use fingerprint::{canonical_json, fingerprint};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use service::ContactService;
pub use transport::{HttpTransport, ReqwestTransport, TransportError};
pub use types::{Address, Contact, PhoneNumber};
