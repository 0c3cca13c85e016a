//! Single-flight, cancel-on-supersede request coordination.
//!
//! # Design
//! The coordinator owns exactly one outstanding request at a time. A call
//! whose fingerprint matches the outstanding request joins it and observes
//! the same result; a call with a different fingerprint cancels the
//! outstanding one and takes its place. Each issued request retries
//! transient failures with exponential backoff, bounds every attempt with a
//! timeout, and always resolves with a normalized [`Envelope`] — failures
//! are reported through the caller-supplied error sink, never raised past
//! the coordinator's boundary. Cancellation (external token, supersession)
//! resolves silently.
//!
//! The pending slot is guarded by a `std::sync::Mutex` held only for
//! synchronous checks, never across an await.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::envelope::{normalize, Envelope};
use crate::error::RequestError;
use crate::fingerprint::fingerprint;
use crate::http::{HttpMethod, HttpRequest};
use crate::transport::HttpTransport;

/// Caller-supplied sink for user-visible error messages.
pub type ErrorSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Retry, backoff and timeout settings for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Total attempts per issued request, including the first.
    pub retries: u32,
    /// Delay before the second attempt; doubles with each further attempt.
    pub base_delay: Duration,
    /// Bound on each individual attempt.
    pub attempt_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

type SharedOutcome = Shared<BoxFuture<'static, Envelope>>;

/// The single outstanding request. Replaced on supersession; cleared when
/// its own future settles and it still owns the slot.
struct PendingRequest {
    fingerprint: String,
    sequence: u64,
    cancel: CancellationToken,
    future: SharedOutcome,
}

/// Single-flight HTTP request coordinator.
///
/// Cheap to clone; clones share the pending slot.
#[derive(Clone)]
pub struct RequestCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    on_error: ErrorSink,
    config: CoordinatorConfig,
    current: Mutex<Option<PendingRequest>>,
    sequence: AtomicU64,
}

impl RequestCoordinator {
    pub fn new(transport: Arc<dyn HttpTransport>, on_error: ErrorSink) -> Self {
        Self::with_config(transport, on_error, CoordinatorConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn HttpTransport>,
        on_error: ErrorSink,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                on_error,
                config,
                current: Mutex::new(None),
                sequence: AtomicU64::new(0),
            }),
        }
    }

    pub async fn get(&self, url: &str) -> Envelope {
        self.issue(HttpMethod::Get, url, None, None).await
    }

    pub async fn post(&self, url: &str, body: Value) -> Envelope {
        self.issue(HttpMethod::Post, url, Some(body), None).await
    }

    pub async fn put(&self, url: &str, body: Value) -> Envelope {
        self.issue(HttpMethod::Put, url, Some(body), None).await
    }

    pub async fn delete(&self, url: &str) -> Envelope {
        self.issue(HttpMethod::Delete, url, None, None).await
    }

    /// Issue a request, subject to deduplication and supersession.
    ///
    /// Always resolves with an [`Envelope`]; protocol failures go through
    /// the error sink, cancellation resolves silently.
    pub async fn issue(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<Value>,
        cancel: Option<CancellationToken>,
    ) -> Envelope {
        let key = fingerprint(&method, url, body.as_ref());

        let future = {
            let mut slot = self.inner.lock_current();

            let joined = slot
                .as_ref()
                .filter(|pending| pending.fingerprint == key)
                .map(|pending| pending.future.clone());

            match joined {
                Some(existing) => {
                    tracing::debug!(fingerprint = %key, "joining in-flight request");
                    existing
                }
                None => {
                    if let Some(pending) = slot.take() {
                        tracing::debug!(
                            superseded = %pending.fingerprint,
                            by = %key,
                            "cancelling outstanding request"
                        );
                        pending.cancel.cancel();
                    }

                    let sequence = self.inner.sequence.fetch_add(1, Ordering::Relaxed);
                    let token = CancellationToken::new();
                    let future = Inner::run(
                        self.inner.clone(),
                        sequence,
                        method,
                        url.to_string(),
                        body,
                        token.clone(),
                        cancel,
                    )
                    .boxed()
                    .shared();

                    *slot = Some(PendingRequest {
                        fingerprint: key,
                        sequence,
                        cancel: token,
                        future: future.clone(),
                    });
                    future
                }
            }
        };

        future.await
    }
}

impl Inner {
    fn lock_current(&self) -> MutexGuard<'_, Option<PendingRequest>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drive one issued request to settlement and clear the slot if this
    /// request still owns it.
    async fn run(
        self: Arc<Self>,
        sequence: u64,
        method: HttpMethod,
        url: String,
        body: Option<Value>,
        cancel: CancellationToken,
        external: Option<CancellationToken>,
    ) -> Envelope {
        let outcome = self
            .execute(&method, &url, body.as_ref(), &cancel, external.as_ref())
            .await;

        {
            let mut slot = self.lock_current();
            if slot.as_ref().is_some_and(|p| p.sequence == sequence) {
                *slot = None;
            }
        }

        match outcome {
            Ok(envelope) => envelope,
            Err(RequestError::Cancelled) => Envelope::error(),
            Err(err) => {
                (self.on_error)(&format!("{err} ({} {url})", method.as_str()));
                Envelope::error()
            }
        }
    }

    /// The retry loop: transport errors, timeouts and non-2xx statuses are
    /// retried with exponential backoff; envelope-level failures after a
    /// 2xx are not. Cancellation short-circuits everything.
    async fn execute(
        &self,
        method: &HttpMethod,
        url: &str,
        body: Option<&Value>,
        cancel: &CancellationToken,
        external: Option<&CancellationToken>,
    ) -> Result<Envelope, RequestError> {
        let request = HttpRequest {
            method: method.clone(),
            url: url.to_string(),
            headers: match body {
                Some(_) => vec![("content-type".to_string(), "application/json".to_string())],
                None => Vec::new(),
            },
            body: body.map(Value::to_string),
        };

        let mut last_error = None;
        for attempt in 0..self.config.retries {
            let attempt_result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RequestError::Cancelled),
                _ = wait_cancelled(external) => return Err(RequestError::Cancelled),
                result = tokio::time::timeout(
                    self.config.attempt_timeout,
                    self.transport.execute(request.clone()),
                ) => result,
            };

            let error = match attempt_result {
                Ok(Ok(response)) if response.is_success() => return normalize(&response),
                Ok(Ok(response)) => RequestError::Http {
                    status: response.status,
                    status_text: response.status_text,
                },
                Ok(Err(err)) => RequestError::Transport(err.to_string()),
                Err(_) => RequestError::TimedOut,
            };
            tracing::debug!(attempt, %error, "request attempt failed");
            last_error = Some(error);

            if attempt + 1 < self.config.retries {
                let backoff = self.config.base_delay * 2u32.pow(attempt);
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RequestError::Cancelled),
                    _ = wait_cancelled(external) => return Err(RequestError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
        }

        let error =
            last_error.unwrap_or_else(|| RequestError::Transport("retry budget is zero".into()));
        tracing::warn!(%error, retries = self.config.retries, "retries exhausted");
        Err(error)
    }
}

/// Pends forever when no external token was supplied.
async fn wait_cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
