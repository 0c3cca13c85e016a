//! Typed facade over the coordinator for the contacts API.
//!
//! # Design
//! `ContactService` knows the resource URLs and payload rules; everything
//! about retries, dedup and cancellation lives in the coordinator it wraps.
//! Create/update share one `upsert_contact` entry point, with `id == 0`
//! meaning create. Payload pre-validation (non-blank names) happens here,
//! before any network activity — the coordinator only validates transport
//! and protocol correctness.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::coordinator::{CoordinatorConfig, ErrorSink, RequestCoordinator};
use crate::envelope::Envelope;
use crate::http::HttpMethod;
use crate::transport::HttpTransport;
use crate::types::Contact;

/// Client for the contacts REST API.
pub struct ContactService {
    base_url: String,
    coordinator: RequestCoordinator,
    on_error: ErrorSink,
}

impl ContactService {
    pub fn new(base_url: &str, transport: Arc<dyn HttpTransport>, on_error: ErrorSink) -> Self {
        Self::with_config(base_url, transport, on_error, CoordinatorConfig::default())
    }

    pub fn with_config(
        base_url: &str,
        transport: Arc<dyn HttpTransport>,
        on_error: ErrorSink,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            coordinator: RequestCoordinator::with_config(transport, on_error.clone(), config),
            on_error,
        }
    }

    /// Fetch one page of contacts, optionally filtered by a name query.
    pub async fn contacts(
        &self,
        page_count: u32,
        page: u32,
        query: &str,
        desc_order: bool,
        cancel: Option<CancellationToken>,
    ) -> Envelope {
        let url = self.list_url(page_count, page, query, desc_order);
        self.coordinator
            .issue(HttpMethod::Get, &url, None, cancel)
            .await
    }

    /// Fetch a single contact by id.
    pub async fn contact(&self, id: u64, cancel: Option<CancellationToken>) -> Envelope {
        let url = format!("{}/contacts/{id}", self.base_url);
        self.coordinator
            .issue(HttpMethod::Get, &url, None, cancel)
            .await
    }

    /// Create (`id == 0`) or update a contact.
    ///
    /// First and last name are required; a blank name reports through the
    /// sink and resolves with the error envelope without touching the
    /// network.
    pub async fn upsert_contact(
        &self,
        contact: &Contact,
        cancel: Option<CancellationToken>,
    ) -> Envelope {
        if contact.first_name.trim().is_empty() || contact.last_name.trim().is_empty() {
            (self.on_error)("First and last name are required");
            return Envelope::error();
        }

        let body = match serde_json::to_value(contact) {
            Ok(value) => value,
            Err(err) => {
                (self.on_error)(&format!("serialization failed: {err}"));
                return Envelope::error();
            }
        };

        let (method, url) = if contact.id == 0 {
            (HttpMethod::Post, format!("{}/contacts", self.base_url))
        } else {
            (
                HttpMethod::Put,
                format!("{}/contacts/{}", self.base_url, contact.id),
            )
        };
        self.coordinator.issue(method, &url, Some(body), cancel).await
    }

    /// Delete a contact by id.
    pub async fn delete_contact(&self, id: u64, cancel: Option<CancellationToken>) -> Envelope {
        let url = format!("{}/contacts/{id}", self.base_url);
        self.coordinator
            .issue(HttpMethod::Delete, &url, None, cancel)
            .await
    }

    fn list_url(&self, page_count: u32, page: u32, query: &str, desc_order: bool) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        format!(
            "{}/contacts?pageCount={page_count}&page={page}&query={encoded}&descOrder={desc_order}",
            self.base_url
        )
    }
}
