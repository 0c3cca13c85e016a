//! Behavioral tests for the request coordinator, driven by scripted
//! transports under a paused tokio clock so retry and timeout schedules are
//! observed exactly.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use contacts_core::{
    Envelope, ErrorSink, HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestCoordinator,
    TransportError,
};

const URL: &str = "http://api.test/contacts?pageCount=10&page=1&query=&descOrder=false";

enum Step {
    Respond(HttpResponse),
    Fail(&'static str),
    Hang,
    Slow(Duration, HttpResponse),
}

struct Attempt {
    url: String,
    at: Instant,
}

/// Replays a scripted sequence of outcomes, one per attempt, and records
/// when each attempt arrived.
struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    attempts: Mutex<Vec<Attempt>>,
}

impl ScriptedTransport {
    fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            attempts: Mutex::new(Vec::new()),
        })
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().iter().map(|a| a.at).collect()
    }

    fn attempt_urls(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.url.clone())
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.attempts.lock().unwrap().push(Attempt {
            url: request.url.clone(),
            at: Instant::now(),
        });
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport script exhausted");
        match step {
            Step::Respond(response) => Ok(response),
            Step::Fail(message) => Err(TransportError(message.to_string())),
            Step::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Step::Slow(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
        }
    }
}

fn response(status: u16, status_text: &str, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        status_text: status_text.to_string(),
        headers: Vec::new(),
        body: body.to_string(),
    }
}

fn ok(body: &str) -> HttpResponse {
    response(200, "OK", body)
}

fn recording_sink() -> (ErrorSink, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&log);
    let sink: ErrorSink = Arc::new(move |msg: &str| sink_log.lock().unwrap().push(msg.to_string()));
    (sink, log)
}

fn coordinator(transport: Arc<ScriptedTransport>) -> (RequestCoordinator, Arc<Mutex<Vec<String>>>) {
    let (sink, errors) = recording_sink();
    (RequestCoordinator::new(transport, sink), errors)
}

// --- single-flight dedup ---

#[tokio::test(start_paused = true)]
async fn identical_concurrent_calls_share_one_flight() {
    let transport = ScriptedTransport::new(vec![Step::Slow(
        Duration::from_millis(50),
        ok(r#"{"status":"success","data":[{"id":1}]}"#),
    )]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let (first, second) = tokio::join!(coordinator.get(URL), coordinator.get(URL));

    assert_eq!(first, second);
    assert!(first.is_success());
    assert_eq!(first.data, json!([{"id": 1}]));
    assert_eq!(transport.attempt_urls(), [URL], "dedup must not re-issue");
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn body_key_order_does_not_break_dedup() {
    let transport = ScriptedTransport::new(vec![Step::Slow(
        Duration::from_millis(50),
        ok(r#"{"status":"success","data":null}"#),
    )]);
    let (coordinator, _) = coordinator(Arc::clone(&transport));

    let a: serde_json::Value =
        serde_json::from_str(r#"{"firstName":"Ada","lastName":"Lovelace"}"#).unwrap();
    let b: serde_json::Value =
        serde_json::from_str(r#"{"lastName":"Lovelace","firstName":"Ada"}"#).unwrap();

    let url = "http://api.test/contacts";
    let (first, second) = tokio::join!(
        coordinator.issue(HttpMethod::Post, url, Some(a), None),
        coordinator.issue(HttpMethod::Post, url, Some(b), None),
    );

    assert_eq!(first, second);
    assert_eq!(transport.attempt_count(), 1);
}

#[tokio::test]
async fn slot_clears_after_settlement_so_identical_calls_reissue() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(ok(r#"{"status":"success","data":null}"#)),
        Step::Respond(ok(r#"{"status":"success","data":null}"#)),
    ]);
    let (coordinator, _) = coordinator(Arc::clone(&transport));

    coordinator.get(URL).await;
    coordinator.get(URL).await;

    assert_eq!(transport.attempt_count(), 2);
}

// --- supersession ---

#[tokio::test(start_paused = true)]
async fn distinct_call_supersedes_outstanding_request() {
    let transport = ScriptedTransport::new(vec![
        Step::Hang,
        Step::Respond(ok(r#"{"status":"success","data":{"id":3}}"#)),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    // PUT /contacts/3 hangs in flight...
    let put = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .put("http://api.test/contacts/3", json!({"firstName": "Ada"}))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    // ...then a GET for the same resource preempts it.
    let get = coordinator.get("http://api.test/contacts/3").await;

    assert!(get.is_success());
    assert_eq!(get.data, json!({"id": 3}));

    // The preempted PUT settles silently with the error envelope.
    let put = put.await.unwrap();
    assert_eq!(put, Envelope::error());
    assert!(
        errors.lock().unwrap().is_empty(),
        "supersession must never reach the error sink"
    );
    assert_eq!(transport.attempt_count(), 2);
}

// --- retry with backoff ---

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_exponential_backoff() {
    let transport = ScriptedTransport::new(vec![
        Step::Fail("connection reset"),
        Step::Fail("connection reset"),
        Step::Respond(ok(r#"{"status":"success","data":null}"#)),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert!(result.is_success());
    assert!(errors.lock().unwrap().is_empty(), "recovered, no error");

    let times = transport.attempt_times();
    assert_eq!(times.len(), 3);
    assert_eq!(times[1] - times[0], Duration::from_secs(1));
    assert_eq!(times[2] - times[1], Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_reports_exactly_once() {
    let transport = ScriptedTransport::new(vec![
        Step::Fail("connection refused"),
        Step::Fail("connection refused"),
        Step::Fail("connection refused"),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 3);
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        [format!("connection refused (GET {URL})")]
    );
}

#[tokio::test(start_paused = true)]
async fn non_2xx_status_is_retried_and_reported() {
    let transport = ScriptedTransport::new(vec![
        Step::Respond(response(500, "Internal Server Error", "")),
        Step::Respond(response(500, "Internal Server Error", "")),
        Step::Respond(response(500, "Internal Server Error", "")),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 3);
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        [format!("500: Internal Server Error (GET {URL})")]
    );
}

// --- per-attempt timeout ---

#[tokio::test(start_paused = true)]
async fn timeout_consumes_one_retry_slot() {
    let transport = ScriptedTransport::new(vec![
        Step::Slow(Duration::from_secs(20), ok("")),
        Step::Respond(ok(r#"{"status":"success","data":null}"#)),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert!(result.is_success());
    assert!(errors.lock().unwrap().is_empty());

    // First attempt timed out at 15s, backoff 1s, second attempt at 16s.
    let times = transport.attempt_times();
    assert_eq!(times.len(), 2);
    assert_eq!(times[1] - times[0], Duration::from_secs(16));
}

#[tokio::test(start_paused = true)]
async fn timeout_exhaustion_surfaces_timeout_error() {
    let transport = ScriptedTransport::new(vec![
        Step::Slow(Duration::from_secs(20), ok("")),
        Step::Slow(Duration::from_secs(20), ok("")),
        Step::Slow(Duration::from_secs(20), ok("")),
    ]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 3);
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        [format!("request timed out (GET {URL})")]
    );
}

// --- cancellation ---

#[tokio::test(start_paused = true)]
async fn external_cancellation_is_silent_and_never_retries() {
    let transport = ScriptedTransport::new(vec![Step::Hang]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let token = CancellationToken::new();
    let request = {
        let coordinator = coordinator.clone();
        let token = token.clone();
        tokio::spawn(async move {
            coordinator
                .issue(HttpMethod::Get, URL, None, Some(token))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    token.cancel();
    let result = request.await.unwrap();

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 1);
    assert!(errors.lock().unwrap().is_empty());
}

// --- normalization ---

#[tokio::test]
async fn no_content_normalizes_to_null_data() {
    let transport = ScriptedTransport::new(vec![Step::Respond(response(204, "No Content", ""))]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.delete("http://api.test/contacts/5").await;

    assert_eq!(result, Envelope::success(json!(null), None));
    assert!(errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn application_error_envelope_is_not_retried() {
    let transport = ScriptedTransport::new(vec![Step::Respond(ok(
        r#"{"status":"error","message":"Contact not found"}"#,
    ))]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let url = "http://api.test/contacts/42";
    let result = coordinator.get(url).await;

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 1, "envelope errors never retry");
    assert_eq!(
        errors.lock().unwrap().as_slice(),
        [format!("Contact not found (GET {url})")]
    );
}

#[tokio::test]
async fn malformed_body_reports_decode_error() {
    let transport = ScriptedTransport::new(vec![Step::Respond(ok("not json"))]);
    let (coordinator, errors) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert_eq!(result, Envelope::error());
    assert_eq!(transport.attempt_count(), 1);
    let errors = errors.lock().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("invalid response body"));
}

#[tokio::test]
async fn success_envelope_preserves_data_and_meta_verbatim() {
    let transport = ScriptedTransport::new(vec![Step::Respond(ok(
        r#"{"status":"success","data":[{"id":1,"firstName":"Ada"}],"meta":{"total":1,"totalPages":1}}"#,
    ))]);
    let (coordinator, _) = coordinator(Arc::clone(&transport));

    let result = coordinator.get(URL).await;

    assert_eq!(
        result,
        Envelope::success(
            json!([{"id": 1, "firstName": "Ada"}]),
            Some(json!({"total": 1, "totalPages": 1})),
        )
    );
}
