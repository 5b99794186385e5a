//! Shared helpers for the integration tests: a provider wired to a wiremock
//! server and scripted responders.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

use hemmer_provider_taikun::{RetryPolicy, TaikunClient, TaikunProvider};

/// Retries fast enough for tests.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_interval: Duration::from_millis(5),
        max_interval: Duration::from_millis(20),
    }
}

/// A configured provider talking to `server`, with no environment defaults.
pub fn provider(server: &MockServer) -> TaikunProvider {
    let client = TaikunClient::with_token(server.uri(), "test-token").expect("client");
    TaikunProvider::new()
        .with_env(|_: &str| None)
        .with_retry_policy(fast_retry())
        .with_client(client)
}

/// The generic list envelope.
pub fn list_body(data: Vec<Value>, total_count: usize) -> Value {
    json!({"data": data, "totalCount": total_count})
}

/// Answers with `responses` in order, repeating the last one.
pub struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: Arc<AtomicUsize>,
}

impl Sequence {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            responses,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let last = self.responses.len().saturating_sub(1);
        self.responses[n.min(last)].clone()
    }
}

/// Serves fixed pages by call order and records the `offset` of each call.
pub struct PagedResponder {
    pages: Vec<Value>,
    offsets: Arc<Mutex<Vec<Option<i64>>>>,
}

impl PagedResponder {
    pub fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            offsets: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Offsets seen so far, in call order.
    pub fn offsets(&self) -> Arc<Mutex<Vec<Option<i64>>>> {
        self.offsets.clone()
    }
}

impl Respond for PagedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let offset = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "offset")
            .and_then(|(_, value)| value.parse().ok());
        let mut offsets = self.offsets.lock().unwrap();
        let index = offsets.len();
        offsets.push(offset);
        match self.pages.get(index) {
            Some(page) => ResponseTemplate::new(200).set_body_json(page.clone()),
            None => ResponseTemplate::new(500).set_body_string("unexpected page request"),
        }
    }
}
