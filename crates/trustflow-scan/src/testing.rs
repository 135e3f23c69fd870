//! In-memory transport for tests

use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::Value;

use crate::error::FetchError;
use crate::headers::RequestHeaders;
use crate::transport::{HttpGet, RawResponse};

/// Answers GETs from a fixed URL table and records every call.
/// Unknown URLs fail like an unreachable host.
#[derive(Default)]
pub(crate) struct FakeTransport {
    responses: HashMap<String, RawResponse>,
    calls: Mutex<Vec<String>>,
    headers_seen: Mutex<Vec<RequestHeaders>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_json(self, url: &str, status: u16, body: Value) -> Self {
        self.with_raw(url, status, body.to_string().into_bytes())
    }

    pub(crate) fn with_raw(mut self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.responses
            .insert(url.to_string(), RawResponse::new(status, body));
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn headers_seen(&self) -> Vec<RequestHeaders> {
        self.headers_seen.lock().unwrap().clone()
    }
}

impl HttpGet for FakeTransport {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<RawResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.headers_seen.lock().unwrap().push(headers.clone());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Network(format!("connection refused: {}", url)))
    }
}

pub(crate) fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}
