//! HTTP transport and defensive response decoding
//!
//! The backend sits behind the Argo CD API server and sometimes another
//! reverse proxy. Bodies are always read as raw bytes: a proxy may strip the
//! gzip `Content-Encoding` header while still sending compressed data, and
//! error pages are frequently plain text or HTML.

use std::future::Future;
use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::{Diagnosis, FetchError};
use crate::headers::RequestHeaders;
use crate::value;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const SNIPPET_LIMIT: usize = 400;
const BINARY_SAMPLE: usize = 200;
const BINARY_THRESHOLD: f64 = 0.05;

/// Status and undecoded body of a response
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues GET requests. Implemented over reqwest, and in memory for tests.
pub trait HttpGet: Send + Sync {
    fn get(
        &self,
        url: &str,
        headers: &RequestHeaders,
    ) -> impl Future<Output = Result<RawResponse, FetchError>> + Send;
}

/// reqwest-backed transport
pub struct ReqwestTransport {
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl ReqwestTransport {
    pub fn new(config: &ScanConfig) -> Result<Self, FetchError> {
        // No automatic decompression: the body is inspected byte for byte
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            auth_token: config.auth_token.clone(),
        })
    }
}

impl HttpGet for ReqwestTransport {
    async fn get(&self, url: &str, headers: &RequestHeaders) -> Result<RawResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        if let Some(token) = &self.auth_token {
            request = request.header(reqwest::header::COOKIE, format!("argocd.token={}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// GET a URL and decode the body as JSON
pub async fn fetch_json<T>(transport: &T, url: &str, headers: &RequestHeaders) -> Result<Value, FetchError>
where
    T: HttpGet + ?Sized,
{
    let response = transport.get(url, headers).await.inspect_err(|e| {
        warn!(url, error = %e, "request failed");
    })?;
    debug!(url, status = response.status, bytes = response.body.len(), "response received");

    decode_response(response.status, &response.body).inspect_err(|e| {
        warn!(url, status = response.status, error = %e, "unusable response");
    })
}

/// Turn a status and raw body into JSON or a classified error
pub fn decode_response(status: u16, body: &[u8]) -> Result<Value, FetchError> {
    let gzipped = body.starts_with(&GZIP_MAGIC);

    let text = if gzipped {
        gunzip(body).unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
    } else {
        String::from_utf8_lossy(body).into_owned()
    };

    let data = serde_json::from_str::<Value>(&text)
        .ok()
        .filter(|v| !v.is_null());

    if !(200..300).contains(&status) {
        if let Some(message) = data.as_ref().and_then(error_envelope) {
            return Err(FetchError::Backend { status, message });
        }
        return Err(FetchError::Status {
            status,
            diagnosis: diagnose(gzipped, &text),
        });
    }

    data.ok_or_else(|| FetchError::NotJson {
        status,
        diagnosis: diagnose(gzipped, &text),
    })
}

/// Extract the error message a backend payload carries, if any.
///
/// Both an `error` string and a non-empty `errors` list are recognised; the
/// list is joined with " | ". An empty `error` string counts as absent, so
/// the `errors` list or the body diagnosis is reported instead.
pub fn error_envelope(data: &Value) -> Option<String> {
    if let Some(message) = data.get("error").and_then(Value::as_str) {
        if !message.is_empty() {
            return Some(message.to_string());
        }
    }

    let messages: Vec<String> = value::messages(data.get("errors"))
        .into_iter()
        .filter(|m| !m.is_empty())
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join(" | "))
    }
}

/// Whether decoded text is most likely binary garbage.
///
/// Looks at the first characters only; more than 5% replacement characters
/// or control characters (other than tab, newline, carriage return) counts.
pub fn looks_binary(text: &str) -> bool {
    let mut sampled = 0usize;
    let mut suspicious = 0usize;
    for c in text.chars().take(BINARY_SAMPLE) {
        sampled += 1;
        if c == char::REPLACEMENT_CHARACTER || (c.is_control() && !matches!(c, '\t' | '\n' | '\r')) {
            suspicious += 1;
        }
    }
    sampled > 0 && (suspicious as f64 / sampled as f64) > BINARY_THRESHOLD
}

fn gunzip(body: &[u8]) -> Option<String> {
    let mut decoded = Vec::new();
    match GzDecoder::new(body).read_to_end(&mut decoded) {
        Ok(_) => Some(String::from_utf8_lossy(&decoded).into_owned()),
        Err(e) => {
            debug!(error = %e, "gzip magic present but decompression failed");
            None
        }
    }
}

fn diagnose(gzipped: bool, text: &str) -> Diagnosis {
    if gzipped {
        return Diagnosis::Gzip;
    }
    if looks_binary(text) {
        return Diagnosis::Binary;
    }
    let snippet = snippet(text);
    if snippet.is_empty() {
        Diagnosis::Empty
    } else {
        Diagnosis::Snippet(snippet)
    }
}

fn snippet(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(SNIPPET_LIMIT)
        .collect()
}
