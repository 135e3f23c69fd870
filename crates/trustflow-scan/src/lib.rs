//! Verification and vulnerability aggregation for trustflow
//!
//! This crate talks to the verification backend: it decodes whatever the
//! transport hands back, fans out one query per image or workload, and folds
//! the answers into the state objects the host renders.

mod config;
mod details;
mod error;
mod headers;
mod scanner;
mod session;
mod transport;
mod value;
mod verify;
mod vulns;

#[cfg(test)]
mod testing;

pub use config::{
    ConfigError, DEFAULT_BASE_URL, DEFAULT_SCANNER_NAME, ENV_AUTH_TOKEN, ENV_BASE_URL,
    ENV_SCANNER_NAME, ScanConfig,
};
pub use details::{DetailTicket, DetailTracker};
pub use error::{Diagnosis, FetchError};
pub use headers::{APPLICATION_HEADER, PROJECT_HEADER, RequestHeaders};
pub use scanner::Scanner;
pub use session::{DetailRequest, Inspection, Round, RoundOutcome};
pub use transport::{
    GZIP_MAGIC, HttpGet, RawResponse, ReqwestTransport, decode_response, error_envelope,
    fetch_json, looks_binary,
};
pub use verify::{UNPINNED_MESSAGE, verify_images, verify_url};
pub use vulns::{DetailOutcome, NO_TARGETS_MESSAGE, details_url, fetch_details, summarize, summary_url};

// Re-export types used in our public API
pub use trustflow_types::{
    ImageVerification, InspectionReport, Severity, SeveritySummary, VulnerabilityDetailState,
    VulnerabilityItem, VulnerabilityState, WorkloadTarget,
};
