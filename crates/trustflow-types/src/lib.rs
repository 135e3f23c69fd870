//! Shared types for trustflow
//!
//! This crate contains the data structures exchanged between the extractor,
//! the scan aggregators, and whatever host renders the results.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Host Input Types
// ============================================================================

/// A single resource as handed over by the host
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceDescription {
    pub group: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    /// JSON-encoded live object, as the host stores it
    pub live_state: Option<String>,
}

impl ResourceDescription {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_live_state(mut self, live_state: impl Into<String>) -> Self {
        self.live_state = Some(live_state.into());
        self
    }

    /// Whether this is the aggregate Argo CD application kind
    pub fn is_application(&self) -> bool {
        self.kind == APPLICATION_KIND
    }

    /// Parse the embedded live state. Anything unparsable is treated as absent.
    pub fn live(&self) -> Option<Value> {
        let raw = self.live_state.as_deref()?;
        if raw.is_empty() {
            return None;
        }
        serde_json::from_str(raw).ok()
    }
}

/// Kind name of the aggregate application resource
pub const APPLICATION_KIND: &str = "Application";

/// Argo CD application, reduced to the fields the inspection reads
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationDescription {
    pub metadata: ApplicationMetadata,
    pub spec: ApplicationSpec,
    pub status: ApplicationStatus,
}

impl ApplicationDescription {
    /// Lenient conversion from an arbitrary JSON object.
    ///
    /// Each field is read on its own: a field of the wrong type is left
    /// empty, non-string images are dropped and member resources without a
    /// string kind and name are skipped. The rest of the description is kept.
    pub fn from_value(value: &Value) -> Self {
        let text = |pointer: &str| string_at(value, pointer);

        let resources = value
            .pointer("/status/resources")
            .and_then(Value::as_array)
            .map(|members| members.iter().filter_map(ResourceRef::from_value).collect())
            .unwrap_or_default();
        let images = value
            .pointer("/status/summary/images")
            .and_then(Value::as_array)
            .map(|images| {
                images
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            metadata: ApplicationMetadata {
                name: text("/metadata/name"),
                namespace: text("/metadata/namespace"),
            },
            spec: ApplicationSpec {
                project: text("/spec/project"),
            },
            status: ApplicationStatus {
                resources,
                summary: ApplicationSummary { images },
            },
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref().filter(|n| !n.is_empty())
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref().filter(|n| !n.is_empty())
    }

    pub fn project(&self) -> Option<&str> {
        self.spec.project.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationMetadata {
    pub name: Option<String>,
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSpec {
    pub project: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationStatus {
    pub resources: Vec<ResourceRef>,
    pub summary: ApplicationSummary,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSummary {
    pub images: Vec<String>,
}

/// Member resource listed in an application's status
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceRef {
    pub group: Option<String>,
    pub kind: String,
    pub name: String,
    pub namespace: Option<String>,
}

impl ResourceRef {
    /// A member entry, or `None` when kind or name is not a string
    pub fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            group: string_at(value, "/group"),
            kind: string_at(value, "/kind")?,
            name: string_at(value, "/name")?,
            namespace: string_at(value, "/namespace"),
        })
    }
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ============================================================================
// Images
// ============================================================================

static DIGEST_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@sha256:[a-f0-9]{64}$").unwrap());

/// Whether an image reference is pinned by a sha256 digest.
///
/// The reference must end with `@sha256:` followed by exactly 64 hex
/// characters, in either case.
pub fn has_digest(image: &str) -> bool {
    DIGEST_SUFFIX.is_match(image)
}

/// Display state of a single check
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckState {
    Pass,
    Fail,
    Pending,
}

impl CheckState {
    pub fn from_flags(loading: bool, ok: bool) -> Self {
        match (loading, ok) {
            (true, _) => Self::Pending,
            (false, true) => Self::Pass,
            (false, false) => Self::Fail,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Pending => "PENDING",
        }
    }
}

/// Signature and SBOM status of one image
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageVerification {
    pub loading: bool,
    pub signed: bool,
    pub sbom: bool,
    pub errors: Vec<String>,
}

impl ImageVerification {
    /// Placeholder stored for every image when a round starts
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Default::default()
        }
    }

    /// Result for an image that failed verification with a single message
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
            ..Default::default()
        }
    }

    pub fn signed_state(&self) -> CheckState {
        CheckState::from_flags(self.loading, self.signed)
    }

    pub fn sbom_state(&self) -> CheckState {
        CheckState::from_flags(self.loading, self.sbom)
    }
}

// ============================================================================
// Vulnerability Types
// ============================================================================

/// Kinds eligible for vulnerability scanning
pub const WORKLOAD_KINDS: [&str; 7] = [
    "Deployment",
    "StatefulSet",
    "DaemonSet",
    "ReplicaSet",
    "Job",
    "CronJob",
    "Pod",
];

pub fn is_workload_kind(kind: &str) -> bool {
    WORKLOAD_KINDS.contains(&kind)
}

/// One scannable workload
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkloadTarget {
    pub kind: String,
    pub name: String,
    /// May be empty for cluster-scoped lookups
    pub namespace: String,
}

impl WorkloadTarget {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for WorkloadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}/{}", self.kind, self.name)
        } else {
            write!(f, "{}/{}/{}", self.namespace, self.kind, self.name)
        }
    }
}

/// Vulnerability severity as classified by the backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Unknown,
    ];

    /// Parse a severity name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Value sent as the `severity` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }

    /// Single-letter abbreviation used in compact summaries
    pub fn short(&self) -> char {
        match self {
            Self::Critical => 'C',
            Self::High => 'H',
            Self::Medium => 'M',
            Self::Low => 'L',
            Self::Unknown => 'U',
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Vulnerability counts per severity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub unknown: u64,
}

impl SeveritySummary {
    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
            Severity::Unknown => self.unknown,
        }
    }

    pub fn add(&mut self, severity: Severity, count: u64) {
        let slot = match severity {
            Severity::Critical => &mut self.critical,
            Severity::High => &mut self.high,
            Severity::Medium => &mut self.medium,
            Severity::Low => &mut self.low,
            Severity::Unknown => &mut self.unknown,
        };
        *slot = slot.saturating_add(count);
    }

    pub fn total(&self) -> u64 {
        Severity::ALL.iter().map(|s| self.get(*s)).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.total() == 0
    }

    /// Compact "C:0 H:1 M:2 L:0 U:0" rendering
    pub fn compact(&self) -> String {
        Severity::ALL
            .iter()
            .map(|s| format!("{}:{}", s.short(), self.get(*s)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Aggregated vulnerability verdict for one round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityState {
    pub loading: bool,
    pub pass: bool,
    pub report_count: u64,
    pub summary: SeveritySummary,
    pub error: Option<String>,
}

impl VulnerabilityState {
    pub fn loading() -> Self {
        Self {
            loading: true,
            pass: false,
            report_count: 0,
            summary: SeveritySummary::default(),
            error: None,
        }
    }

    /// Build a settled state. Passing requires at least one report and no findings.
    pub fn settled(report_count: u64, summary: SeveritySummary, errors: &[String]) -> Self {
        let error = if errors.is_empty() {
            None
        } else {
            Some(errors.join(" | "))
        };
        Self {
            loading: false,
            pass: report_count > 0 && summary.is_clean(),
            report_count,
            summary,
            error,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            loading: false,
            error: Some(message.into()),
            ..Self::loading()
        }
    }

    pub fn check_state(&self) -> CheckState {
        CheckState::from_flags(self.loading, self.pass)
    }
}

impl Default for VulnerabilityState {
    fn default() -> Self {
        Self::loading()
    }
}

/// One finding returned by the details endpoint
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub severity: Option<String>,
    pub package: Option<String>,
    pub installed_version: Option<String>,
    pub fixed_version: Option<String>,
    pub description: Option<String>,
    pub primary_link: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub score: Option<f64>,
    /// Workload the finding was reported on; set by the aggregator
    pub target: Option<WorkloadTarget>,
    /// Fields the backend sent that are not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VulnerabilityItem {
    /// Lenient conversion from a backend record.
    ///
    /// Accepts the scanner report vocabulary (`vulnerabilityID`, `resource`,
    /// `installedVersion`, ...) as well as the plain names. Fields with an
    /// unexpected shape stay in `extra` instead of failing the record.
    pub fn from_value(value: Value) -> Self {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                let mut extra = Map::new();
                extra.insert("value".to_string(), other);
                return Self {
                    extra,
                    ..Default::default()
                };
            }
        };

        // The originating workload is always assigned locally
        fields.remove("target");

        let links = match fields.get("links") {
            Some(Value::Array(list)) if list.iter().all(Value::is_string) => fields
                .remove("links")
                .and_then(|v| serde_json::from_value(v).ok())
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        let score = match fields.get("score").and_then(Value::as_f64) {
            Some(score) => {
                fields.remove("score");
                Some(score)
            }
            None => None,
        };

        Self {
            id: take_string(&mut fields, &["vulnerabilityID", "vulnerabilityId", "id"]),
            title: take_string(&mut fields, &["title"]),
            severity: take_string(&mut fields, &["severity"]),
            package: take_string(&mut fields, &["resource", "pkgName", "package"]),
            installed_version: take_string(&mut fields, &["installedVersion"]),
            fixed_version: take_string(&mut fields, &["fixedVersion"]),
            description: take_string(&mut fields, &["description"]),
            primary_link: take_string(&mut fields, &["primaryLink"]),
            links,
            score,
            target: None,
            extra: fields,
        }
    }

    /// Best available headline for display
    pub fn headline(&self) -> &str {
        self.id
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("(unnamed finding)")
    }

    /// Preferred link: the primary link, otherwise the first of the list
    pub fn link(&self) -> Option<&str> {
        self.primary_link
            .as_deref()
            .or_else(|| self.links.first().map(String::as_str))
    }
}

fn take_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(Value::String(_)) = fields.get(*key) {
            if let Some(Value::String(s)) = fields.remove(*key) {
                return Some(s);
            }
        }
    }
    None
}

/// Itemised findings for the one severity currently opened
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityDetailState {
    pub open: bool,
    pub loading: bool,
    pub severity: Option<Severity>,
    pub items: Vec<VulnerabilityItem>,
    pub error: Option<String>,
}

impl VulnerabilityDetailState {
    pub fn closed() -> Self {
        Self::default()
    }

    pub fn opening(severity: Severity) -> Self {
        Self {
            open: true,
            loading: true,
            severity: Some(severity),
            ..Default::default()
        }
    }

    pub fn is_open_for(&self, severity: Severity) -> bool {
        self.open && self.severity == Some(severity)
    }
}

// ============================================================================
// Result Object
// ============================================================================

/// Per-image row of the result object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageReport {
    pub image: String,
    pub digest_pinned: bool,
    pub provenance_url: String,
    pub signed: CheckState,
    pub sbom: CheckState,
    pub verification: ImageVerification,
}

/// Plain result object handed back to the host
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionReport {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub scanner_name: String,
    pub images: Vec<ImageReport>,
    pub targets: Vec<WorkloadTarget>,
    pub vulnerabilities: VulnerabilityState,
    pub vulnerability_state: CheckState,
    pub details: VulnerabilityDetailState,
    pub generated_at: DateTime<Utc>,
}
