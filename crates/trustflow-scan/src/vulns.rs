use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info};
use trustflow_types::{
    Severity, SeveritySummary, VulnerabilityItem, VulnerabilityState, WorkloadTarget,
};

use crate::error::FetchError;
use crate::headers::RequestHeaders;
use crate::transport::{HttpGet, error_envelope, fetch_json};
use crate::value;

pub const NO_TARGETS_MESSAGE: &str = "No workload targets found.";

/// Summary endpoint for one workload
pub fn summary_url(base_url: &str, target: &WorkloadTarget) -> String {
    format!(
        "{}/vulns?namespace={}&kind={}&name={}",
        base_url,
        urlencoding::encode(&target.namespace),
        urlencoding::encode(&target.kind),
        urlencoding::encode(&target.name),
    )
}

/// Itemised findings endpoint for one workload and severity
pub fn details_url(base_url: &str, target: &WorkloadTarget, severity: Severity) -> String {
    format!(
        "{}/vulns/details?namespace={}&kind={}&name={}&severity={}",
        base_url,
        urlencoding::encode(&target.namespace),
        urlencoding::encode(&target.kind),
        urlencoding::encode(&target.name),
        severity.as_query(),
    )
}

/// Counts reported for one workload
#[derive(Debug, Default, PartialEq, Eq)]
struct TargetSummary {
    report_count: u64,
    summary: SeveritySummary,
}

impl TargetSummary {
    fn from_value(data: &Value) -> Self {
        let counts = data.get("summary");
        let mut summary = SeveritySummary::default();
        for severity in Severity::ALL {
            let field = counts.and_then(|c| c.get(severity.label().to_lowercase()));
            summary.add(severity, value::count(field));
        }
        Self {
            report_count: value::count(data.get("reportCount")),
            summary,
        }
    }
}

/// Fetch and fold the vulnerability summaries of every target.
///
/// A failing target contributes only its error message; counters reflect the
/// targets that answered. Without targets no request is made at all.
pub async fn summarize<T>(
    transport: &T,
    base_url: &str,
    headers: &RequestHeaders,
    targets: &[WorkloadTarget],
) -> VulnerabilityState
where
    T: HttpGet + ?Sized,
{
    if targets.is_empty() {
        return VulnerabilityState::failed(NO_TARGETS_MESSAGE);
    }

    let results = join_all(targets.iter().map(|target| async move {
        let data = fetch_json(transport, &summary_url(base_url, target), headers).await?;
        reject_envelope(&data)?;
        Ok::<_, FetchError>(TargetSummary::from_value(&data))
    }))
    .await;

    let mut summary = SeveritySummary::default();
    let mut report_count = 0u64;
    let mut errors = Vec::new();

    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(found) => {
                debug!(%target, reports = found.report_count, "summary received");
                for severity in Severity::ALL {
                    summary.add(severity, found.summary.get(severity));
                }
                report_count = report_count.saturating_add(found.report_count);
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    let state = VulnerabilityState::settled(report_count, summary, &errors);
    info!(
        targets = targets.len(),
        failed = errors.len(),
        reports = report_count,
        pass = state.pass,
        "vulnerability round settled"
    );
    state
}

/// Findings of one severity across all targets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetailOutcome {
    pub items: Vec<VulnerabilityItem>,
    pub errors: Vec<String>,
}

/// Fetch the itemised findings of one severity for every target
pub async fn fetch_details<T>(
    transport: &T,
    base_url: &str,
    headers: &RequestHeaders,
    targets: &[WorkloadTarget],
    severity: Severity,
) -> DetailOutcome
where
    T: HttpGet + ?Sized,
{
    let results = join_all(targets.iter().map(|target| async move {
        let data = fetch_json(transport, &details_url(base_url, target, severity), headers).await?;
        reject_envelope(&data)?;
        Ok::<_, FetchError>(items_from(&data, target))
    }))
    .await;

    let mut outcome = DetailOutcome::default();
    for result in results {
        match result {
            Ok(items) => outcome.items.extend(items),
            Err(e) => outcome.errors.push(e.to_string()),
        }
    }

    info!(
        %severity,
        items = outcome.items.len(),
        failed = outcome.errors.len(),
        "detail request settled"
    );
    outcome
}

fn items_from(data: &Value, target: &WorkloadTarget) -> Vec<VulnerabilityItem> {
    let Some(list) = data.get("items").and_then(Value::as_array) else {
        return Vec::new();
    };
    list.iter()
        .cloned()
        .map(|raw| {
            let mut item = VulnerabilityItem::from_value(raw);
            item.target = Some(target.clone());
            item
        })
        .collect()
}

/// A successful response that still carries an error envelope counts as a failure
fn reject_envelope(data: &Value) -> Result<(), FetchError> {
    match error_envelope(data) {
        Some(message) => Err(FetchError::Backend {
            status: 200,
            message,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, gzip};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const BASE: &str = "http://backend/extensions/trustflow";

    fn targets() -> Vec<WorkloadTarget> {
        vec![
            WorkloadTarget::new("Deployment", "web", "shop"),
            WorkloadTarget::new("StatefulSet", "db", "shop"),
            WorkloadTarget::new("CronJob", "report", ""),
        ]
    }

    fn summary(critical: u64, high: u64, medium: u64, low: u64, unknown: u64, reports: u64) -> Value {
        json!({
            "summary": {
                "critical": critical,
                "high": high,
                "medium": medium,
                "low": low,
                "unknown": unknown
            },
            "reportCount": reports
        })
    }

    #[test]
    fn test_urls() {
        let target = WorkloadTarget::new("CronJob", "nightly report", "");
        assert_eq!(
            summary_url(BASE, &target),
            "http://backend/extensions/trustflow/vulns?namespace=&kind=CronJob&name=nightly%20report"
        );
        assert_eq!(
            details_url(BASE, &target, Severity::Critical),
            "http://backend/extensions/trustflow/vulns/details?namespace=&kind=CronJob&name=nightly%20report&severity=CRITICAL"
        );
    }

    #[test]
    fn test_target_summary_coerces_fields() {
        let parsed = TargetSummary::from_value(&json!({
            "summary": {"critical": "2", "high": null, "medium": -1, "low": 1.7},
            "reportCount": "3"
        }));
        assert_eq!(parsed.report_count, 3);
        assert_eq!(parsed.summary.critical, 2);
        assert_eq!(parsed.summary.high, 0);
        assert_eq!(parsed.summary.medium, 0);
        assert_eq!(parsed.summary.low, 1);
        assert_eq!(parsed.summary.unknown, 0);

        assert_eq!(TargetSummary::from_value(&json!({})), TargetSummary::default());
    }

    #[tokio::test]
    async fn test_no_targets() {
        let transport = FakeTransport::new();
        let state = summarize(&transport, BASE, &RequestHeaders::default(), &[]).await;
        assert_eq!(
            state,
            VulnerabilityState {
                loading: false,
                pass: false,
                report_count: 0,
                summary: SeveritySummary::default(),
                error: Some(NO_TARGETS_MESSAGE.to_string()),
            }
        );
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clean_reports_pass() {
        let targets = targets();
        let mut transport = FakeTransport::new();
        for target in &targets {
            transport = transport.with_json(&summary_url(BASE, target), 200, summary(0, 0, 0, 0, 0, 1));
        }
        let state = summarize(&transport, BASE, &RequestHeaders::default(), &targets).await;
        assert!(state.pass);
        assert_eq!(state.report_count, 3);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_zero_reports_never_pass() {
        let targets = targets();
        let mut transport = FakeTransport::new();
        for target in &targets {
            transport = transport.with_json(&summary_url(BASE, target), 200, summary(0, 0, 0, 0, 0, 0));
        }
        let state = summarize(&transport, BASE, &RequestHeaders::default(), &targets).await;
        assert!(!state.pass);
        assert_eq!(state.report_count, 0);
    }

    #[tokio::test]
    async fn test_one_failing_target() {
        let targets = targets();
        let transport = FakeTransport::new()
            .with_json(&summary_url(BASE, &targets[0]), 200, summary(1, 2, 0, 4, 0, 2))
            .with_raw(
                &summary_url(BASE, &targets[1]),
                200,
                gzip(summary(0, 1, 3, 0, 1, 1).to_string().as_bytes()),
            )
            .with_raw(&summary_url(BASE, &targets[2]), 502, b"Bad Gateway".to_vec());

        let state = summarize(&transport, BASE, &RequestHeaders::default(), &targets).await;

        assert_eq!(state.report_count, 3);
        assert_eq!(
            state.summary,
            SeveritySummary {
                critical: 1,
                high: 3,
                medium: 3,
                low: 4,
                unknown: 1,
            }
        );
        assert!(!state.pass);
        assert_eq!(state.error.as_deref(), Some("Bad Gateway"));
    }

    #[tokio::test]
    async fn test_all_targets_failing() {
        let targets = targets();
        let transport = FakeTransport::new().with_json(
            &summary_url(BASE, &targets[0]),
            200,
            json!({"error": "no report for Deployment/web"}),
        );
        let state = summarize(&transport, BASE, &RequestHeaders::default(), &targets).await;

        assert!(!state.pass);
        assert_eq!(state.report_count, 0);
        let error = state.error.unwrap();
        assert_eq!(error.split(" | ").count(), 3);
        assert!(error.starts_with("no report for Deployment/web"));
    }

    #[tokio::test]
    async fn test_details_tagged_with_target() {
        let targets = targets();
        let transport = FakeTransport::new()
            .with_json(
                &details_url(BASE, &targets[0], Severity::High),
                200,
                json!({"items": [
                    {"vulnerabilityID": "CVE-2024-1", "severity": "HIGH", "resource": "openssl"},
                    {"vulnerabilityID": "CVE-2024-2", "severity": "HIGH", "resource": "zlib"}
                ]}),
            )
            .with_json(
                &details_url(BASE, &targets[1], Severity::High),
                200,
                json!({"items": [{"id": "GHSA-xxxx", "title": "prototype pollution"}]}),
            )
            .with_json(&details_url(BASE, &targets[2], Severity::High), 404, json!({"error": "not scanned"}));

        let outcome =
            fetch_details(&transport, BASE, &RequestHeaders::default(), &targets, Severity::High)
                .await;

        assert_eq!(outcome.items.len(), 3);
        assert_eq!(outcome.items[0].target.as_ref(), Some(&targets[0]));
        assert_eq!(outcome.items[2].headline(), "GHSA-xxxx");
        assert_eq!(outcome.items[2].target.as_ref(), Some(&targets[1]));
        assert_eq!(outcome.errors, vec!["not scanned".to_string()]);
    }
}
