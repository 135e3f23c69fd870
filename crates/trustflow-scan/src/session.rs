//! State for one inspected resource
//!
//! An [`Inspection`] owns the image results, the vulnerability verdict and
//! the detail panel. Each is replaced as a whole when a round settles. A new
//! round cancels the previous round's token. Cancellation is advisory: the
//! old round's requests still run to completion and their results are
//! dropped instead of applied.

use std::collections::HashMap;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use trustflow_k8s::{extract_images, workload_targets};
use trustflow_types::{
    ApplicationDescription, ImageReport, ImageVerification, InspectionReport, ResourceDescription,
    Severity, VulnerabilityDetailState, VulnerabilityState, WorkloadTarget, has_digest,
};

use crate::config::ScanConfig;
use crate::details::{DetailTicket, DetailTracker};
use crate::headers::RequestHeaders;
use crate::verify::verify_url;
use crate::vulns::DetailOutcome;

/// Inputs of one round, plus the token that marks it stale
#[derive(Clone, Debug)]
pub struct Round {
    pub images: Vec<String>,
    pub targets: Vec<WorkloadTarget>,
    pub headers: RequestHeaders,
    id: u64,
    token: CancellationToken,
}

impl Round {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// True once a newer round has started
    pub fn is_stale(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Settled results of a round
#[derive(Clone, Debug, Default)]
pub struct RoundOutcome {
    pub verification: HashMap<String, ImageVerification>,
    pub vulnerabilities: VulnerabilityState,
}

/// Everything needed to fetch one severity's findings
#[derive(Clone, Debug)]
pub struct DetailRequest {
    pub ticket: DetailTicket,
    pub targets: Vec<WorkloadTarget>,
    pub headers: RequestHeaders,
}

#[derive(Debug, Default)]
pub struct Inspection {
    resource: ResourceDescription,
    application: Option<ApplicationDescription>,
    images: Vec<String>,
    targets: Vec<WorkloadTarget>,
    headers: RequestHeaders,
    image_results: HashMap<String, ImageVerification>,
    vulnerabilities: VulnerabilityState,
    details: DetailTracker,
    round: CancellationToken,
    rounds_started: u64,
}

impl Inspection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to a new resource (or application) and start its first round
    pub fn load(
        &mut self,
        resource: ResourceDescription,
        application: Option<ApplicationDescription>,
    ) -> Round {
        self.images = extract_images(&resource, application.as_ref());
        self.targets = workload_targets(&resource, application.as_ref());
        self.headers = RequestHeaders::for_application(application.as_ref());
        self.resource = resource;
        self.application = application;
        self.details.reset();

        info!(
            kind = %self.resource.kind,
            name = %self.resource.name,
            images = self.images.len(),
            targets = self.targets.len(),
            "inspecting resource"
        );
        self.start_round()
    }

    /// Start a new round for the current resource
    pub fn refresh(&mut self) -> Round {
        self.start_round()
    }

    fn start_round(&mut self) -> Round {
        self.round.cancel();
        self.round = CancellationToken::new();
        self.rounds_started += 1;

        self.image_results = self
            .images
            .iter()
            .map(|image| (image.clone(), ImageVerification::pending()))
            .collect();
        self.vulnerabilities = VulnerabilityState::loading();

        debug!(round = self.rounds_started, "round started");
        Round {
            images: self.images.clone(),
            targets: self.targets.clone(),
            headers: self.headers.clone(),
            id: self.rounds_started,
            token: self.round.clone(),
        }
    }

    /// Replace the image results. Returns false for a stale round.
    pub fn apply_verification(
        &mut self,
        round: &Round,
        results: HashMap<String, ImageVerification>,
    ) -> bool {
        if round.is_stale() {
            debug!(round = round.id, "discarding stale verification results");
            return false;
        }
        self.image_results = results;
        true
    }

    /// Replace the vulnerability verdict. Returns false for a stale round.
    pub fn apply_vulnerabilities(&mut self, round: &Round, state: VulnerabilityState) -> bool {
        if round.is_stale() {
            debug!(round = round.id, "discarding stale vulnerability summary");
            return false;
        }
        self.vulnerabilities = state;
        true
    }

    pub fn apply(&mut self, round: &Round, outcome: RoundOutcome) -> bool {
        self.apply_verification(round, outcome.verification)
            && self.apply_vulnerabilities(round, outcome.vulnerabilities)
    }

    /// Open (or toggle closed) the findings of one severity
    pub fn request_details(&mut self, severity: Severity) -> Option<DetailRequest> {
        let ticket = self.details.request(severity)?;
        Some(DetailRequest {
            ticket,
            targets: self.targets.clone(),
            headers: self.headers.clone(),
        })
    }

    pub fn complete_details(&mut self, ticket: DetailTicket, outcome: DetailOutcome) -> bool {
        self.details.complete(ticket, outcome)
    }

    pub fn image_results(&self) -> &HashMap<String, ImageVerification> {
        &self.image_results
    }

    pub fn vulnerabilities(&self) -> &VulnerabilityState {
        &self.vulnerabilities
    }

    pub fn details(&self) -> &VulnerabilityDetailState {
        self.details.state()
    }

    /// Snapshot of the current state as the plain result object
    pub fn report(&self, config: &ScanConfig) -> InspectionReport {
        let images = self
            .images
            .iter()
            .map(|image| {
                let verification = self
                    .image_results
                    .get(image)
                    .cloned()
                    .unwrap_or_else(ImageVerification::pending);
                ImageReport {
                    image: image.clone(),
                    digest_pinned: has_digest(image),
                    provenance_url: verify_url(config.base_url(), image),
                    signed: verification.signed_state(),
                    sbom: verification.sbom_state(),
                    verification,
                }
            })
            .collect();

        InspectionReport {
            kind: self.resource.kind.clone(),
            name: self.resource.name.clone(),
            namespace: self.resource.namespace.clone(),
            scanner_name: config.scanner_name.clone(),
            images,
            targets: self.targets.clone(),
            vulnerabilities: self.vulnerabilities.clone(),
            vulnerability_state: self.vulnerabilities.check_state(),
            details: self.details.state().clone(),
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;
    use crate::testing::FakeTransport;
    use crate::vulns::{details_url, summary_url};
    use crate::{APPLICATION_HEADER, UNPINNED_MESSAGE};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use trustflow_types::{ApplicationMetadata, CheckState};

    const BASE: &str = "http://backend/extensions/trustflow";

    fn config() -> ScanConfig {
        ScanConfig {
            base_url: format!("{}/", BASE),
            ..Default::default()
        }
    }

    fn pinned() -> String {
        format!("registry/api@sha256:{}", "f".repeat(64))
    }

    fn deployment(name: &str, images: &[&str]) -> ResourceDescription {
        let containers: Vec<_> = images
            .iter()
            .map(|image| json!({"name": "c", "image": image}))
            .collect();
        let live = json!({
            "kind": "Deployment",
            "metadata": {"name": name, "namespace": "shop"},
            "spec": {"template": {"spec": {"containers": containers}}}
        });
        ResourceDescription::new("Deployment", name, "shop").with_live_state(live.to_string())
    }

    fn application() -> ApplicationDescription {
        ApplicationDescription {
            metadata: ApplicationMetadata {
                name: Some("shop".to_string()),
                namespace: Some("argocd".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_load_marks_everything_pending() {
        let mut inspection = Inspection::new();
        let round = inspection.load(deployment("api", &["a:1", "b:2", "a:1"]), None);

        assert_eq!(round.images, vec!["a:1".to_string(), "b:2".to_string()]);
        assert_eq!(round.targets, vec![WorkloadTarget::new("Deployment", "api", "shop")]);
        assert!(inspection.image_results().values().all(|r| r.loading));
        assert!(inspection.vulnerabilities().loading);
        assert!(!round.is_stale());
    }

    #[test]
    fn test_new_resource_supersedes_round() {
        let mut inspection = Inspection::new();
        let first = inspection.load(deployment("api", &["a:1"]), None);
        let second = inspection.load(deployment("worker", &["w:1"]), None);

        assert!(first.is_stale());
        let stale = RoundOutcome {
            verification: [("a:1".to_string(), ImageVerification::failed("late"))]
                .into_iter()
                .collect(),
            vulnerabilities: VulnerabilityState::settled(9, Default::default(), &[]),
        };
        assert!(!inspection.apply(&first, stale));
        assert!(inspection.image_results()["w:1"].loading);
        assert!(inspection.vulnerabilities().loading);

        let fresh = RoundOutcome {
            verification: [("w:1".to_string(), ImageVerification::failed(UNPINNED_MESSAGE))]
                .into_iter()
                .collect(),
            vulnerabilities: VulnerabilityState::settled(1, Default::default(), &[]),
        };
        assert!(inspection.apply(&second, fresh));
        assert!(inspection.vulnerabilities().pass);
    }

    #[test]
    fn test_new_resource_closes_details() {
        let mut inspection = Inspection::new();
        inspection.load(deployment("api", &["a:1"]), None);
        let request = inspection.request_details(Severity::High).unwrap();
        inspection.load(deployment("worker", &["w:1"]), None);

        assert!(!inspection.complete_details(request.ticket, DetailOutcome::default()));
        assert!(!inspection.details().open);
    }

    #[tokio::test]
    async fn test_full_round_and_report() {
        let image = pinned();
        let resource = deployment("api", &[&image, "nginx:latest"]);
        let target = WorkloadTarget::new("Deployment", "api", "shop");

        let transport = FakeTransport::new()
            .with_json(
                &verify_url(BASE, &image),
                200,
                json!({"signed": true, "sbom": true, "errors": []}),
            )
            .with_json(
                &summary_url(BASE, &target),
                200,
                json!({"summary": {"critical": 0, "high": 1}, "reportCount": 1}),
            )
            .with_json(
                &details_url(BASE, &target, Severity::High),
                200,
                json!({"items": [{"vulnerabilityID": "CVE-2024-9", "severity": "HIGH"}]}),
            );
        let scanner = Scanner::new(transport, config());

        let mut inspection = Inspection::new();
        let round = inspection.load(resource, Some(application()));
        let outcome = scanner.run_round(&round).await;
        assert!(inspection.apply(&round, outcome));

        let request = inspection.request_details(Severity::High).unwrap();
        let details = scanner.fetch_details(&request).await;
        assert!(inspection.complete_details(request.ticket, details));

        let report = inspection.report(scanner.config());
        assert_eq!(report.scanner_name, "Trivy");
        assert_eq!(report.images.len(), 2);
        assert_eq!(report.images[0].signed, CheckState::Pass);
        assert!(report.images[0].digest_pinned);
        assert_eq!(report.images[0].provenance_url, verify_url(BASE, &image));
        assert_eq!(report.images[1].sbom, CheckState::Fail);
        assert_eq!(
            report.images[1].verification.errors,
            vec![UNPINNED_MESSAGE.to_string()]
        );
        assert_eq!(report.vulnerability_state, CheckState::Fail);
        assert_eq!(report.vulnerabilities.summary.high, 1);
        assert_eq!(report.details.items[0].target.as_ref(), Some(&target));

        // Unpinned image never reaches the backend; every call carries the app header
        let calls = scanner.transport().calls();
        assert_eq!(calls.len(), 3);
        assert!(
            scanner
                .transport()
                .headers_seen()
                .iter()
                .all(|h| h.pairs().contains(&(APPLICATION_HEADER, "argocd:shop".to_string())))
        );
    }

    #[tokio::test]
    async fn test_toggle_details_makes_no_request() {
        let resource = deployment("api", &[]);
        let scanner = Scanner::new(FakeTransport::new(), config());

        let mut inspection = Inspection::new();
        inspection.load(resource, None);
        let request = inspection.request_details(Severity::Critical).unwrap();
        let outcome = scanner.fetch_details(&request).await;
        inspection.complete_details(request.ticket, outcome);
        let calls_after_open = scanner.transport().calls().len();

        assert!(inspection.request_details(Severity::Critical).is_none());
        assert!(!inspection.details().open);
        assert_eq!(scanner.transport().calls().len(), calls_after_open);
    }

    #[test]
    fn test_refresh_keeps_resource() {
        let mut inspection = Inspection::new();
        let first = inspection.load(deployment("api", &["a:1"]), None);
        let second = inspection.refresh();
        assert!(first.is_stale());
        assert_eq!(second.images, first.images);
        assert!(second.id() > first.id());
    }

    #[tokio::test]
    async fn test_refresh_discards_late_outcome() {
        let image = pinned();
        let transport = FakeTransport::new().with_json(
            &verify_url(BASE, &image),
            200,
            json!({"signed": true, "sbom": true, "errors": []}),
        );
        let scanner = Scanner::new(transport, config());

        let mut inspection = Inspection::new();
        let first = inspection.load(deployment("api", &[&image]), None);
        let second = inspection.refresh();

        // The stale round still finishes its requests
        let late = scanner.run_round(&first).await;
        assert!(first.is_stale());
        assert!(!scanner.transport().calls().is_empty());
        assert!(!inspection.apply(&first, late));
        assert!(inspection.image_results()[&image].loading);
        assert!(inspection.vulnerabilities().loading);

        let outcome = scanner.run_round(&second).await;
        assert!(inspection.apply(&second, outcome));
        assert!(!inspection.image_results()[&image].loading);
    }
}
