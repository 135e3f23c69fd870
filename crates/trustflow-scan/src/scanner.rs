use std::collections::HashMap;
use std::sync::Arc;

use trustflow_types::{ImageVerification, VulnerabilityState};

use crate::config::ScanConfig;
use crate::error::FetchError;
use crate::session::{DetailRequest, Round, RoundOutcome};
use crate::transport::{HttpGet, ReqwestTransport};
use crate::vulns::DetailOutcome;
use crate::{verify, vulns};

/// Runs rounds against the backend with an explicit configuration.
///
/// Cheap to clone so background tasks can hold their own handle.
pub struct Scanner<T = ReqwestTransport> {
    transport: Arc<T>,
    config: Arc<ScanConfig>,
}

impl<T> Clone for Scanner<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config: Arc::clone(&self.config),
        }
    }
}

impl Scanner<ReqwestTransport> {
    /// Scanner over HTTP, configured from the given settings
    pub fn from_config(config: ScanConfig) -> Result<Self, FetchError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(transport, config))
    }
}

impl<T: HttpGet> Scanner<T> {
    pub fn new(transport: T, config: ScanConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Signature and SBOM status of every image in the round
    pub async fn verify(&self, round: &Round) -> HashMap<String, ImageVerification> {
        verify::verify_images(
            self.transport.as_ref(),
            self.config.base_url(),
            &round.headers,
            &round.images,
        )
        .await
    }

    /// Aggregated vulnerability verdict over the round's targets
    pub async fn summarize(&self, round: &Round) -> VulnerabilityState {
        vulns::summarize(
            self.transport.as_ref(),
            self.config.base_url(),
            &round.headers,
            &round.targets,
        )
        .await
    }

    /// Both halves of a round, issued together
    pub async fn run_round(&self, round: &Round) -> RoundOutcome {
        let (verification, vulnerabilities) =
            futures::join!(self.verify(round), self.summarize(round));
        RoundOutcome {
            verification,
            vulnerabilities,
        }
    }

    pub async fn fetch_details(&self, request: &DetailRequest) -> DetailOutcome {
        vulns::fetch_details(
            self.transport.as_ref(),
            self.config.base_url(),
            &request.headers,
            &request.targets,
            request.ticket.severity(),
        )
        .await
    }
}
