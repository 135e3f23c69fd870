use tracing::debug;
use trustflow_types::{Severity, VulnerabilityDetailState};

use crate::vulns::DetailOutcome;

/// Identifies one detail request. Only the newest ticket may publish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetailTicket {
    generation: u64,
    severity: Severity,
}

impl DetailTicket {
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Owns the detail panel state and its request generation.
///
/// Every request, including one that only closes the panel, bumps the
/// generation. Results carrying an older ticket are dropped on arrival, so
/// the last request wins regardless of which response lands last.
#[derive(Debug, Default)]
pub struct DetailTracker {
    state: VulnerabilityDetailState,
    generation: u64,
}

impl DetailTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &VulnerabilityDetailState {
        &self.state
    }

    /// Open the given severity, or close it if it is the one already open.
    ///
    /// Returns a ticket when a fetch has to be issued.
    pub fn request(&mut self, severity: Severity) -> Option<DetailTicket> {
        self.generation += 1;

        if self.state.is_open_for(severity) {
            debug!(%severity, generation = self.generation, "closing vulnerability details");
            self.state = VulnerabilityDetailState {
                severity: Some(severity),
                ..VulnerabilityDetailState::closed()
            };
            return None;
        }

        debug!(%severity, generation = self.generation, "opening vulnerability details");
        self.state = VulnerabilityDetailState::opening(severity);
        Some(DetailTicket {
            generation: self.generation,
            severity,
        })
    }

    /// Publish a fetch result. Returns false when the ticket was superseded.
    pub fn complete(&mut self, ticket: DetailTicket, outcome: DetailOutcome) -> bool {
        if ticket.generation != self.generation {
            debug!(
                severity = %ticket.severity,
                ticket = ticket.generation,
                current = self.generation,
                "discarding superseded detail result"
            );
            return false;
        }

        let error = if outcome.errors.is_empty() {
            None
        } else {
            Some(outcome.errors.join(" | "))
        };
        self.state = VulnerabilityDetailState {
            open: true,
            loading: false,
            severity: Some(ticket.severity),
            items: outcome.items,
            error,
        };
        true
    }

    /// Close the panel and invalidate anything in flight
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = VulnerabilityDetailState::closed();
    }
}
