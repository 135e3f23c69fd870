//! Capabilities the host offers to an inspection panel
//!
//! A panel is registered per (group, kind) and asked to draw whatever the
//! current report says. It never fetches anything itself.

use std::sync::Arc;

use ratatui::Frame;
use tracing::debug;
use trustflow_types::{APPLICATION_KIND, WORKLOAD_KINDS};

use crate::app::PanelView;
use crate::ui::InspectionPanel;

/// API group of the Argo CD application resource
pub const ARGOCD_GROUP: &str = "argoproj.io";

/// Draw a panel for the given state
pub trait PanelRenderer: Send + Sync {
    fn render(&self, frame: &mut Frame, view: &PanelView<'_>);
}

/// A panel registered for one resource kind
#[derive(Clone)]
pub struct Extension {
    pub group: String,
    pub kind: String,
    pub title: String,
    renderer: Arc<dyn PanelRenderer>,
}

impl Extension {
    pub fn render(&self, frame: &mut Frame, view: &PanelView<'_>) {
        self.renderer.render(frame, view)
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("group", &self.group)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .finish_non_exhaustive()
    }
}

/// Resource kinds the host knows a panel for
#[derive(Clone, Debug, Default)]
pub struct ExtensionRegistry {
    extensions: Vec<Extension>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register as handler for resource kind `group/kind`. A later
    /// registration for the same kind replaces the earlier one.
    pub fn register(
        &mut self,
        group: impl Into<String>,
        kind: impl Into<String>,
        title: impl Into<String>,
        renderer: Arc<dyn PanelRenderer>,
    ) {
        let (group, kind) = (group.into(), kind.into());
        self.extensions
            .retain(|e| !(e.group == group && e.kind == kind));
        debug!(%group, %kind, "registered panel");
        self.extensions.push(Extension {
            group,
            kind,
            title: title.into(),
            renderer,
        });
    }

    pub fn handler_for(&self, group: &str, kind: &str) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|e| e.group == group && e.kind == kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = (&str, &str)> {
        self.extensions
            .iter()
            .map(|e| (e.group.as_str(), e.kind.as_str()))
    }

    /// The inspection panel for every workload kind and Argo CD applications
    pub fn with_inspection_panel(title: &str) -> Self {
        let panel: Arc<dyn PanelRenderer> = Arc::new(InspectionPanel);
        let mut registry = Self::new();
        for kind in WORKLOAD_KINDS {
            registry.register(workload_group(kind), kind, title, Arc::clone(&panel));
        }
        registry.register(ARGOCD_GROUP, APPLICATION_KIND, title, panel);
        registry
    }
}

/// API group a workload kind is served from
pub fn workload_group(kind: &str) -> &'static str {
    match kind {
        "Job" | "CronJob" => "batch",
        "Pod" => "",
        _ => "apps",
    }
}
