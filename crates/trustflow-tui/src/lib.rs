//! Terminal panel for trustflow
//!
//! This crate provides the host side of an inspection: registering a panel
//! per resource kind, mapping keys to actions, reading terminal events and
//! drawing the current report.

pub mod app;
pub mod config;
pub mod host;
pub mod tui;
pub mod ui;

pub use app::{Action, PanelView, UiState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use host::{ARGOCD_GROUP, Extension, ExtensionRegistry, PanelRenderer, workload_group};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, StatusBar, panel_hints};
pub use ui::{InspectionPanel, Layout, Theme};
