use trustflow_types::InspectionReport;

/// View state of the panel that is not part of the inspection itself
#[derive(Clone, Debug, Default)]
pub struct UiState {
    pub scroll: u16,
    /// Scroll offset of the findings pane, reset when it opens
    pub detail_scroll: u16,
    pub show_help: bool,
    pub should_quit: bool,
    /// Host-level error shown in the status bar, e.g. a failed spawn
    pub error: Option<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scroll the findings pane while it is open, the summary otherwise
    pub fn scroll_up(&mut self, details_open: bool, lines: u16) {
        let offset = self.offset_mut(details_open);
        *offset = offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, details_open: bool, lines: u16) {
        let offset = self.offset_mut(details_open);
        *offset = offset.saturating_add(lines);
    }

    pub fn scroll_to_top(&mut self, details_open: bool) {
        *self.offset_mut(details_open) = 0;
    }

    fn offset_mut(&mut self, details_open: bool) -> &mut u16 {
        if details_open {
            &mut self.detail_scroll
        } else {
            &mut self.scroll
        }
    }

    pub fn show_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

/// Everything a renderer needs for one frame
pub struct PanelView<'a> {
    pub title: &'a str,
    pub report: &'a InspectionReport,
    pub ui: &'a UiState,
}
