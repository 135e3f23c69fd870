use ratatui::style::{Color, Modifier, Style};
use trustflow_types::{CheckState, Severity};

/// Color theme for the panel
pub struct Theme;

impl Theme {
    // Base colors
    pub const BG: Color = Color::Reset;
    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;

    // Accent colors
    pub const PRIMARY: Color = Color::Cyan;
    pub const HIGHLIGHT: Color = Color::Yellow;

    // Status colors
    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;

    pub fn border() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(Self::PRIMARY)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(Self::PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    pub fn section() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn text() -> Style {
        Style::default().fg(Self::FG)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(Self::FG_DIM)
    }

    pub fn text_highlight() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .add_modifier(Modifier::BOLD)
    }

    pub fn check_color(state: CheckState) -> Color {
        match state {
            CheckState::Pass => Self::SUCCESS,
            CheckState::Fail => Self::ERROR,
            CheckState::Pending => Color::Blue,
        }
    }

    pub fn severity_color(severity: Severity) -> Color {
        match severity {
            Severity::Critical => Color::Magenta,
            Severity::High => Color::Red,
            Severity::Medium => Color::Yellow,
            Severity::Low => Color::Cyan,
            Severity::Unknown => Color::Gray,
        }
    }

    /// PASS / FAIL / PENDING badge
    pub fn check(state: CheckState) -> Style {
        Style::default()
            .fg(Self::check_color(state))
            .add_modifier(Modifier::BOLD)
    }

    pub fn severity(severity: Severity) -> Style {
        Style::default().fg(Self::severity_color(severity))
    }

    pub fn severity_selected(severity: Severity) -> Style {
        Style::default()
            .fg(Self::BG)
            .bg(Self::severity_color(severity))
            .add_modifier(Modifier::BOLD)
    }

    pub fn link() -> Style {
        Style::default()
            .fg(Color::Blue)
            .add_modifier(Modifier::UNDERLINED)
    }

    // Status bar
    pub fn status_bar() -> Style {
        Style::default().fg(Self::FG_DIM).bg(Color::DarkGray)
    }

    pub fn status_bar_key() -> Style {
        Style::default()
            .fg(Self::HIGHLIGHT)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error() -> Style {
        Style::default()
            .fg(Self::ERROR)
            .add_modifier(Modifier::BOLD)
    }

    pub fn warning() -> Style {
        Style::default().fg(Self::WARNING)
    }
}
