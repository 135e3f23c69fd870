use ratatui::{
    Frame,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::ui::{Layout, Theme};

/// Help overlay showing keybindings
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn render(frame: &mut Frame) {
        let area = Layout::popup(frame.area(), 46, 20);
        frame.render_widget(Clear, area);

        let help_text = vec![
            Line::from(Span::styled("Keybindings", Theme::title())),
            Line::from(""),
            Line::from(Span::styled("Vulnerabilities", Theme::section())),
            Self::key_line("c", "Critical findings"),
            Self::key_line("h", "High findings"),
            Self::key_line("m", "Medium findings"),
            Self::key_line("l", "Low findings"),
            Self::key_line("u", "Unknown findings"),
            Line::from(Span::styled(
                "    pressing the open severity closes it",
                Theme::text_dim(),
            )),
            Line::from(""),
            Line::from(Span::styled("Panel", Theme::section())),
            Self::key_line("r", "Re-run verification"),
            Self::key_line("j/↓", "Scroll down"),
            Self::key_line("k/↑", "Scroll up"),
            Self::key_line("g", "Go to top"),
            Self::key_line("?", "Toggle this help"),
            Self::key_line("q/Esc", "Quit"),
        ];

        let help_widget = Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border_focused())
                .title(Span::styled(" Help ", Theme::title())),
        );

        frame.render_widget(help_widget, area);
    }

    fn key_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
        Line::from(vec![
            Span::styled(format!("  {:>8}", key), Style::default().fg(Theme::SUCCESS)),
            Span::styled(format!("  {}", desc), Theme::text()),
        ])
    }
}
