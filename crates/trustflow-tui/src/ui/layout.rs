use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Layout helper for the panel
pub struct Layout;

impl Layout {
    /// Header, content and status bar
    pub fn main(area: Rect) -> (Rect, Rect, Rect) {
        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Min(1),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

        (chunks[0], chunks[1], chunks[2])
    }

    /// Split the content area when the detail list is open
    pub fn content(area: Rect, details_open: bool) -> (Rect, Option<Rect>) {
        if !details_open {
            return (area, None);
        }
        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(area);
        (chunks[0], Some(chunks[1]))
    }

    /// Centered popup of at most the given size
    pub fn popup(area: Rect, width: u16, height: u16) -> Rect {
        let width = width.min(area.width.saturating_sub(4));
        let height = height.min(area.height.saturating_sub(4));
        let x = area.x + area.width.saturating_sub(width) / 2;
        let y = area.y + area.height.saturating_sub(height) / 2;
        Rect::new(x, y, width, height)
    }
}
