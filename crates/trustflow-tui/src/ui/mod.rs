pub mod components;
mod layout;
mod panel;
mod theme;

pub use layout::Layout;
pub use panel::{InspectionPanel, detail_lines, summary_lines};
pub use theme::Theme;
