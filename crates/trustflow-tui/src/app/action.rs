use trustflow_types::Severity;

/// All possible actions in the panel (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,

    // Rounds
    Refresh,
    ToggleDetails(Severity),

    // Navigation
    ScrollUp(u16),
    ScrollDown(u16),
    ScrollToTop,

    ToggleHelp,
}
