use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use trustflow_types::Severity;

use crate::app::Action;

/// A key combination
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::CONTROL,
        }
    }

    pub fn from_event(event: &KeyEvent) -> Self {
        Self {
            code: event.code,
            modifiers: event.modifiers,
        }
    }
}

/// Context for keybindings
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyContext {
    Global,
    Panel,
    Help,
}

/// Keybinding configuration
pub struct KeyBindings {
    bindings: HashMap<KeyContext, HashMap<KeyBinding, Action>>,
}

impl KeyBindings {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();

        let mut global = HashMap::new();
        global.insert(KeyBinding::new(KeyCode::Char('?')), Action::ToggleHelp);
        global.insert(KeyBinding::new(KeyCode::Char('q')), Action::Quit);
        global.insert(KeyBinding::new(KeyCode::Esc), Action::Quit);
        global.insert(KeyBinding::ctrl(KeyCode::Char('c')), Action::Quit);
        bindings.insert(KeyContext::Global, global);

        let mut panel = HashMap::new();
        for severity in Severity::ALL {
            panel.insert(
                KeyBinding::new(KeyCode::Char(severity.short().to_ascii_lowercase())),
                Action::ToggleDetails(severity),
            );
        }
        panel.insert(KeyBinding::new(KeyCode::Char('r')), Action::Refresh);
        panel.insert(KeyBinding::new(KeyCode::Char('j')), Action::ScrollDown(1));
        panel.insert(KeyBinding::new(KeyCode::Down), Action::ScrollDown(1));
        panel.insert(KeyBinding::new(KeyCode::Char('k')), Action::ScrollUp(1));
        panel.insert(KeyBinding::new(KeyCode::Up), Action::ScrollUp(1));
        panel.insert(KeyBinding::new(KeyCode::PageDown), Action::ScrollDown(10));
        panel.insert(KeyBinding::new(KeyCode::PageUp), Action::ScrollUp(10));
        panel.insert(KeyBinding::new(KeyCode::Char('g')), Action::ScrollToTop);
        bindings.insert(KeyContext::Panel, panel);

        // Esc closes the overlay instead of quitting
        let mut help = HashMap::new();
        help.insert(KeyBinding::new(KeyCode::Esc), Action::ToggleHelp);
        bindings.insert(KeyContext::Help, help);

        Self { bindings }
    }

    /// Look up action for key event in given context
    pub fn get_action(&self, context: KeyContext, key: &KeyEvent) -> Option<Action> {
        let binding = KeyBinding::from_event(key);

        if let Some(action) = self
            .bindings
            .get(&context)
            .and_then(|context_bindings| context_bindings.get(&binding))
        {
            return Some(action.clone());
        }

        self.bindings
            .get(&KeyContext::Global)?
            .get(&binding)
            .cloned()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_severity_keys() {
        let bindings = KeyBindings::new();
        let expected = [
            ('c', Severity::Critical),
            ('h', Severity::High),
            ('m', Severity::Medium),
            ('l', Severity::Low),
            ('u', Severity::Unknown),
        ];
        for (c, severity) in expected {
            assert_eq!(
                bindings.get_action(KeyContext::Panel, &key(KeyCode::Char(c))),
                Some(Action::ToggleDetails(severity))
            );
        }
    }

    #[test]
    fn test_global_fallback() {
        let bindings = KeyBindings::new();
        assert_eq!(
            bindings.get_action(KeyContext::Panel, &key(KeyCode::Char('q'))),
            Some(Action::Quit)
        );
        assert_eq!(
            bindings.get_action(
                KeyContext::Panel,
                &KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)
            ),
            Some(Action::Quit)
        );
        assert_eq!(
            bindings.get_action(KeyContext::Panel, &key(KeyCode::Char('x'))),
            None
        );
    }

    #[test]
    fn test_help_context() {
        let bindings = KeyBindings::new();
        assert_eq!(
            bindings.get_action(KeyContext::Help, &key(KeyCode::Esc)),
            Some(Action::ToggleHelp)
        );
        // Panel keys are inert while the overlay is shown
        assert_eq!(
            bindings.get_action(KeyContext::Help, &key(KeyCode::Char('r'))),
            None
        );
    }
}
