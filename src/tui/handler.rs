use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::ScreenKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    Quit,
    MoveUp,
    MoveDown,
    OpenSelected,
    Back,
    StartAddFeed,
    DeleteFeed,
    SyncSelected,
    SyncAll,
    OpenInBrowser,
    // Add-feed input actions
    InputChar(char),
    InputBackspace,
    InputConfirm,
    InputCancel,
}

/// Maps a key press to an action, given which screen is active and whether
/// the add-feed prompt has captured the keyboard.
pub fn handle_key_event(key: KeyEvent, screen: ScreenKind, input_active: bool) -> Option<AppAction> {
    // Input mode swallows everything
    if input_active {
        return match key.code {
            KeyCode::Enter => Some(AppAction::InputConfirm),
            KeyCode::Esc => Some(AppAction::InputCancel),
            KeyCode::Backspace => Some(AppAction::InputBackspace),
            KeyCode::Char(c) => Some(AppAction::InputChar(c)),
            _ => None,
        };
    }

    // Normal mode
    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => Some(AppAction::Quit),
        (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(AppAction::Quit),

        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(AppAction::MoveDown),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(AppAction::MoveUp),

        (KeyCode::Enter, _) if screen != ScreenKind::Detail => Some(AppAction::OpenSelected),
        (KeyCode::Char('b'), _) if screen != ScreenKind::Feeds => Some(AppAction::Back),

        (KeyCode::Char('a'), _) if screen == ScreenKind::Feeds => Some(AppAction::StartAddFeed),
        (KeyCode::Char('d'), _) if screen == ScreenKind::Feeds => Some(AppAction::DeleteFeed),
        (KeyCode::Char('u'), _) if screen == ScreenKind::Feeds => Some(AppAction::SyncSelected),
        (KeyCode::Char('r'), _) if screen == ScreenKind::Feeds => Some(AppAction::SyncAll),

        (KeyCode::Char('o'), _) if screen == ScreenKind::Detail => Some(AppAction::OpenInBrowser),

        _ => None,
    }
}
