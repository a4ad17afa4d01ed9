use crossterm::event::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    Quit,
    Refresh,
    ToggleAutoRefresh,
    CycleSort,
    ToggleInsights,
    ToggleIndicators,
    CycleHistory,
    ScrollUp,
    ScrollDown,
}

pub fn parse_main_command(key_code: &KeyCode) -> Option<UiCommand> {
    match key_code {
        KeyCode::Esc => Some(UiCommand::Quit),
        KeyCode::F(5) => Some(UiCommand::Refresh),
        KeyCode::Tab => Some(UiCommand::CycleSort),
        KeyCode::Up => Some(UiCommand::ScrollUp),
        KeyCode::Down => Some(UiCommand::ScrollDown),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'q' => Some(UiCommand::Quit),
            'r' => Some(UiCommand::Refresh),
            'a' => Some(UiCommand::ToggleAutoRefresh),
            's' => Some(UiCommand::CycleSort),
            'i' => Some(UiCommand::ToggleInsights),
            't' => Some(UiCommand::ToggleIndicators),
            'h' => Some(UiCommand::CycleHistory),
            'k' => Some(UiCommand::ScrollUp),
            'j' => Some(UiCommand::ScrollDown),
            _ => None,
        },
        _ => None,
    }
}
