use crossterm::event::KeyCode;
use ratatui::crossterm::event as rt_event;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders};

pub fn panel_block<'a>(title: impl Into<Line<'a>>, focused: bool) -> Block<'a> {
    let mut b = Block::default().borders(Borders::ALL).title(title);
    if focused {
        b = b.border_style(crate::theme::border_focused());
    } else {
        b = b.border_style(crate::theme::border_unfocused());
    }
    b
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(v[1])[1]
}

/// Translate a key for a single-line `TextArea`. Keys the editor should not
/// see (Enter, Esc, Tab, arrows up/down) map to `None`.
pub fn textarea_key(key: KeyCode) -> Option<rt_event::KeyEvent> {
    let code = match key {
        KeyCode::Char(c) => rt_event::KeyCode::Char(c),
        KeyCode::Backspace => rt_event::KeyCode::Backspace,
        KeyCode::Delete => rt_event::KeyCode::Delete,
        KeyCode::Left => rt_event::KeyCode::Left,
        KeyCode::Right => rt_event::KeyCode::Right,
        KeyCode::Home => rt_event::KeyCode::Home,
        KeyCode::End => rt_event::KeyCode::End,
        _ => return None,
    };
    Some(rt_event::KeyEvent::new(code, rt_event::KeyModifiers::NONE))
}
