pub mod chrome;
pub mod form_panel;
pub mod main_view;
pub mod modal;
pub mod palette;
pub mod settings;
pub mod status_bar;

use crate::app::Effect;
use crossterm::event::KeyCode;
use ratatui::prelude::*;

pub trait Widget {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, tick: u64);
    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        let _ = key;
        Vec::new()
    }
}
