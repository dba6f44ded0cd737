//! Field palette: one entry per addable type, built-ins first.

use super::chrome::panel_block;
use crate::app::Effect;
use crate::builder_core::registry::PaletteEntry;
use crate::fields::{FieldCollection, FieldId, Scope};
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};

pub struct PaletteView {
    entries: Vec<PaletteEntry>,
    selected: usize,
    collection: FieldCollection,
    last_added: Option<FieldId>,
}

impl PaletteView {
    pub fn new(collection: &FieldCollection) -> Self {
        Self {
            entries: collection.registry().palette(),
            selected: 0,
            collection: collection.clone(),
            last_added: None,
        }
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    pub fn selected(&self) -> Option<&PaletteEntry> {
        self.entries.get(self.selected)
    }

    pub fn last_added(&self) -> Option<FieldId> {
        self.last_added
    }

    /// Append the selected type to the canvas.
    pub fn add_selected(&mut self) -> Vec<Effect> {
        let Some(tag) = self.selected().map(|e| e.tag.clone()) else {
            return Vec::new();
        };
        match self.collection.add_type(&tag, Scope::Canvas) {
            Ok(id) => {
                self.last_added = Some(id);
                Vec::new()
            }
            Err(e) => vec![Effect::error(e.to_string())],
        }
    }
}

impl super::Widget for PaletteView {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let items: Vec<ListItem> = self
            .entries
            .iter()
            .map(|e| ListItem::new(Line::raw(format!(" + {}", e.label))))
            .collect();
        let mut state = ListState::default();
        if focused {
            state.select(Some(self.selected));
        }
        let list = List::new(items)
            .block(panel_block(" Fields ", focused))
            .highlight_style(crate::theme::list_cursor_style());
        f.render_stateful_widget(list, area, &mut state);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.entries.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => return self.add_selected(),
            _ => {}
        }
        Vec::new()
    }
}
