use super::templates::missing;
use super::{FieldView, ViewBinding};
use crate::fields::{FieldCollection, FieldId};
use ratatui::text::{Line, Span};

pub struct HorizontalLineFieldView {
    binding: ViewBinding,
}

impl HorizontalLineFieldView {
    pub fn new(id: FieldId, collection: &FieldCollection) -> Self {
        Self {
            binding: ViewBinding::new(id, collection),
        }
    }
}

impl FieldView for HorizontalLineFieldView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let lines = if self.binding.model().is_some() {
            vec![Line::from(Span::styled(
                "─".repeat(40),
                crate::theme::text_muted(),
            ))]
        } else {
            missing(self.binding.id())
        };
        self.binding.store(lines);
    }

    fn lines(&mut self) -> Vec<Line<'static>> {
        if self.binding.is_dirty() && !self.binding.is_released() {
            self.render();
        }
        self.binding.cached()
    }

    fn update_index(&self, index: usize) -> bool {
        self.binding.update_index(index)
    }

    fn remove_view(&mut self) {
        self.binding.release();
    }

    fn is_removed(&self) -> bool {
        self.binding.is_released()
    }
}
