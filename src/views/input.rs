use super::templates::{body, detail, header, missing, value_text};
use super::{FieldView, ViewBinding};
use crate::fields::{FieldCollection, FieldId, FieldModel, FieldType};
use ratatui::text::Line;

/// Text, TextArea and Checkbox fields.
pub struct InputFieldView {
    binding: ViewBinding,
    kind: FieldType,
}

impl InputFieldView {
    pub fn new(id: FieldId, kind: FieldType, collection: &FieldCollection) -> Self {
        Self {
            binding: ViewBinding::new(id, collection),
            kind,
        }
    }

    fn draw(&self, m: &FieldModel) -> Vec<Line<'static>> {
        let default = m.attr("defaultValue").map(value_text).unwrap_or_default();
        match self.kind {
            FieldType::Checkbox => {
                let mark = if m.attr_bool("defaultValue") { "x" } else { " " };
                vec![header(m, "☐"), body(format!("[{mark}] {}", m.title()))]
            }
            FieldType::TextArea => {
                let rows = m
                    .attr("rows")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(3)
                    .clamp(1, 6) as usize;
                let mut out = vec![header(m, "¶")];
                out.push(body(format!("┌{}┐", "─".repeat(24))));
                for i in 0..rows {
                    let text = if i == 0 { default.as_str() } else { "" };
                    out.push(body(format!("│{text:<24.24}│")));
                }
                out.push(body(format!("└{}┘", "─".repeat(24))));
                out
            }
            _ => {
                let mut out = vec![header(m, "✎"), body(format!("[{default:_<24.24}]"))];
                if let Some(max) = m.attr("maxLength").and_then(|v| v.as_u64()) {
                    out.push(detail(format!("max {max} characters")));
                }
                out
            }
        }
    }
}

impl FieldView for InputFieldView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let lines = match self.binding.model() {
            Some(m) => self.draw(&m),
            None => missing(self.binding.id()),
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
