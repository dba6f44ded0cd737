use super::orchestrator::ViewOrchestrator;
use super::templates::{detail, header, indent, missing};
use super::{FieldView, ViewBinding, ViewDeps};
use crate::fields::{FieldId, Scope};
use ratatui::text::Line;

/// A fieldset: its legend plus a nested orchestrator owning the views of
/// its children.
pub struct FieldsetView {
    binding: ViewBinding,
    children: ViewOrchestrator,
}

impl FieldsetView {
    pub fn new(id: FieldId, deps: &ViewDeps) -> Self {
        let children = ViewOrchestrator::new(Scope::Fieldset(id), deps.clone());
        children.attach_existing();
        Self {
            binding: ViewBinding::new(id, &deps.collection),
            children,
        }
    }

    pub fn children(&self) -> &ViewOrchestrator {
        &self.children
    }

    /// The legend alone; the canvas draws children as their own rows.
    pub fn legend_lines(&mut self) -> Vec<Line<'static>> {
        if self.binding.is_released() {
            return Vec::new();
        }
        if self.binding.is_dirty() {
            self.render();
        }
        let mut out = self.binding.cached();
        if self.children.view_count() == 0 && self.children.pending_count() == 0 {
            out.push(detail("(empty: press > on a field to move it here)"));
        }
        out
    }
}

impl FieldView for FieldsetView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let lines = match self.binding.model() {
            Some(m) => vec![header(&m, "▣")],
            None => missing(self.binding.id()),
        };
        self.binding.store(lines);
    }

    fn lines(&mut self) -> Vec<Line<'static>> {
        let mut out = self.legend_lines();
        for (_, view) in self.children.entries() {
            out.extend(indent(view.borrow_mut().lines(), 4));
        }
        if self.children.pending_count() > 0 {
            out.push(detail("loading ..."));
        }
        out
    }

    fn update_index(&self, index: usize) -> bool {
        self.binding.update_index(index)
    }

    fn remove_view(&mut self) {
        if self.binding.release() {
            self.children.shutdown();
        }
    }

    fn is_removed(&self) -> bool {
        self.binding.is_released()
    }

    fn as_fieldset(&self) -> Option<&FieldsetView> {
        Some(self)
    }

    fn as_fieldset_mut(&mut self) -> Option<&mut FieldsetView> {
        Some(self)
    }
}
