use super::templates::{fill, header, missing};
use super::{FieldView, ViewBinding};
use crate::fields::{FieldCollection, FieldId};
use crate::services::view_loader::PluginTemplate;
use ratatui::text::Line;
use std::rc::Rc;

/// A field type declared in the config file, drawn from its template.
pub struct PluginFieldView {
    binding: ViewBinding,
    template: Rc<PluginTemplate>,
}

impl PluginFieldView {
    pub fn new(id: FieldId, template: Rc<PluginTemplate>, collection: &FieldCollection) -> Self {
        Self {
            binding: ViewBinding::new(id, collection),
            template,
        }
    }
}

impl FieldView for PluginFieldView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let Some(m) = self.binding.model() else {
            self.binding.store(missing(self.binding.id()));
            return;
        };
        let glyph = self.template.title.as_deref().unwrap_or("◆");
        let mut out = vec![header(&m, glyph)];
        out.extend(
            self.template
                .lines
                .iter()
                .map(|l| super::templates::body(fill(l, &m))),
        );
        self.binding.store(out);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder_core::registry::FieldTypeRegistry;
    use crate::fields::FieldModel;
    use crate::model::PluginSpec;
    use crate::views::test_support::{deps_with, text_of};
    use serde_json::json;

    #[test]
    fn template_lines_are_filled_from_the_model() {
        let reg = FieldTypeRegistry::builtin().with_plugin(PluginSpec {
            tag: "Rating".into(),
            template: "unused.yaml".into(),
            ..Default::default()
        });
        let d = deps_with(reg, "true");
        let id = d
            .collection
            .add(
                FieldModel::new("rating")
                    .with_attribute("label", json!("Mood"))
                    .with_attribute("stars", json!(4)),
            )
            .unwrap();
        let tpl = Rc::new(PluginTemplate {
            tag: "Rating".into(),
            title: Some("★".into()),
            lines: vec!["${stars} of 5".into()],
        });
        let mut v = PluginFieldView::new(id, tpl, &d.collection);
        let text = text_of(&v.lines());
        assert!(text.contains("★ Mood"));
        assert!(text.contains("4 of 5"));
    }
}
