use super::templates::{body, detail, header, missing, value_text};
use super::{FieldView, ViewBinding};
use crate::fields::{FieldCollection, FieldId, FieldModel};
use ratatui::text::Line;

pub struct NumericFieldView {
    binding: ViewBinding,
}

impl NumericFieldView {
    pub fn new(id: FieldId, collection: &FieldCollection) -> Self {
        Self {
            binding: ViewBinding::new(id, collection),
        }
    }
}

fn draw(m: &FieldModel) -> Vec<Line<'static>> {
    let num = |k: &str| m.attr(k).map(value_text).unwrap_or_default();
    let unit = m.attr_str("unity").unwrap_or("");
    let mut out = vec![
        header(m, "#"),
        body(format!("[{:_>10}] {unit}", "0")),
        detail(format!("range {} .. {}", num("minValue"), num("maxValue"))),
    ];
    if m.attr_bool("decimal") {
        out.push(detail(format!("{} decimals", num("precision"))));
    } else {
        out.push(detail("integer"));
    }
    out
}

impl FieldView for NumericFieldView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let lines = match self.binding.model() {
            Some(m) => draw(&m),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Scope;
    use crate::views::test_support::{deps, text_of};
    use serde_json::{json, Map};

    #[test]
    fn decimal_flag_switches_precision_line() {
        let d = deps();
        let id = d.collection.add_type("Numeric", Scope::Canvas).unwrap();
        let mut v = NumericFieldView::new(id, &d.collection);
        assert!(text_of(&v.lines()).contains("integer"));
        let mut attrs = Map::new();
        attrs.insert("decimal".into(), json!(true));
        attrs.insert("unity".into(), json!("kg"));
        d.collection.update_field(id, attrs).unwrap();
        let text = text_of(&v.lines());
        assert!(text.contains("2 decimals"));
        assert!(text.contains("kg"));
    }
}
