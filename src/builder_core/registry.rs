use crate::fields::FieldType;
use crate::model::{BuilderConfig, PluginSpec};

/// What a type tag resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum ViewEntry {
    Builtin(FieldType),
    Plugin(PluginSpec),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaletteEntry {
    pub tag: String,
    pub label: String,
}

/// Fold case and separators so `horizontal-line`, `Horizontal_Line` and
/// `HorizontalLine` all resolve to the same entry.
pub fn normalize_tag(tag: &str) -> String {
    let folded: String = tag
        .trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .collect::<String>()
        .to_ascii_lowercase();
    match folded.as_str() {
        "hr" | "line" => "horizontalline".to_string(),
        "number" => "numeric".to_string(),
        "tree" | "treeview" => "thesaurus".to_string(),
        _ => folded,
    }
}

/// Static mapping from type tag to field implementation.
///
/// Built-ins resolve at compile time; plugin tags come from the config file and
/// are the only entries whose view is loaded from disk.
#[derive(Clone, Debug, Default)]
pub struct FieldTypeRegistry {
    plugins: Vec<PluginSpec>,
    palette_order: Vec<String>,
}

impl FieldTypeRegistry {
    #[cfg(test)]
    pub fn builtin() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &BuilderConfig) -> Self {
        Self {
            plugins: cfg.resolved_plugins(),
            palette_order: cfg.palette.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_plugin(mut self, spec: PluginSpec) -> Self {
        self.plugins.push(spec);
        self
    }

    pub fn resolve(&self, tag: &str) -> Option<ViewEntry> {
        let norm = normalize_tag(tag);
        if let Some(ft) = FieldType::from_normalized(&norm) {
            return Some(ViewEntry::Builtin(ft));
        }
        self.plugins
            .iter()
            .find(|p| normalize_tag(&p.tag) == norm)
            .cloned()
            .map(ViewEntry::Plugin)
    }

    /// The spelling stored in models (`HorizontalLine`, plugin tag as declared).
    pub fn canonical_tag(&self, tag: &str) -> Option<String> {
        match self.resolve(tag)? {
            ViewEntry::Builtin(ft) => Some(ft.tag().to_string()),
            ViewEntry::Plugin(p) => Some(p.tag),
        }
    }

    pub fn palette(&self) -> Vec<PaletteEntry> {
        let all: Vec<PaletteEntry> = FieldType::ALL
            .iter()
            .map(|ft| PaletteEntry {
                tag: ft.tag().to_string(),
                label: ft.label().to_string(),
            })
            .chain(self.plugins.iter().map(|p| PaletteEntry {
                tag: p.tag.clone(),
                label: p.label.clone().unwrap_or_else(|| p.tag.clone()),
            }))
            .collect();
        if self.palette_order.is_empty() {
            return all;
        }
        self.palette_order
            .iter()
            .filter_map(|wanted| {
                let norm = normalize_tag(wanted);
                all.iter().find(|e| normalize_tag(&e.tag) == norm).cloned()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating() -> PluginSpec {
        PluginSpec {
            tag: "Rating".into(),
            label: Some("Star rating".into()),
            template: "templates/rating.yaml".into(),
            ..Default::default()
        }
    }

    #[test]
    fn aliases_fold_to_builtins() {
        let reg = FieldTypeRegistry::builtin();
        assert_eq!(
            reg.resolve("horizontal-line"),
            Some(ViewEntry::Builtin(FieldType::HorizontalLine))
        );
        assert_eq!(reg.canonical_tag("hr").as_deref(), Some("HorizontalLine"));
        assert_eq!(reg.canonical_tag("text_area").as_deref(), Some("TextArea"));
        assert!(reg.resolve("Signature").is_none());
    }

    #[test]
    fn plugins_resolve_after_builtins() {
        let reg = FieldTypeRegistry::builtin().with_plugin(rating());
        match reg.resolve("rating") {
            Some(ViewEntry::Plugin(p)) => assert_eq!(p.tag, "Rating"),
            other => panic!("expected plugin entry, got {other:?}"),
        }
        let palette = reg.palette();
        assert_eq!(palette.len(), FieldType::ALL.len() + 1);
        assert_eq!(palette.last().map(|e| e.label.as_str()), Some("Star rating"));
    }

    #[test]
    fn palette_order_filters_and_sorts() {
        let cfg = BuilderConfig {
            palette: vec!["Numeric".into(), "text".into(), "Rating".into()],
            plugins: vec![rating()],
            ..Default::default()
        };
        let reg = FieldTypeRegistry::from_config(&cfg);
        let tags: Vec<String> = reg.palette().into_iter().map(|e| e.tag).collect();
        assert_eq!(tags, vec!["Numeric", "Text", "Rating"]);
    }
}
