use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};

pub const DEFAULT_FORM_NAME: &str = "New form";
pub const DEFAULT_THESAURUS_CMD: &str = "curl -s ${URL}";

/// A field type declared in the config file instead of compiled in.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct PluginSpec {
    pub tag: String,
    #[serde(default)]
    pub label: Option<String>,
    // YAML file with `lines:`; `${attr}` placeholders are filled from the model
    pub template: String,
    #[serde(default)]
    pub defaults: Map<String, JsonValue>,
    // Editor descriptors, same shape as the built-in baseSchema entries
    #[serde(default)]
    pub schema: Map<String, JsonValue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuilderConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_form_name")]
    pub default_form_name: String,
    // Palette entries by tag; empty means every known type in registry order
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
    // Command receiving the form JSON on stdin when saving
    #[serde(default)]
    pub save_cmd: Option<String>,
    #[serde(default)]
    pub save_dir: Option<String>,
    #[serde(default)]
    pub export_dir: Option<String>,
    #[serde(default)]
    pub thesaurus_cmd: Option<String>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            title: Some("Form Builder".to_string()),
            default_form_name: default_form_name(),
            palette: vec![],
            plugins: vec![],
            save_cmd: None,
            save_dir: None,
            export_dir: None,
            thesaurus_cmd: None,
            base_dir: PathBuf::from("."),
        }
    }
}

fn default_form_name() -> String {
    DEFAULT_FORM_NAME.to_string()
}

impl BuilderConfig {
    /// Absolute paths pass through; relative ones hang off the config directory.
    pub fn resolve_path(&self, p: &str) -> PathBuf {
        let pb = Path::new(p);
        if pb.is_absolute() {
            pb.to_path_buf()
        } else {
            self.base_dir.join(pb)
        }
    }

    pub fn save_dir(&self) -> PathBuf {
        self.resolve_path(self.save_dir.as_deref().unwrap_or("forms"))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.resolve_path(self.export_dir.as_deref().unwrap_or("exports"))
    }

    pub fn thesaurus_cmd(&self) -> &str {
        self.thesaurus_cmd
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_THESAURUS_CMD)
    }

    /// Plugin specs with template paths made absolute.
    pub fn resolved_plugins(&self) -> Vec<PluginSpec> {
        self.plugins
            .iter()
            .map(|p| PluginSpec {
                template: self.resolve_path(&p.template).to_string_lossy().to_string(),
                ..p.clone()
            })
            .collect()
    }
}

pub(crate) fn validate_config(cfg: &BuilderConfig) -> Result<(), String> {
    use crate::builder_core::registry::normalize_tag;
    use crate::fields::FieldType;
    use std::collections::HashSet;
    let mut tags = HashSet::new();
    for (i, p) in cfg.plugins.iter().enumerate() {
        if p.tag.trim().is_empty() {
            return Err(format!("plugins[{i}] has an empty tag"));
        }
        let norm = normalize_tag(&p.tag);
        if FieldType::from_normalized(&norm).is_some() {
            return Err(format!(
                "plugin '{}' at index {} shadows a built-in field type",
                p.tag, i
            ));
        }
        if !tags.insert(norm) {
            return Err(format!("duplicate plugin tag: '{}' at index {}", p.tag, i));
        }
        if p.template.trim().is_empty() {
            return Err(format!("plugin '{}' requires a 'template' path", p.tag));
        }
    }
    for entry in &cfg.palette {
        let norm = normalize_tag(entry);
        if FieldType::from_normalized(&norm).is_none() && !tags.contains(&norm) {
            return Err(format!("palette entry '{entry}' is not a known field type"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plugin(tag: &str) -> PluginSpec {
        PluginSpec {
            tag: tag.into(),
            template: "t.yaml".into(),
            ..Default::default()
        }
    }

    #[test]
    fn validate_detects_duplicate_plugin_tags() {
        let cfg = BuilderConfig {
            plugins: vec![plugin("Rating"), plugin("rating")],
            ..Default::default()
        };
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.contains("duplicate plugin tag"));
    }

    #[test]
    fn validate_rejects_shadowed_builtin_and_unknown_palette_entry() {
        let cfg = BuilderConfig {
            plugins: vec![plugin("text")],
            ..Default::default()
        };
        assert!(validate_config(&cfg).unwrap_err().contains("shadows"));

        let cfg = BuilderConfig {
            palette: vec!["Text".into(), "Signature".into()],
            ..Default::default()
        };
        assert!(validate_config(&cfg).unwrap_err().contains("Signature"));
    }

    #[test]
    fn parses_yaml_with_defaults() {
        let cfg: BuilderConfig = serde_yaml::from_str(
            "plugins:\n  - tag: Rating\n    template: rating.yaml\n    defaults:\n      stars: 5\n",
        )
        .unwrap();
        assert_eq!(cfg.default_form_name, DEFAULT_FORM_NAME);
        assert_eq!(cfg.plugins[0].defaults.get("stars"), Some(&serde_json::json!(5)));
        assert_eq!(cfg.thesaurus_cmd(), DEFAULT_THESAURUS_CMD);
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn relative_paths_hang_off_base_dir() {
        let cfg = BuilderConfig {
            base_dir: PathBuf::from("/srv/forms"),
            ..Default::default()
        };
        assert_eq!(cfg.export_dir(), PathBuf::from("/srv/forms/exports"));
        assert_eq!(cfg.resolve_path("/tmp/x"), PathBuf::from("/tmp/x"));
    }
}
