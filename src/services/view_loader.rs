//! Resolves a model's type tag to something a view can be built from.
//!
//! Built-in types resolve immediately but still complete through the job
//! queue so every caller sees the same asynchronous shape. Plugin types read
//! their template file on a worker thread; parsed templates are cached per tag.

use super::jobs::JobQueue;
use crate::builder_core::registry::{normalize_tag, FieldTypeRegistry, ViewEntry};
use crate::error::FormError;
use crate::fields::FieldType;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use std::rc::Rc;

/// Template of a plugin field, read from its YAML file.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PluginTemplate {
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub title: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum ResolvedView {
    Builtin(FieldType),
    Plugin(Rc<PluginTemplate>),
}

fn read_template(tag: &str, path: &PathBuf) -> Result<PluginTemplate> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading template {}", path.display()))?;
    let mut tpl: PluginTemplate = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing template {}", path.display()))?;
    tpl.tag = tag.to_string();
    Ok(tpl)
}

#[derive(Clone)]
pub struct ViewLoader {
    registry: Rc<FieldTypeRegistry>,
    jobs: JobQueue,
    cache: Rc<RefCell<HashMap<String, Rc<PluginTemplate>>>>,
}

impl ViewLoader {
    pub fn new(registry: Rc<FieldTypeRegistry>, jobs: JobQueue) -> Self {
        Self {
            registry,
            jobs,
            cache: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    /// Start resolving `tag`; `done` runs on a later `pump`.
    pub fn load(&self, tag: &str, done: impl FnOnce(Result<ResolvedView, FormError>) + 'static) {
        let spec = match self.registry.resolve(tag) {
            None => {
                let err = FormError::view_load(tag, "no view registered for this type");
                self.jobs.defer(move || done(Err(err)));
                return;
            }
            Some(ViewEntry::Builtin(ft)) => {
                self.jobs.defer(move || done(Ok(ResolvedView::Builtin(ft))));
                return;
            }
            Some(ViewEntry::Plugin(spec)) => spec,
        };
        let key = normalize_tag(&spec.tag);
        let cached = self.cache.borrow().get(&key).cloned();
        if let Some(tpl) = cached {
            self.jobs.defer(move || done(Ok(ResolvedView::Plugin(tpl))));
            return;
        }
        let cache = self.cache.clone();
        let tag = spec.tag.clone();
        let path = PathBuf::from(&spec.template);
        log::debug!("view loader: reading template for {tag} from {}", path.display());
        self.jobs.spawn(
            move || read_template(&tag, &path).map_err(|e| (tag, format!("{e:#}"))),
            move |res| match res {
                Ok(tpl) => {
                    let tpl = Rc::new(tpl);
                    cache.borrow_mut().insert(key, tpl.clone());
                    done(Ok(ResolvedView::Plugin(tpl)))
                }
                Err((tag, msg)) => done(Err(FormError::view_load(tag, msg))),
            },
        );
    }

    #[cfg(test)]
    pub fn is_cached(&self, tag: &str) -> bool {
        self.cache.borrow().contains_key(&normalize_tag(tag))
    }
}
