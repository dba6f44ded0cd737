//! Thesaurus field: a tree of terms fetched from a web service on first
//! render. `form/nodeSelected:<id>` re-roots the tree at one node.

use super::templates::{body, detail, error, header, missing};
use super::{FieldView, ViewBinding, ViewDeps};
use crate::builder_core::bus::{events, Channel, Payload};
use crate::builder_core::listeners::Subscription;
use crate::fields::{FieldId, FieldModel};
use crate::services::cli_runner::run_cmdline_to_json;
use crate::services::jobs::JobQueue;
use ratatui::text::Line;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

const MAX_NODE_LINES: usize = 12;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ThesaurusNode {
    pub title: String,
    #[serde(default)]
    pub key: JsonValue,
    #[serde(default)]
    pub children: Vec<ThesaurusNode>,
}

#[derive(Deserialize)]
struct NodeList {
    d: Vec<ThesaurusNode>,
}

pub fn parse_nodes(v: JsonValue) -> Result<Vec<ThesaurusNode>, String> {
    serde_json::from_value::<NodeList>(v)
        .map(|l| l.d)
        .map_err(|e| format!("unexpected thesaurus payload: {e}"))
}

#[derive(Clone, Debug, PartialEq)]
enum FetchState {
    Idle,
    Loading(String),
    Loaded {
        url: String,
        nodes: Vec<ThesaurusNode>,
        root: Option<String>,
    },
    Failed { url: String, message: String },
    Detached,
}

pub struct ThesaurusFieldView {
    binding: ViewBinding,
    jobs: JobQueue,
    cmd: String,
    fetch: Rc<RefCell<FetchState>>,
    _selection: Option<Subscription>,
}

impl ThesaurusFieldView {
    pub fn new(id: FieldId, deps: &ViewDeps) -> Self {
        let binding = ViewBinding::new(id, &deps.collection);
        let fetch = Rc::new(RefCell::new(FetchState::Idle));
        let weak = Rc::downgrade(&fetch);
        let dirty = binding.dirty_flag();
        let selection = deps.bus.on(
            Channel::Form,
            &events::node_selected(id),
            move |p| {
                let (Some(fetch), Payload::Text(key)) = (weak.upgrade(), p) else {
                    return;
                };
                if let FetchState::Loaded { nodes, root, .. } = &mut *fetch.borrow_mut() {
                    if find_node(nodes.as_slice(), key).is_some() {
                        *root = Some(key.clone());
                        dirty.set(true);
                    } else {
                        log::warn!("thesaurus #{id}: no node '{key}' to select");
                    }
                };
            },
        );
        Self {
            binding,
            jobs: deps.jobs.clone(),
            cmd: deps.thesaurus_cmd.clone(),
            fetch,
            _selection: Some(selection),
        }
    }

    fn start_fetch(&self, url: String) {
        *self.fetch.borrow_mut() = FetchState::Loading(url.clone());
        let weak = Rc::downgrade(&self.fetch);
        let dirty = self.binding.dirty_flag();
        let cmd = self.cmd.clone();
        let id = self.binding.id();
        let target = url.clone();
        log::debug!("thesaurus #{id}: fetching {url}");
        self.jobs.spawn(
            move || {
                let mut vars = HashMap::new();
                vars.insert("URL".to_string(), target);
                run_cmdline_to_json(&cmd, &vars)
                    .map_err(|e| format!("{e:#}"))
                    .and_then(parse_nodes)
            },
            move |res| {
                let Some(fetch) = weak.upgrade() else {
                    log::debug!("thesaurus #{id}: view dropped, ignoring result");
                    return;
                };
                let mut st = fetch.borrow_mut();
                // only the request we are still waiting for may land
                if *st != FetchState::Loading(url.clone()) {
                    log::debug!("thesaurus #{id}: stale result ignored");
                    return;
                }
                *st = match res {
                    Ok(nodes) => FetchState::Loaded {
                        url,
                        nodes,
                        root: None,
                    },
                    Err(message) => {
                        log::warn!("thesaurus #{id}: {message}");
                        FetchState::Failed { url, message }
                    }
                };
                dirty.set(true);
            },
        );
    }

    fn wanted_url(m: &FieldModel) -> String {
        m.attr_str("webServiceURL").unwrap_or("").trim().to_string()
    }

    fn draw(&self, m: &FieldModel) -> Vec<Line<'static>> {
        let mut out = vec![header(m, "⌥")];
        let default = m.attr_str("defaultNode").unwrap_or("").to_string();
        match &*self.fetch.borrow() {
            FetchState::Idle | FetchState::Detached => {
                out.push(detail("no web service URL configured"))
            }
            FetchState::Loading(url) => out.push(detail(format!("loading {url} ..."))),
            FetchState::Failed { message, .. } => out.push(error(message.clone())),
            FetchState::Loaded { nodes, root, .. } => {
                // a selected branch shows its children, a selected leaf itself
                let shown = match root.as_deref().and_then(|k| find_node(nodes, k)) {
                    Some(n) if !n.children.is_empty() => n.children.as_slice(),
                    Some(n) => std::slice::from_ref(n),
                    None => nodes.as_slice(),
                };
                let mut rows = Vec::new();
                flatten(shown, 0, &default, &mut rows);
                let total = rows.len();
                out.extend(rows.into_iter().take(MAX_NODE_LINES).map(body));
                if total > MAX_NODE_LINES {
                    out.push(detail(format!("... {} more", total - MAX_NODE_LINES)));
                }
                if total == 0 {
                    out.push(detail("(empty thesaurus)"));
                }
            }
        }
        out
    }
}

fn key_text(n: &ThesaurusNode) -> String {
    match &n.key {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Depth-first lookup by key, falling back to the title.
fn find_node<'a>(nodes: &'a [ThesaurusNode], key: &str) -> Option<&'a ThesaurusNode> {
    nodes.iter().find_map(|n| {
        if key_text(n) == key || n.title == key {
            Some(n)
        } else {
            find_node(&n.children, key)
        }
    })
}

fn flatten(nodes: &[ThesaurusNode], depth: usize, default: &str, out: &mut Vec<String>) {
    for n in nodes {
        let key = key_text(n);
        let mark = if !default.is_empty() && (key == default || n.title == default) {
            "●"
        } else if n.children.is_empty() {
            "·"
        } else {
            "▾"
        };
        out.push(format!("{}{mark} {}", "  ".repeat(depth), n.title));
        flatten(&n.children, depth + 1, default, out);
    }
}

impl FieldView for ThesaurusFieldView {
    fn id(&self) -> FieldId {
        self.binding.id()
    }

    fn render(&mut self) {
        let Some(m) = self.binding.model() else {
            self.binding.store(missing(self.binding.id()));
            return;
        };
        let url = Self::wanted_url(&m);
        let current = match &*self.fetch.borrow() {
            FetchState::Loading(u) => Some(u.clone()),
            FetchState::Loaded { url, .. } | FetchState::Failed { url, .. } => Some(url.clone()),
            FetchState::Idle | FetchState::Detached => None,
        };
        if url.is_empty() {
            *self.fetch.borrow_mut() = FetchState::Idle;
        } else if current.as_deref() != Some(url.as_str()) {
            self.start_fetch(url);
        }
        let lines = self.draw(&m);
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
        if self.binding.release() {
            self._selection = None;
            *self.fetch.borrow_mut() = FetchState::Detached;
        }
    }

    fn is_removed(&self) -> bool {
        self.binding.is_released()
    }
}
