//! Settings pane: edits the form's metadata or one field's attributes and
//! reports the result on the `edition` channel.

use super::chrome::{centered_rect, panel_block, textarea_key};
use crate::app::Effect;
use crate::builder_core::bus::{events, Channel, ChannelBus, Payload};
use crate::builder_core::listeners::Subscription;
use crate::fields::{FieldId, FieldModel, FormAttributes};
use crate::views::templates::value_text;
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Clear, List, ListItem, ListState, Paragraph};
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;
use std::rc::Rc;
use tui_textarea::TextArea;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Text,
    Number,
    Checkbox,
}

impl EntryKind {
    fn from_descriptor(desc: &JsonValue) -> Self {
        match desc.get("type").and_then(|t| t.as_str()) {
            Some("Checkbox") => EntryKind::Checkbox,
            Some("Number") => EntryKind::Number,
            _ => EntryKind::Text,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: String,
    pub title: String,
    pub kind: EntryKind,
    pub value: JsonValue,
    original: JsonValue,
}

impl Entry {
    fn new(key: &str, title: &str, kind: EntryKind, value: JsonValue) -> Self {
        Self {
            key: key.to_string(),
            title: title.to_string(),
            kind,
            original: value.clone(),
            value,
        }
    }

    fn changed(&self) -> bool {
        self.value != self.original
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsTarget {
    Form,
    Field(FieldId),
}

#[derive(Default)]
struct SettingsState {
    target: Option<SettingsTarget>,
    title: String,
    entries: Vec<Entry>,
    selected: usize,
    editor: Option<TextArea<'static>>,
    message: Option<String>,
    // field being edited, with the pane's values applied for derived schema
    draft: Option<FieldModel>,
}

impl SettingsState {
    fn open_form(&mut self, attrs: &FormAttributes) {
        self.reset(SettingsTarget::Form, "Form settings".to_string());
        self.entries = vec![
            Entry::new("name", "Name", EntryKind::Text, JsonValue::String(attrs.name.clone())),
            Entry::new(
                "description",
                "Description",
                EntryKind::Text,
                JsonValue::String(attrs.description.clone()),
            ),
        ];
    }

    fn open_field(&mut self, model: &FieldModel) {
        self.reset(
            SettingsTarget::Field(model.id),
            format!("{} #{}", model.kind, model.id),
        );
        let mut draft = model.clone();
        if draft.base_schema.is_empty() {
            draft.base_schema = draft.editable_schema();
        }
        self.entries = visible_entries(&draft, &[]);
        self.draft = Some(draft);
    }

    /// Re-derive the schema from the pending values and show the entries it
    /// enables, keeping values already entered.
    fn refresh_entries(&mut self) {
        let Some(draft) = self.draft.as_mut() else {
            return;
        };
        for e in &self.entries {
            draft.attributes.insert(e.key.clone(), e.value.clone());
        }
        draft.sync_derived_schema();
        let selected_key = self.entries.get(self.selected).map(|e| e.key.clone());
        let entries = visible_entries(draft, &self.entries);
        self.selected = selected_key
            .and_then(|k| entries.iter().position(|e| e.key == k))
            .unwrap_or(0)
            .min(entries.len().saturating_sub(1));
        self.entries = entries;
    }

    fn reset(&mut self, target: SettingsTarget, title: String) {
        *self = SettingsState {
            target: Some(target),
            title,
            ..Default::default()
        };
    }

    fn close(&mut self) -> Option<SettingsTarget> {
        let target = self.target.take();
        *self = SettingsState::default();
        target
    }

    fn begin_edit(&mut self) {
        let Some(entry) = self.entries.get_mut(self.selected) else {
            return;
        };
        if entry.kind == EntryKind::Checkbox {
            let on = entry.value.as_bool().unwrap_or(false);
            entry.value = JsonValue::Bool(!on);
            self.refresh_entries();
            return;
        }
        let mut ta = TextArea::default();
        ta.insert_str(value_text(&entry.value));
        self.editor = Some(ta);
        self.message = None;
    }

    fn finish_edit(&mut self) -> Result<(), String> {
        let Some(ta) = self.editor.as_ref() else {
            return Ok(());
        };
        let text = ta.lines().join("");
        let Some(entry) = self.entries.get_mut(self.selected) else {
            self.editor = None;
            return Ok(());
        };
        entry.value = match entry.kind {
            EntryKind::Number => parse_number(&text)
                .ok_or_else(|| format!("{} must be a number", entry.title))?,
            _ => JsonValue::String(text),
        };
        self.editor = None;
        Ok(())
    }
}

fn visible_entries(model: &FieldModel, previous: &[Entry]) -> Vec<Entry> {
    model
        .editable_schema()
        .iter()
        // an explicitly empty class hides the editor (e.g. precision of an integer field)
        .filter(|(_, desc)| desc.get("fieldClass").and_then(|c| c.as_str()) != Some(""))
        .map(|(key, desc)| {
            if let Some(e) = previous.iter().find(|e| e.key == *key) {
                return e.clone();
            }
            let title = desc.get("title").and_then(|t| t.as_str()).unwrap_or(key);
            let value = model.attr(key).cloned().unwrap_or(JsonValue::Null);
            Entry::new(key, title, EntryKind::from_descriptor(desc), value)
        })
        .collect()
}

fn parse_number(text: &str) -> Option<JsonValue> {
    let t = text.trim();
    if let Ok(i) = t.parse::<i64>() {
        return Some(JsonValue::from(i));
    }
    t.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(JsonValue::from)
}

pub struct SettingsView {
    bus: ChannelBus,
    state: Rc<RefCell<SettingsState>>,
    _subs: Vec<Subscription>,
}

impl SettingsView {
    pub fn new(bus: &ChannelBus) -> Self {
        let state = Rc::new(RefCell::new(SettingsState::default()));
        let mut subs = Vec::new();

        let st = Rc::downgrade(&state);
        subs.push(bus.on(Channel::Form, events::DISPLAY_SETTINGS, move |p| {
            if let (Some(st), Payload::Attributes(a)) = (st.upgrade(), p) {
                st.borrow_mut().open_form(a);
            }
        }));

        let st = Rc::downgrade(&state);
        subs.push(bus.on(Channel::Form, events::EDIT_MODEL, move |p| {
            if let (Some(st), Payload::Field(m)) = (st.upgrade(), p) {
                st.borrow_mut().open_field(m);
            }
        }));

        Self {
            bus: bus.clone(),
            state,
            _subs: subs,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().target.is_some()
    }

    pub fn target(&self) -> Option<SettingsTarget> {
        self.state.borrow().target
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state.borrow().entries.clone()
    }

    pub fn is_editing_entry(&self) -> bool {
        self.state.borrow().editor.is_some()
    }

    /// Publish the edited values and close.
    pub fn commit(&self) -> Vec<Effect> {
        let (target, entries) = {
            let mut st = self.state.borrow_mut();
            if let Err(msg) = st.finish_edit() {
                st.message = Some(msg.clone());
                return vec![Effect::error(msg)];
            }
            let entries = std::mem::take(&mut st.entries);
            (st.close(), entries)
        };
        match target {
            Some(SettingsTarget::Form) => {
                let text = |k: &str| {
                    entries
                        .iter()
                        .find(|e| e.key == k)
                        .map(|e| value_text(&e.value))
                        .unwrap_or_default()
                };
                let attrs = FormAttributes {
                    name: text("name"),
                    description: text("description"),
                };
                self.bus
                    .publish(Channel::Edition, events::EDITION_DONE, Payload::Attributes(attrs));
                self.bus
                    .publish(Channel::Edition, events::FORM_COMMIT, Payload::Empty);
            }
            Some(SettingsTarget::Field(id)) => {
                let attributes: Map<String, JsonValue> = entries
                    .into_iter()
                    .filter(Entry::changed)
                    .map(|e| (e.key, e.value))
                    .collect();
                self.bus.publish(
                    Channel::Edition,
                    events::FORM_COMMIT,
                    Payload::FieldEdit { id, attributes },
                );
            }
            None => {}
        }
        Vec::new()
    }

    /// Drop the edits and close.
    pub fn cancel(&self) {
        let was_open = self.state.borrow_mut().close().is_some();
        if was_open {
            self.bus
                .publish(Channel::Edition, events::FORM_CANCEL, Payload::Empty);
        }
    }
}

impl super::Widget for SettingsView {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let mut st = self.state.borrow_mut();
        let title = format!(" Settings: {} ", st.title);
        let block = panel_block(title, focused);
        let inner = block.inner(area);
        f.render_widget(block, area);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(2)])
            .split(inner);

        let items: Vec<ListItem> = st
            .entries
            .iter()
            .map(|e| {
                let value = match e.kind {
                    EntryKind::Checkbox => {
                        if e.value.as_bool().unwrap_or(false) {
                            "[x]".to_string()
                        } else {
                            "[ ]".to_string()
                        }
                    }
                    _ => value_text(&e.value),
                };
                let marker = if e.changed() { "*" } else { " " };
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{marker}{}: ", e.title), crate::theme::text_muted()),
                    Span::raw(value),
                ]))
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(st.selected));
        let list = List::new(items).highlight_style(crate::theme::list_cursor_style());
        f.render_stateful_widget(list, rows[0], &mut list_state);

        let help = match &st.message {
            Some(msg) => Line::styled(msg.clone(), crate::theme::text_error()),
            None => Line::styled(
                "Enter edit/toggle • s save • Esc cancel",
                crate::theme::text_muted(),
            ),
        };
        f.render_widget(Paragraph::new(help), rows[1]);

        if let Some(ta) = st.editor.as_mut() {
            ta.set_block(panel_block(" Enter apply • Esc discard ", true));
            let rect = centered_rect(90, 40, area);
            f.render_widget(Clear, rect);
            f.render_widget(&*ta, rect);
        }
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        if self.is_editing_entry() {
            let mut st = self.state.borrow_mut();
            match key {
                KeyCode::Enter => {
                    if let Err(msg) = st.finish_edit() {
                        st.message = Some(msg.clone());
                        return vec![Effect::error(msg)];
                    }
                }
                KeyCode::Esc => st.editor = None,
                other => {
                    if let (Some(ev), Some(ta)) = (textarea_key(other), st.editor.as_mut()) {
                        let _ = ta.input(ev);
                    }
                }
            }
            return Vec::new();
        }
        match key {
            KeyCode::Up => {
                let mut st = self.state.borrow_mut();
                st.selected = st.selected.saturating_sub(1);
            }
            KeyCode::Down => {
                let mut st = self.state.borrow_mut();
                if st.selected + 1 < st.entries.len() {
                    st.selected += 1;
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.state.borrow_mut().begin_edit(),
            KeyCode::Char('s') => return self.commit(),
            KeyCode::Esc => self.cancel(),
            _ => {}
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;
    use crate::widgets::Widget;
    use serde_json::json;

    fn record(bus: &ChannelBus, event: &str) -> (Rc<RefCell<Vec<Payload>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let sub = bus.on(Channel::Edition, event, move |p| sink.borrow_mut().push(p.clone()));
        (seen, sub)
    }

    fn numeric_model() -> FieldModel {
        let mut m = FieldModel::new("Numeric");
        m.id = 3;
        m.attributes = FieldType::Numeric.default_attributes();
        m.base_schema = FieldType::Numeric.base_schema();
        m
    }

    #[test]
    fn field_edit_commits_only_changed_attributes() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        let (commits, _sub) = record(&bus, events::FORM_COMMIT);
        bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(numeric_model()));
        assert_eq!(view.target(), Some(SettingsTarget::Field(3)));
        // precision stays hidden while decimal is off
        let keys: Vec<String> = view.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(keys[0], "decimal");
        assert!(!keys.contains(&"precision".to_string()));

        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('s'));
        assert!(!view.is_open());
        match commits.borrow().as_slice() {
            [Payload::FieldEdit { id, attributes }] => {
                assert_eq!(*id, 3);
                assert_eq!(attributes.get("decimal"), Some(&json!(true)));
                assert_eq!(attributes.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    #[test]
    fn toggling_decimal_shows_and_hides_precision_in_place() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        let (commits, _sub) = record(&bus, events::FORM_COMMIT);
        bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(numeric_model()));
        let keys = |v: &SettingsView| -> Vec<String> {
            v.entries().into_iter().map(|e| e.key).collect()
        };
        assert!(!keys(&view).contains(&"precision".to_string()));

        view.on_key(KeyCode::Enter);
        assert!(keys(&view).contains(&"precision".to_string()));
        assert_eq!(view.entries()[0].key, "decimal");
        assert_eq!(view.entries()[0].value, json!(true));

        let precision = keys(&view).iter().position(|k| k == "precision").unwrap();
        for _ in 0..precision {
            view.on_key(KeyCode::Down);
        }
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Backspace);
        view.on_key(KeyCode::Char('4'));
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('s'));
        match commits.borrow().as_slice() {
            [Payload::FieldEdit { attributes, .. }] => {
                assert_eq!(attributes.get("decimal"), Some(&json!(true)));
                assert_eq!(attributes.get("precision"), Some(&json!(4)));
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    #[test]
    fn turning_decimal_off_again_hides_precision() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(numeric_model()));
        view.on_key(KeyCode::Enter);
        assert!(view.entries().iter().any(|e| e.key == "precision"));
        view.on_key(KeyCode::Enter);
        assert!(view.entries().iter().all(|e| e.key != "precision"));
        assert_eq!(view.entries()[0].value, json!(false));
        assert!(!view.entries()[0].changed());
    }

    #[test]
    fn number_entries_are_validated() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        let (commits, _sub) = record(&bus, events::FORM_COMMIT);
        bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(numeric_model()));
        view.on_key(KeyCode::Down);
        view.on_key(KeyCode::Down);
        assert_eq!(view.entries()[2].key, "maxValue");
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('x'));
        let effects = view.on_key(KeyCode::Enter);
        assert!(matches!(effects.as_slice(), [Effect::Notify { .. }]));
        assert!(view.is_editing_entry());
        view.on_key(KeyCode::Backspace);
        view.on_key(KeyCode::Char('0'));
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('s'));
        match commits.borrow().as_slice() {
            [Payload::FieldEdit { attributes, .. }] => {
                assert_eq!(attributes.get("maxValue"), Some(&json!(1000)));
            }
            other => panic!("unexpected {other:?}"),
        };
    }

    #[test]
    fn form_edit_publishes_edition_done_then_commit() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        let (done, _a) = record(&bus, events::EDITION_DONE);
        let (commits, _b) = record(&bus, events::FORM_COMMIT);
        bus.publish(
            Channel::Form,
            events::DISPLAY_SETTINGS,
            Payload::Attributes(FormAttributes {
                name: "Survey".into(),
                description: String::new(),
            }),
        );
        view.on_key(KeyCode::Down);
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('h'));
        view.on_key(KeyCode::Char('i'));
        view.on_key(KeyCode::Enter);
        view.on_key(KeyCode::Char('s'));
        match done.borrow().as_slice() {
            [Payload::Attributes(a)] => {
                assert_eq!(a.name, "Survey");
                assert_eq!(a.description, "hi");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(commits.borrow().as_slice(), [Payload::Empty]));
    }

    #[test]
    fn escape_cancels_and_publishes_form_cancel() {
        let bus = ChannelBus::new();
        let mut view = SettingsView::new(&bus);
        let (cancels, _sub) = record(&bus, events::FORM_CANCEL);
        bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(numeric_model()));
        view.on_key(KeyCode::Esc);
        assert!(!view.is_open());
        assert_eq!(cancels.borrow().len(), 1);
        view.cancel();
        assert_eq!(cancels.borrow().len(), 1);
    }
}
