//! The canvas pane: footer state machine, save/export/clear/exit flows and
//! keyboard drag-and-drop on top of the top-level `ViewOrchestrator`.

use super::chrome::panel_block;
use super::modal::Prompt;
use crate::app::Effect;
use crate::builder_core::bus::{events, Channel, Payload, ViewDrop};
use crate::builder_core::listeners::Subscription;
use crate::fields::{FieldId, Scope};
use crate::nav::flatten::{fieldset_above, flatten_rows, FlatRow};
use crate::services::transport::slug;
use crate::ui::ToastLevel;
use crate::views::templates::{detail, indent};
use crate::views::{ViewDeps, ViewOrchestrator};
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelMode {
    Empty,
    Populated,
    Editing,
}

/// Which footer actions are currently available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FooterActions {
    pub save: bool,
    pub export: bool,
    pub clear: bool,
    pub exit: bool,
}

impl FooterActions {
    fn for_state(editing: bool, count: usize) -> Self {
        let on = !editing && count > 1;
        Self {
            save: on,
            export: on,
            clear: on,
            exit: true,
        }
    }
}

/// User-visible, non-blocking feedback.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub text: String,
    pub level: ToastLevel,
}

#[derive(Default)]
struct PanelState {
    editing: bool,
    title: String,
    selected: usize,
    notices: Vec<Notice>,
    last_mode: Option<PanelMode>,
    renders_finished: usize,
}

struct PanelCore {
    deps: ViewDeps,
    prompt: Rc<dyn Prompt>,
    canvas: ViewOrchestrator,
    state: RefCell<PanelState>,
    subs: RefCell<Vec<Subscription>>,
}

pub struct FormPanelView {
    core: Rc<PanelCore>,
}

fn on_bus(
    core: &Rc<PanelCore>,
    channel: Channel,
    event: &str,
    handler: impl Fn(&Rc<PanelCore>, &Payload) + 'static,
) -> Subscription {
    let weak: Weak<PanelCore> = Rc::downgrade(core);
    core.deps.bus.on(channel, event, move |p| {
        if let Some(core) = weak.upgrade() {
            handler(&core, p);
        }
    })
}

impl FormPanelView {
    pub fn new(deps: ViewDeps, prompt: Rc<dyn Prompt>) -> Self {
        let canvas = ViewOrchestrator::new(Scope::Canvas, deps.clone());
        let core = Rc::new(PanelCore {
            state: RefCell::new(PanelState {
                title: deps.collection.name(),
                ..Default::default()
            }),
            deps,
            prompt,
            canvas,
            subs: RefCell::new(Vec::new()),
        });

        let mut subs = Vec::new();
        let weak = Rc::downgrade(&core);
        subs.push(core.deps.collection.listen(move |_| {
            if let Some(core) = weak.upgrade() {
                core.refresh_mode();
            }
        }));

        subs.push(on_bus(&core, Channel::Form, events::EDIT_MODEL, |core, _| {
            core.set_editing(true);
        }));
        subs.push(on_bus(&core, Channel::Form, events::EDIT_FORM, |core, _| {
            core.set_editing(true);
            let attrs = core.deps.collection.attributes();
            core.deps
                .bus
                .publish(Channel::Form, events::DISPLAY_SETTINGS, Payload::Attributes(attrs));
        }));
        subs.push(on_bus(&core, Channel::Edition, events::FORM_CANCEL, |core, _| {
            core.set_editing(false);
        }));
        subs.push(on_bus(&core, Channel::Edition, events::FORM_COMMIT, |core, p| {
            core.set_editing(false);
            if let Payload::FieldEdit { id, attributes } = p {
                if let Err(e) = core.deps.collection.update_field(*id, attributes.clone()) {
                    core.notify(e.to_string(), ToastLevel::Error);
                }
            }
        }));
        subs.push(on_bus(&core, Channel::Edition, events::EDITION_DONE, |core, p| {
            if let Payload::Attributes(a) = p {
                core.deps.collection.update_collection_attributes(a.clone());
            }
        }));
        subs.push(on_bus(&core, Channel::Form, events::UPDATE_FINISHED, |core, p| {
            if let Payload::Attributes(a) = p {
                core.state.borrow_mut().title = a.name.clone();
            }
        }));
        subs.push(on_bus(&core, Channel::Form, events::SAVE_SUCCESS, |core, p| {
            let text = p.text().unwrap_or("saved").to_string();
            core.notify(format!("Form saved: {text}"), ToastLevel::Success);
        }));
        subs.push(on_bus(&core, Channel::Form, events::SAVE_FAIL, |core, p| {
            let text = p.text().unwrap_or("unknown error").to_string();
            core.notify(format!("Save failed: {text}"), ToastLevel::Error);
        }));
        subs.push(on_bus(&core, Channel::Form, events::EXPORT_FINISHED, |core, p| {
            match p {
                Payload::Outcome(Ok(path)) => {
                    core.notify(format!("Exported to {path}"), ToastLevel::Success)
                }
                Payload::Outcome(Err(e)) => {
                    core.notify(format!("Export failed: {e}"), ToastLevel::Error)
                }
                _ => {}
            }
        }));
        subs.push(on_bus(&core, Channel::Form, events::LOAD_FORM, |core, p| {
            if let Payload::Form(shape) = p {
                core.load(shape.clone());
            }
        }));
        subs.push(on_bus(&core, Channel::Form, events::RENDER_FINISHED, |core, _| {
            core.state.borrow_mut().renders_finished += 1;
            log::debug!("canvas rendered {} views", core.canvas.view_count());
        }));
        *core.subs.borrow_mut() = subs;

        core.canvas.attach_existing();
        core.refresh_mode();
        Self { core }
    }

    pub fn canvas(&self) -> &ViewOrchestrator {
        &self.core.canvas
    }

    pub fn mode(&self) -> PanelMode {
        self.core.mode()
    }

    pub fn footer(&self) -> FooterActions {
        self.core.footer()
    }

    pub fn title(&self) -> String {
        self.core.state.borrow().title.clone()
    }

    /// Views currently attached, nested ones included.
    pub fn view_count(&self) -> usize {
        flatten_rows(&self.core.canvas).len()
    }

    pub fn renders_finished(&self) -> usize {
        self.core.state.borrow().renders_finished
    }

    pub fn rows(&self) -> Vec<FlatRow> {
        flatten_rows(&self.core.canvas)
    }

    pub fn selected_id(&self) -> Option<FieldId> {
        let rows = self.rows();
        let idx = self.core.clamped_selection(rows.len());
        rows.get(idx).map(|r| r.id)
    }

    pub fn select(&self, id: FieldId) {
        self.core.select(id);
    }

    /// Pending notices, view-layer failures included. Drains the queue.
    pub fn take_notices(&self) -> Vec<Notice> {
        let failures: Vec<Notice> = self
            .core
            .deps
            .errors
            .borrow_mut()
            .drain(..)
            .map(|e| Notice {
                text: e.to_string(),
                level: ToastLevel::Error,
            })
            .collect();
        let mut out = std::mem::take(&mut self.core.state.borrow_mut().notices);
        out.extend(failures);
        out
    }

    pub fn edit_selected(&self) {
        let Some(model) = self.selected_id().and_then(|id| self.core.deps.collection.get(id))
        else {
            return;
        };
        self.core
            .deps
            .bus
            .publish(Channel::Form, events::EDIT_MODEL, Payload::Field(model));
    }

    pub fn edit_form(&self) {
        self.core
            .deps
            .bus
            .publish(Channel::Form, events::EDIT_FORM, Payload::Empty);
    }

    pub fn request_save(&self) -> bool {
        if !self.footer().save {
            self.core.notify("Save needs at least two fields", ToastLevel::Info);
            return false;
        }
        self.core.deps.collection.save();
        true
    }

    /// Ask for a filename, then publish it for the export collaborator.
    pub fn request_export(&self) -> bool {
        if !self.footer().export {
            self.core.notify("Export needs at least two fields", ToastLevel::Info);
            return false;
        }
        let bus = self.core.deps.bus.clone();
        let suggestion = slug(&self.core.deps.collection.name());
        self.core.prompt.ask_filename(
            &suggestion,
            Box::new(move |name| match name {
                Some(name) if !name.trim().is_empty() => {
                    bus.publish(Channel::Form, events::EXPORT, Payload::Text(name))
                }
                _ => log::debug!("export cancelled"),
            }),
        );
        true
    }

    pub fn request_clear(&self) -> bool {
        if !self.footer().clear {
            return false;
        }
        let weak = Rc::downgrade(&self.core);
        self.core.prompt.confirm(
            "Remove every field from the form?",
            Box::new(move |yes| {
                if let (true, Some(core)) = (yes, weak.upgrade()) {
                    core.clear();
                }
            }),
        );
        true
    }

    pub fn request_exit(&self) {
        let weak = Rc::downgrade(&self.core);
        self.core.prompt.confirm(
            "Leave the builder? Unsaved changes are lost.",
            Box::new(move |yes| {
                if let (true, Some(core)) = (yes, weak.upgrade()) {
                    core.clear();
                    core.deps
                        .bus
                        .publish(Channel::Form, events::EXIT, Payload::Empty);
                }
            }),
        );
    }

    /// Move the selected field up or down within its level.
    pub fn shift_selected(&self, up: bool) -> bool {
        let rows = self.rows();
        let idx = self.core.clamped_selection(rows.len());
        let Some(row) = rows.get(idx) else {
            return false;
        };
        let ids = row.owner.ids();
        let Some(pos) = ids.iter().position(|x| *x == row.id) else {
            return false;
        };
        let target = if up {
            match pos.checked_sub(1) {
                Some(t) => t,
                None => return false,
            }
        } else {
            pos + 1
        };
        let moved = row.owner.drag_to(row.id, target);
        self.core.select(row.id);
        moved
    }

    /// Drop the selected field into the nearest fieldset above it.
    pub fn nest_selected(&self) {
        let rows = self.rows();
        let idx = self.core.clamped_selection(rows.len());
        let Some(row) = rows.get(idx) else {
            return;
        };
        if row.scope != Scope::Canvas {
            return;
        }
        let Some(fs) = fieldset_above(&rows, idx).filter(|fs| *fs != row.id) else {
            self.core
                .notify("No fieldset above this field", ToastLevel::Info);
            return;
        };
        self.core.drop_to(row.id, Scope::Fieldset(fs));
    }

    /// Drop the selected nested field back onto the canvas.
    pub fn unnest_selected(&self) {
        let rows = self.rows();
        let idx = self.core.clamped_selection(rows.len());
        if let Some(row) = rows.get(idx).filter(|r| r.scope != Scope::Canvas) {
            self.core.drop_to(row.id, Scope::Canvas);
        }
    }

    pub fn remove_selected(&self) {
        if let Some(id) = self.selected_id() {
            self.core.deps.collection.remove(id);
        }
    }

    fn footer_line(&self) -> Line<'static> {
        let f = self.footer();
        let item = |key: &str, label: &str, on: bool| {
            let style = if on {
                crate::theme::text_active_bold()
            } else {
                crate::theme::text_muted()
            };
            Span::styled(format!(" [{key}] {label} "), style)
        };
        Line::from(vec![
            item("s", "save", f.save),
            item("x", "export", f.export),
            item("c", "clear", f.clear),
            item("q", "exit", f.exit),
        ])
    }
}

impl PanelCore {
    fn field_count(&self) -> usize {
        self.deps.collection.len()
    }

    fn mode(&self) -> PanelMode {
        if self.state.borrow().editing {
            PanelMode::Editing
        } else if self.field_count() == 0 {
            PanelMode::Empty
        } else {
            PanelMode::Populated
        }
    }

    fn footer(&self) -> FooterActions {
        FooterActions::for_state(self.state.borrow().editing, self.field_count())
    }

    fn refresh_mode(&self) {
        let mode = self.mode();
        let previous = self.state.borrow_mut().last_mode.replace(mode);
        if previous != Some(mode) {
            log::debug!("panel mode {previous:?} -> {mode:?}");
        }
    }

    fn set_editing(&self, editing: bool) {
        self.state.borrow_mut().editing = editing;
        self.refresh_mode();
    }

    fn notify(&self, text: impl Into<String>, level: ToastLevel) {
        self.state.borrow_mut().notices.push(Notice {
            text: text.into(),
            level,
        });
    }

    fn clamped_selection(&self, len: usize) -> usize {
        let mut st = self.state.borrow_mut();
        st.selected = st.selected.min(len.saturating_sub(1));
        st.selected
    }

    fn select(&self, id: FieldId) {
        if let Some(idx) = flatten_rows(&self.canvas).iter().position(|r| r.id == id) {
            self.state.borrow_mut().selected = idx;
        }
    }

    fn drop_to(&self, id: FieldId, target: Scope) {
        self.deps.bus.publish(
            Channel::CollectionView,
            events::VIEW_DROP,
            Payload::Drop(ViewDrop {
                field_id: id,
                target,
            }),
        );
        self.select(id);
    }

    fn load(&self, shape: crate::fields::FormShape) {
        let name = shape.name.clone();
        match self.deps.collection.update_with_json(shape) {
            Ok(()) => {
                self.state.borrow_mut().title = self.deps.collection.name();
                self.notify(format!("Loaded '{name}'"), ToastLevel::Info)
            }
            Err(e) => self.notify(format!("Cannot load form: {e}"), ToastLevel::Error),
        }
    }

    /// Tear every view down, then empty the collection.
    fn clear(&self) {
        let removed = self.canvas.teardown_views();
        log::info!("cleared form: {removed} views removed");
        self.deps.collection.clear_all();
        let mut st = self.state.borrow_mut();
        st.selected = 0;
        st.title = self.deps.collection.name();
    }
}

impl super::Widget for FormPanelView {
    fn render(&mut self, f: &mut Frame, area: Rect, focused: bool, _tick: u64) {
        let rows = self.rows();
        let selected = self.core.clamped_selection(rows.len());
        let title = format!(
            " {} ({} fields{}) ",
            self.title(),
            self.core.field_count(),
            if self.mode() == PanelMode::Editing {
                ", editing"
            } else {
                ""
            }
        );
        let block = panel_block(title, focused);
        let inner = block.inner(area);
        f.render_widget(block, area);
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let mut items: Vec<ListItem> = rows
            .iter()
            .map(|row| {
                let mut view = row.view.borrow_mut();
                let is_fieldset = view.as_fieldset().is_some();
                let lines = if is_fieldset {
                    view.as_fieldset_mut()
                        .map(|fs| fs.legend_lines())
                        .unwrap_or_default()
                } else {
                    view.lines()
                };
                ListItem::new(indent(lines, row.depth * 4))
            })
            .collect();
        let pending = self.core.canvas.pending_count();
        if pending > 0 {
            items.push(ListItem::new(detail(format!("loading {pending} field(s)…"))));
        }
        if items.is_empty() {
            items.push(ListItem::new(detail(
                "No fields yet: pick one in the Fields pane and press Enter",
            )));
        }
        let mut state = ListState::default();
        if focused && !rows.is_empty() {
            state.select(Some(selected));
        }
        let list = List::new(items).highlight_style(crate::theme::list_cursor_style());
        f.render_stateful_widget(list, parts[0], &mut state);
        f.render_widget(self.footer_line(), parts[1]);
    }

    fn on_key(&mut self, key: KeyCode) -> Vec<Effect> {
        match key {
            KeyCode::Up | KeyCode::Char('k') => {
                let mut st = self.core.state.borrow_mut();
                st.selected = st.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                let len = self.rows().len();
                let mut st = self.core.state.borrow_mut();
                if st.selected + 1 < len {
                    st.selected += 1;
                }
            }
            KeyCode::Char('K') => {
                self.shift_selected(true);
            }
            KeyCode::Char('J') => {
                self.shift_selected(false);
            }
            KeyCode::Char('>') => self.nest_selected(),
            KeyCode::Char('<') => self.unnest_selected(),
            KeyCode::Enter => self.edit_selected(),
            KeyCode::Char('f') => self.edit_form(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
            KeyCode::Char('s') => {
                self.request_save();
            }
            KeyCode::Char('x') => {
                self.request_export();
            }
            KeyCode::Char('c') => {
                self.request_clear();
            }
            KeyCode::Char('q') => self.request_exit(),
            _ => {}
        }
        self.take_notices()
            .into_iter()
            .map(|n| Effect::Notify {
                text: n.text,
                level: n.level,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
