use super::*;
use crate::builder_core::registry::FieldTypeRegistry;
use crate::fields::{CollectionEvent, FieldModel, FormShape};
use crate::model::PluginSpec;
use crate::views::test_support::{deps, deps_with};
use crate::widgets::Widget;
use serde_json::{json, Map};
use std::cell::Cell;

/// Answers every dialog immediately with the scripted reply.
#[derive(Default)]
struct ScriptedPrompt {
    confirm: Cell<bool>,
    filename: RefCell<Option<String>>,
    asked: RefCell<Vec<String>>,
}

impl Prompt for ScriptedPrompt {
    fn confirm(&self, message: &str, done: Box<dyn FnOnce(bool)>) {
        self.asked.borrow_mut().push(message.to_string());
        done(self.confirm.get())
    }

    fn ask_filename(&self, suggestion: &str, done: Box<dyn FnOnce(Option<String>)>) {
        self.asked.borrow_mut().push(suggestion.to_string());
        done(self.filename.borrow().clone())
    }
}

fn panel_with(d: &ViewDeps) -> (FormPanelView, Rc<ScriptedPrompt>) {
    let prompt = Rc::new(ScriptedPrompt::default());
    (FormPanelView::new(d.clone(), prompt.clone()), prompt)
}

fn record(d: &ViewDeps, channel: Channel, event: &str) -> (Rc<RefCell<Vec<Payload>>>, Subscription) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let sub = d
        .bus
        .on(channel, event, move |p| sink.borrow_mut().push(p.clone()));
    (seen, sub)
}

fn disabled_footer() -> FooterActions {
    FooterActions {
        save: false,
        export: false,
        clear: false,
        exit: true,
    }
}

fn enabled_footer() -> FooterActions {
    FooterActions {
        save: true,
        export: true,
        clear: true,
        exit: true,
    }
}

#[test]
fn footer_follows_field_count() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    assert_eq!(panel.mode(), PanelMode::Empty);
    assert_eq!(panel.footer(), disabled_footer());

    let text = d.collection.add_type("Text", Scope::Canvas).unwrap();
    let num = d.collection.add_type("Numeric", Scope::Canvas).unwrap();
    d.jobs.pump();
    assert_eq!((text, num), (1, 2));
    assert_eq!(d.collection.len(), 2);
    assert_eq!(d.collection.order_of(text), Some(0));
    assert_eq!(d.collection.order_of(num), Some(1));
    assert_eq!(panel.footer(), enabled_footer());
    assert_eq!(panel.mode(), PanelMode::Populated);
    assert_eq!(panel.view_count(), 2);

    d.collection.remove(text);
    assert_eq!(d.collection.len(), 1);
    assert_eq!(d.collection.order_of(num), Some(0));
    assert_eq!(panel.footer(), disabled_footer());
    assert_eq!(panel.view_count(), 1);
}

#[test]
fn nested_model_is_rendered_by_its_fieldset_only() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    let fs = d.collection.add_type("Fieldset", Scope::Canvas).unwrap();
    d.jobs.pump();
    let text = d.collection.add(FieldModel::new("Text").inside(fs)).unwrap();
    d.jobs.pump();

    assert_eq!(panel.canvas().ids(), vec![fs]);
    let view = panel.canvas().view(fs).unwrap();
    let children = view
        .borrow()
        .as_fieldset()
        .map(|f| f.children().ids())
        .unwrap_or_default();
    assert_eq!(children, vec![text]);
    let rows: Vec<(FieldId, usize)> = panel.rows().iter().map(|r| (r.id, r.depth)).collect();
    assert_eq!(rows, vec![(fs, 0), (text, 1)]);
}

#[test]
fn edit_model_suspends_footer_until_commit_or_cancel() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    let a = d.collection.add_type("Text", Scope::Canvas).unwrap();
    d.collection.add_type("Checkbox", Scope::Canvas).unwrap();

    let model = d.collection.get(a).unwrap();
    d.bus
        .publish(Channel::Form, events::EDIT_MODEL, Payload::Field(model.clone()));
    assert_eq!(panel.mode(), PanelMode::Editing);
    assert_eq!(panel.footer(), disabled_footer());

    // a structural change while editing keeps the footer suspended
    d.collection.add_type("Numeric", Scope::Canvas).unwrap();
    assert_eq!(panel.footer(), disabled_footer());

    d.bus.publish(Channel::Edition, events::FORM_COMMIT, Payload::Empty);
    assert_eq!(panel.mode(), PanelMode::Populated);
    assert_eq!(panel.footer(), enabled_footer());

    d.bus.publish(Channel::Form, events::EDIT_MODEL, Payload::Field(model));
    d.bus.publish(Channel::Edition, events::FORM_CANCEL, Payload::Empty);
    assert_eq!(panel.footer(), enabled_footer());
}

#[test]
fn commit_with_field_edit_updates_the_model() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    let a = d.collection.add_type("Text", Scope::Canvas).unwrap();
    let mut attrs = Map::new();
    attrs.insert("label".into(), json!("Age"));
    d.bus.publish(
        Channel::Edition,
        events::FORM_COMMIT,
        Payload::FieldEdit { id: a, attributes: attrs },
    );
    assert_eq!(d.collection.get(a).unwrap().attr_str("label"), Some("Age"));

    let mut bad = Map::new();
    bad.insert("order".into(), json!(7));
    d.bus.publish(
        Channel::Edition,
        events::FORM_COMMIT,
        Payload::FieldEdit { id: a, attributes: bad },
    );
    let notices = panel.take_notices();
    assert!(matches!(notices.as_slice(), [Notice { level: ToastLevel::Error, .. }]));
    assert_eq!(d.collection.order_of(a), Some(0));
}

#[test]
fn form_settings_round_trip_renames_the_form() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    let (shown, _sub) = record(&d, Channel::Form, events::DISPLAY_SETTINGS);
    panel.edit_form();
    assert_eq!(panel.mode(), PanelMode::Editing);
    assert!(matches!(
        shown.borrow().as_slice(),
        [Payload::Attributes(a)] if a.name == "New form"
    ));

    d.bus.publish(
        Channel::Edition,
        events::EDITION_DONE,
        Payload::Attributes(crate::fields::FormAttributes {
            name: "Survey".into(),
            description: String::new(),
        }),
    );
    d.bus.publish(Channel::Edition, events::FORM_COMMIT, Payload::Empty);
    assert_eq!(panel.title(), "Survey");
    assert_eq!(d.collection.name(), "Survey");
    assert_eq!(panel.mode(), PanelMode::Empty);
}

#[test]
fn clear_removes_every_view_before_the_collection_empties() {
    let d = deps();
    let (panel, prompt) = panel_with(&d);
    d.collection.add_type("Text", Scope::Canvas).unwrap();
    let fs = d.collection.add_type("Fieldset", Scope::Canvas).unwrap();
    d.collection.add_type("Checkbox", Scope::Fieldset(fs)).unwrap();
    d.collection.add_type("Numeric", Scope::Canvas).unwrap();
    d.jobs.pump();
    d.jobs.pump();

    let views: Vec<_> = panel.rows().into_iter().map(|r| r.view).collect();
    assert_eq!(views.len(), 4);

    let removed_at_clear = Rc::new(Cell::new(None));
    let sink = removed_at_clear.clone();
    let watched = views.clone();
    let _sub = d.collection.listen(move |ev| {
        if *ev == CollectionEvent::Cleared {
            sink.set(Some(watched.iter().filter(|v| v.borrow().is_removed()).count()));
        }
    });

    prompt.confirm.set(false);
    assert!(panel.request_clear());
    assert_eq!(d.collection.len(), 4);
    assert_eq!(removed_at_clear.get(), None);

    prompt.confirm.set(true);
    panel.request_clear();
    assert_eq!(removed_at_clear.get(), Some(4));
    assert!(d.collection.is_empty());
    assert_eq!(panel.view_count(), 0);
    assert_eq!(panel.mode(), PanelMode::Empty);
}

#[test]
fn export_publishes_the_chosen_filename_and_reports_the_outcome() {
    let d = deps();
    let (panel, prompt) = panel_with(&d);
    let (exports, _sub) = record(&d, Channel::Form, events::EXPORT);

    d.collection.add_type("Text", Scope::Canvas).unwrap();
    assert!(!panel.request_export());
    assert!(exports.borrow().is_empty());

    d.collection.add_type("Text", Scope::Canvas).unwrap();
    *prompt.filename.borrow_mut() = Some("survey".into());
    assert!(panel.request_export());
    assert_eq!(prompt.asked.borrow().last().map(String::as_str), Some("new-form"));
    assert!(matches!(exports.borrow().as_slice(), [Payload::Text(n)] if n == "survey"));

    panel.take_notices();
    d.bus.publish(
        Channel::Form,
        events::EXPORT_FINISHED,
        Payload::Outcome(Err("disk full".into())),
    );
    let notices = panel.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, ToastLevel::Error);
    assert!(notices[0].text.contains("disk full"));
}

#[test]
fn exit_resets_the_form_then_publishes_exit() {
    let d = deps();
    let (panel, prompt) = panel_with(&d);
    let (exits, _sub) = record(&d, Channel::Form, events::EXIT);
    d.collection.add_type("Text", Scope::Canvas).unwrap();
    d.jobs.pump();

    prompt.confirm.set(false);
    panel.request_exit();
    assert!(exits.borrow().is_empty());
    assert_eq!(panel.view_count(), 1);

    prompt.confirm.set(true);
    panel.request_exit();
    assert_eq!(exits.borrow().len(), 1);
    assert!(d.collection.is_empty());
    assert_eq!(panel.view_count(), 0);
    assert!(panel.footer().exit);
}

#[test]
fn load_form_replaces_content_and_signals_render_finished() {
    let d = deps();
    let (panel, _) = panel_with(&d);
    d.collection.add_type("Checkbox", Scope::Canvas).unwrap();
    d.jobs.pump();
    let (finished, _sub) = record(&d, Channel::Form, events::RENDER_FINISHED);

    let shape: FormShape = serde_json::from_value(json!({
        "name": "Intake",
        "fields": [
            {"id": 4, "type": "Text", "order": 0, "isUnderFieldset": false, "label": "Name"},
            {"id": 9, "type": "Numeric", "order": 1, "isUnderFieldset": false}
        ]
    }))
    .unwrap();
    d.bus.publish(Channel::Form, events::LOAD_FORM, Payload::Form(shape));
    assert!(finished.borrow().is_empty());
    d.jobs.pump();

    assert_eq!(panel.canvas().ids(), vec![4, 9]);
    assert_eq!(finished.borrow().len(), 1);
    assert_eq!(panel.renders_finished(), 1);
    assert_eq!(panel.title(), "Intake");
}

#[test]
fn keys_nest_and_unnest_the_selected_field() {
    let d = deps();
    let (mut panel, _) = panel_with(&d);
    let fs = d.collection.add_type("Fieldset", Scope::Canvas).unwrap();
    let text = d.collection.add_type("Text", Scope::Canvas).unwrap();
    d.jobs.pump();

    panel.on_key(KeyCode::Down);
    assert_eq!(panel.selected_id(), Some(text));
    panel.on_key(KeyCode::Char('>'));
    let model = d.collection.get(text).unwrap();
    assert_eq!(model.fieldset_id, Some(fs));
    assert_eq!(panel.canvas().ids(), vec![fs]);
    assert_eq!(panel.selected_id(), Some(text));

    panel.on_key(KeyCode::Char('<'));
    assert_eq!(d.collection.get(text).unwrap().scope(), Scope::Canvas);
    assert_eq!(panel.canvas().ids(), vec![fs, text]);
}

#[test]
fn shift_keys_reorder_within_the_level() {
    let d = deps();
    let (mut panel, _) = panel_with(&d);
    let a = d.collection.add_type("Text", Scope::Canvas).unwrap();
    let b = d.collection.add_type("Numeric", Scope::Canvas).unwrap();
    let c = d.collection.add_type("Checkbox", Scope::Canvas).unwrap();
    d.jobs.pump();

    panel.select(c);
    panel.on_key(KeyCode::Char('K'));
    assert_eq!(panel.canvas().ids(), vec![a, c, b]);
    assert_eq!(d.collection.order_of(c), Some(1));
    assert_eq!(panel.selected_id(), Some(c));

    panel.on_key(KeyCode::Char('J'));
    panel.on_key(KeyCode::Char('J'));
    assert_eq!(panel.canvas().ids(), vec![a, b, c]);
}

#[test]
fn view_load_failures_surface_as_error_notices() {
    let reg = FieldTypeRegistry::builtin().with_plugin(PluginSpec {
        tag: "Signature".into(),
        template: "/nonexistent/form-builder/signature.yaml".into(),
        ..Default::default()
    });
    let d = deps_with(reg, "true");
    let (panel, _) = panel_with(&d);
    let id = d.collection.add_type("Signature", Scope::Canvas).unwrap();
    assert!(d.jobs.wait_idle(std::time::Duration::from_secs(5)));

    let notices = panel.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, ToastLevel::Error);
    assert!(d.collection.contains(id));
    assert!(panel.take_notices().is_empty());
}

#[test]
fn draws_rows_and_footer() {
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    let d = deps();
    let (mut panel, _) = panel_with(&d);
    d.collection.add_type("Text", Scope::Canvas).unwrap();
    d.collection.add_type("Numeric", Scope::Canvas).unwrap();
    d.jobs.pump();

    let mut term = Terminal::new(TestBackend::new(60, 14)).unwrap();
    term.draw(|f| panel.render(f, f.area(), true, 0)).unwrap();
    let buf = term.backend().buffer().clone();
    let text: String = buf.content().iter().map(|c| c.symbol()).collect();
    assert!(text.contains("New form (2 fields)"));
    assert!(text.contains("[x] export"));
}
