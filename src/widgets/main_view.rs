//! Composition root: builds one editing session and lays out the palette,
//! the canvas and the settings pane. Panes talk to each other only through
//! the bus; this type owns them and routes keys and focus.

use super::form_panel::FormPanelView;
use super::modal::{ModalHost, Prompt};
use super::palette::PaletteView;
use super::settings::SettingsView;
use super::Widget;
use crate::app::{EditionController, Effect};
use crate::builder_core::bus::{events, Channel, ChannelBus, Payload};
use crate::builder_core::focus::{FocusPane, FocusState};
use crate::builder_core::registry::FieldTypeRegistry;
use crate::fields::{FieldCollection, FormShape};
use crate::model::BuilderConfig;
use crate::services::jobs::JobQueue;
use crate::services::transport::{FileTransport, FormTransport};
use crate::services::view_loader::ViewLoader;
use crate::ui::{Toast, ToastLevel};
use crate::views::ViewDeps;
use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Paragraph};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

const TOAST_TICKS: u64 = 25;

pub struct MainView {
    title: String,
    bus: ChannelBus,
    collection: FieldCollection,
    jobs: JobQueue,
    palette: PaletteView,
    panel: FormPanelView,
    settings: SettingsView,
    modal: Rc<ModalHost>,
    controller: EditionController,
    focus: FocusState,
    toast: Option<Toast>,
    errors_seen: usize,
    tick: u64,
    quit: bool,
}

impl MainView {
    pub fn new(cfg: &BuilderConfig) -> Self {
        let bus = ChannelBus::new();
        let registry = Rc::new(FieldTypeRegistry::from_config(cfg));
        let jobs = JobQueue::new();
        let collection = FieldCollection::new(bus.clone(), registry.clone(), &cfg.default_form_name);
        let transport: Rc<dyn FormTransport> =
            Rc::new(FileTransport::new(bus.clone(), jobs.clone(), cfg));
        collection.set_transport(transport.clone());

        let deps = ViewDeps {
            bus: bus.clone(),
            collection: collection.clone(),
            loader: ViewLoader::new(registry, jobs.clone()),
            jobs: jobs.clone(),
            thesaurus_cmd: cfg.thesaurus_cmd().to_string(),
            errors: Rc::new(RefCell::new(Vec::new())),
        };
        let modal = Rc::new(ModalHost::new());
        let prompt: Rc<dyn Prompt> = modal.clone();

        Self {
            title: cfg.title.clone().unwrap_or_else(|| "Form Builder".to_string()),
            palette: PaletteView::new(&collection),
            panel: FormPanelView::new(deps, prompt),
            settings: SettingsView::new(&bus),
            controller: EditionController::new(&bus, &collection, transport),
            modal,
            bus,
            collection,
            jobs,
            focus: FocusState::new(FocusPane::Palette),
            toast: None,
            errors_seen: 0,
            tick: 0,
            quit: false,
        }
    }

    pub fn bus(&self) -> &ChannelBus {
        &self.bus
    }

    pub fn collection(&self) -> &FieldCollection {
        &self.collection
    }

    pub fn jobs(&self) -> &JobQueue {
        &self.jobs
    }

    pub fn panel(&self) -> &FormPanelView {
        &self.panel
    }

    pub fn focus(&self) -> FocusPane {
        self.focus.pane
    }

    pub fn toast(&self) -> Option<&Toast> {
        self.toast.as_ref()
    }

    /// Error toasts shown so far; the headless summary reports it.
    pub fn errors_seen(&self) -> usize {
        self.errors_seen
    }

    pub fn quit_requested(&self) -> bool {
        self.quit || self.controller.quit_requested()
    }

    /// Read a persisted form and hand it to the panel via `form/loadForm`.
    pub fn load_form(&self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let shape = FormShape::from_json(&text)
            .with_context(|| format!("parsing {}", path.display()))?;
        log::info!("loading form from {}", path.display());
        self.bus
            .publish(Channel::Form, events::LOAD_FORM, Payload::Form(shape));
        Ok(())
    }

    pub fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        if self.modal.is_open() {
            self.modal.on_key(code);
            self.after_input();
            return;
        }
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        let effects = match code {
            KeyCode::Char('c') if ctrl => vec![Effect::Quit],
            KeyCode::Char('s') if ctrl && self.settings.is_open() => self.settings.commit(),
            KeyCode::Tab => {
                self.focus.cycle(self.settings.is_open());
                Vec::new()
            }
            _ => match self.focus.pane {
                FocusPane::Palette => self.palette.on_key(code),
                FocusPane::Canvas => self.panel.on_key(code),
                FocusPane::Settings => self.settings.on_key(code),
            },
        };
        self.run_effects(effects);
        self.after_input();
    }

    /// One loop iteration: land finished async work, surface notices, age
    /// the toast.
    pub fn tick(&mut self) {
        self.jobs.pump();
        self.after_input();
        self.tick = self.tick.wrapping_add(1);
        if self.toast.as_ref().is_some_and(|t| self.tick >= t.expires_at_tick) {
            self.toast = None;
        }
    }

    pub fn run_effects(&mut self, effects: Vec<Effect>) {
        for eff in effects {
            match eff {
                Effect::Notify { text, level } => self.show_toast(text, level),
                Effect::Focus(FocusPane::Settings) => self.focus.enter_settings(),
                Effect::Focus(pane) => self.focus.pane = pane,
                Effect::Quit => self.quit = true,
            }
        }
    }

    fn after_input(&mut self) {
        if self.settings.is_open() {
            self.focus.enter_settings();
        } else {
            self.focus.leave_settings();
        }
        for n in self.panel.take_notices() {
            self.show_toast(n.text, n.level);
        }
    }

    fn show_toast(&mut self, text: String, level: ToastLevel) {
        if level == ToastLevel::Error {
            self.errors_seen += 1;
        }
        self.toast = Some(Toast {
            text,
            level,
            expires_at_tick: self.tick + TOAST_TICKS,
        });
    }

    fn help_text(&self) -> &'static str {
        if self.modal.is_open() {
            return "y/n confirm • Enter accept • Esc cancel";
        }
        match self.focus.pane {
            FocusPane::Palette => "↑/↓ select • Enter add • Tab next pane • Ctrl+C quit",
            FocusPane::Canvas => {
                "↑/↓ select • Enter edit • f form • d delete • K/J move • >/< (un)nest • Tab next pane"
            }
            FocusPane::Settings => "↑/↓ select • Enter edit • s/Ctrl+S save • Esc cancel",
        }
    }

    pub fn draw(&mut self, f: &mut Frame) {
        let theme = crate::theme::Theme::default();
        let screen = f.area();
        f.render_widget(Block::default().style(theme.base_style()), screen);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(screen);
        f.render_widget(
            Paragraph::new(Line::styled(format!(" {}", self.title), theme.title_style())),
            rows[0],
        );

        let mut constraints = vec![Constraint::Length(24), Constraint::Min(20)];
        if self.settings.is_open() {
            constraints.push(Constraint::Percentage(40));
        }
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(rows[1]);
        let pane = self.focus.pane;
        let modal_open = self.modal.is_open();
        let tick = self.tick;
        self.palette
            .render(f, cols[0], pane == FocusPane::Palette && !modal_open, tick);
        self.panel
            .render(f, cols[1], pane == FocusPane::Canvas && !modal_open, tick);
        if let Some(area) = cols.get(2) {
            self.settings
                .render(f, *area, pane == FocusPane::Settings && !modal_open, tick);
        }

        super::status_bar::draw_status(f, rows[2], self.toast.as_ref(), self.help_text());
        self.modal.render(f, screen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Scope;

    fn session() -> MainView {
        let dir = std::env::temp_dir().join(format!("form-builder-main-{}", std::process::id()));
        let cfg = BuilderConfig {
            base_dir: dir,
            ..Default::default()
        };
        MainView::new(&cfg)
    }

    #[test]
    fn palette_enter_adds_a_field_and_canvas_shows_it_after_tick() {
        let mut mv = session();
        assert_eq!(mv.focus(), FocusPane::Palette);
        mv.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(mv.collection().len(), 1);
        assert_eq!(mv.panel().view_count(), 0);
        mv.tick();
        assert_eq!(mv.panel().view_count(), 1);
    }

    #[test]
    fn editing_a_field_moves_focus_to_settings_and_back() {
        let mut mv = session();
        mv.collection().add_type("Text", Scope::Canvas).unwrap();
        mv.tick();
        mv.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        assert_eq!(mv.focus(), FocusPane::Canvas);
        mv.handle_key(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(mv.focus(), FocusPane::Settings);
        mv.handle_key(KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(mv.focus(), FocusPane::Canvas);
    }

    #[test]
    fn exit_goes_through_the_confirmation_dialog() {
        let mut mv = session();
        mv.handle_key(KeyCode::Tab, KeyModifiers::NONE);
        mv.handle_key(KeyCode::Char('q'), KeyModifiers::NONE);
        assert!(!mv.quit_requested());
        mv.handle_key(KeyCode::Char('y'), KeyModifiers::NONE);
        assert!(mv.quit_requested());
    }

    #[test]
    fn loading_a_missing_file_is_an_error() {
        let mv = session();
        let err = mv
            .load_form(Path::new("/nonexistent/form-builder/form.json"))
            .unwrap_err();
        assert!(err.to_string().contains("reading"));
    }

    #[test]
    fn draws_every_pane() {
        use ratatui::backend::TestBackend;
        use ratatui::Terminal;

        let mut mv = session();
        let mut term = Terminal::new(TestBackend::new(100, 24)).unwrap();
        term.draw(|f| mv.draw(f)).unwrap();
        let text: String = term
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Form Builder"));
        assert!(text.contains("Fields"));
        assert!(text.contains("New form (0 fields)"));
    }
}
