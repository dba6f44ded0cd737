//! Modal dialogs: yes/no confirmations and the export filename prompt.

use super::chrome::{centered_rect, panel_block, textarea_key};
use crossterm::event::KeyCode;
use ratatui::prelude::*;
use ratatui::widgets::{Clear, Paragraph, Wrap};
use std::cell::RefCell;
use tui_textarea::TextArea;

/// Dialog collaborator used by the canvas flows. Answers arrive through the
/// callbacks, possibly much later.
pub trait Prompt {
    fn confirm(&self, message: &str, done: Box<dyn FnOnce(bool)>);
    fn ask_filename(&self, suggestion: &str, done: Box<dyn FnOnce(Option<String>)>);
}

enum Dialog {
    Confirm {
        message: String,
        done: Box<dyn FnOnce(bool)>,
    },
    Filename {
        input: TextArea<'static>,
        done: Box<dyn FnOnce(Option<String>)>,
    },
}

enum Answer {
    Confirm(Box<dyn FnOnce(bool)>, bool),
    Filename(Box<dyn FnOnce(Option<String>)>, Option<String>),
}

/// Terminal implementation of `Prompt`; one dialog at a time.
#[derive(Default)]
pub struct ModalHost {
    open: RefCell<Option<Dialog>>,
}

impl ModalHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.borrow().is_some()
    }

    fn replace(&self, dialog: Dialog) {
        let previous = self.open.borrow_mut().replace(dialog);
        // a new dialog dismisses the old one
        match previous {
            Some(Dialog::Confirm { done, .. }) => done(false),
            Some(Dialog::Filename { done, .. }) => done(None),
            None => {}
        }
    }

    /// Feed a key to the open dialog. Returns false when no dialog is open.
    pub fn on_key(&self, key: KeyCode) -> bool {
        let answer = {
            let mut slot = self.open.borrow_mut();
            let Some(dialog) = slot.take() else {
                return false;
            };
            match (dialog, key) {
                (Dialog::Confirm { done, .. }, KeyCode::Char('y' | 'Y') | KeyCode::Enter) => {
                    Some(Answer::Confirm(done, true))
                }
                (Dialog::Confirm { done, .. }, KeyCode::Char('n' | 'N') | KeyCode::Esc) => {
                    Some(Answer::Confirm(done, false))
                }
                (Dialog::Filename { input, done }, KeyCode::Enter) => {
                    let name = input.lines().join("").trim().to_string();
                    if name.is_empty() {
                        *slot = Some(Dialog::Filename { input, done });
                        None
                    } else {
                        Some(Answer::Filename(done, Some(name)))
                    }
                }
                (Dialog::Filename { done, .. }, KeyCode::Esc) => Some(Answer::Filename(done, None)),
                (Dialog::Filename { mut input, done }, other) => {
                    if let Some(ev) = textarea_key(other) {
                        let _ = input.input(ev);
                    }
                    *slot = Some(Dialog::Filename { input, done });
                    None
                }
                (dialog, _) => {
                    *slot = Some(dialog);
                    None
                }
            }
        };
        // callbacks run with the dialog slot released
        match answer {
            Some(Answer::Confirm(done, ok)) => done(ok),
            Some(Answer::Filename(done, name)) => done(name),
            None => {}
        }
        true
    }

    pub fn render(&self, f: &mut Frame, area: Rect) {
        let mut open = self.open.borrow_mut();
        let Some(dialog) = open.as_mut() else {
            return;
        };
        let rect = centered_rect(50, 30, area);
        f.render_widget(Clear, rect);
        match dialog {
            Dialog::Confirm { message, .. } => {
                let p = Paragraph::new(vec![
                    Line::from(message.clone()),
                    Line::from(""),
                    Line::styled("[y] yes   [n] no", crate::theme::text_muted()),
                ])
                .block(panel_block(" Confirm ", true))
                .wrap(Wrap { trim: false });
                f.render_widget(p, rect);
            }
            Dialog::Filename { input, .. } => {
                input.set_block(panel_block(" Export as (Enter to confirm, Esc to cancel) ", true));
                f.render_widget(&*input, rect);
            }
        }
    }
}

impl Prompt for ModalHost {
    fn confirm(&self, message: &str, done: Box<dyn FnOnce(bool)>) {
        self.replace(Dialog::Confirm {
            message: message.to_string(),
            done,
        });
    }

    fn ask_filename(&self, suggestion: &str, done: Box<dyn FnOnce(Option<String>)>) {
        let mut input = TextArea::default();
        input.insert_str(suggestion);
        self.replace(Dialog::Filename { input, done });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn confirm_resolves_on_yes_and_closes() {
        let host = ModalHost::new();
        let got = Rc::new(Cell::new(None));
        let sink = got.clone();
        host.confirm("Clear?", Box::new(move |ok| sink.set(Some(ok))));
        assert!(host.is_open());
        assert!(host.on_key(KeyCode::Char('x')));
        assert_eq!(got.get(), None);
        host.on_key(KeyCode::Char('y'));
        assert_eq!(got.get(), Some(true));
        assert!(!host.is_open());
        assert!(!host.on_key(KeyCode::Enter));
    }

    #[test]
    fn filename_prompt_edits_and_submits() {
        let host = ModalHost::new();
        let got = Rc::new(RefCell::new(None));
        let sink = got.clone();
        host.ask_filename("form", Box::new(move |name| *sink.borrow_mut() = Some(name)));
        for c in "-v2".chars() {
            host.on_key(KeyCode::Char(c));
        }
        host.on_key(KeyCode::Enter);
        assert_eq!(*got.borrow(), Some(Some("form-v2".to_string())));
    }

    #[test]
    fn a_new_dialog_dismisses_the_previous_one() {
        let host = ModalHost::new();
        let first = Rc::new(Cell::new(None));
        let sink = first.clone();
        host.confirm("one", Box::new(move |ok| sink.set(Some(ok))));
        host.ask_filename("", Box::new(|_| {}));
        assert_eq!(first.get(), Some(false));
        host.on_key(KeyCode::Enter);
        assert!(host.is_open());
        host.on_key(KeyCode::Esc);
        assert!(!host.is_open());
    }
}
