//! Application-level glue: the effects widgets hand back to the main loop and
//! the controller that serves the `export` and `exit` requests.

use crate::builder_core::bus::{events, Channel, ChannelBus, Payload};
use crate::builder_core::focus::FocusPane;
use crate::builder_core::listeners::Subscription;
use crate::fields::FieldCollection;
use crate::services::transport::FormTransport;
use crate::ui::ToastLevel;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    Notify { text: String, level: ToastLevel },
    Focus(FocusPane),
    Quit,
}

impl Effect {
    pub fn error(text: impl Into<String>) -> Self {
        Effect::Notify {
            text: text.into(),
            level: ToastLevel::Error,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Effect::Notify {
            text: text.into(),
            level: ToastLevel::Info,
        }
    }
}

/// Router-side collaborator: performs exports for the panel and turns `exit`
/// into a shutdown request.
pub struct EditionController {
    quit: Rc<Cell<bool>>,
    _subs: Vec<Subscription>,
}

impl EditionController {
    pub fn new(bus: &ChannelBus, collection: &FieldCollection, transport: Rc<dyn FormTransport>) -> Self {
        let quit = Rc::new(Cell::new(false));
        let mut subs = Vec::new();

        let c = collection.clone();
        subs.push(bus.on(Channel::Form, events::EXPORT, move |p| match p {
            Payload::Text(name) if !name.trim().is_empty() => {
                log::info!("exporting '{}' as {name}", c.name());
                transport.export(c.to_shape(), name.trim());
            }
            other => log::warn!("export request without a filename: {other:?}"),
        }));

        let flag = quit.clone();
        subs.push(bus.on(Channel::Form, events::EXIT, move |_| {
            log::info!("exit requested");
            flag.set(true)
        }));

        Self { quit, _subs: subs }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.get()
    }
}
