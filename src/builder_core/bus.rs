//! In-process publish/subscribe bus.
//!
//! One bus is created per editing session and handed to every component that
//! needs it. Delivery is synchronous and follows registration order.

use super::listeners::{Listener, ListenerSet, Subscription};
use crate::fields::{FieldId, FieldModel, FormAttributes, FormShape, Scope};
use crate::views::ViewHandoff;
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Form,
    Edition,
    CollectionView,
}

impl Channel {
    pub fn name(self) -> &'static str {
        match self {
            Channel::Form => "form",
            Channel::Edition => "edition",
            Channel::CollectionView => "collectionView",
        }
    }
}

pub mod events {
    use crate::fields::{FieldId, Scope};

    // form
    pub const EDIT_FORM: &str = "editForm";
    pub const DISPLAY_SETTINGS: &str = "displaySettings";
    pub const SAVE_SUCCESS: &str = "save:success";
    pub const SAVE_FAIL: &str = "save:fail";
    pub const EXPORT: &str = "export";
    pub const EXPORT_FINISHED: &str = "exportFinished";
    pub const EDIT_MODEL: &str = "editModel";
    pub const UPDATE_FINISHED: &str = "updateFinished";
    pub const RENDER_FINISHED: &str = "renderFinished";
    pub const EXIT: &str = "exit";
    pub const LOAD_FORM: &str = "loadForm";

    // edition
    pub const EDITION_DONE: &str = "editionDone";
    pub const FORM_CANCEL: &str = "formCancel";
    pub const FORM_COMMIT: &str = "formCommit";

    // collectionView
    pub const VIEW_DROP: &str = "viewDrop";

    /// `nodeSelected:<fieldId>`: re-root one thesaurus field at a node key.
    pub fn node_selected(field: FieldId) -> String {
        format!("nodeSelected:{field}")
    }

    /// `viewDropped:<fieldsetId>`, or `viewDropped:canvas` for the top level.
    pub fn view_dropped(target: Scope) -> String {
        format!("viewDropped:{}", target.key())
    }
}

/// A request to move a field view to another level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewDrop {
    pub field_id: FieldId,
    pub target: Scope,
}

#[derive(Clone, Debug)]
pub enum Payload {
    Empty,
    Text(String),
    Attributes(FormAttributes),
    Field(FieldModel),
    FieldEdit {
        id: FieldId,
        attributes: Map<String, JsonValue>,
    },
    Form(FormShape),
    Drop(ViewDrop),
    Handoff(ViewHandoff),
    Outcome(Result<String, String>),
}

impl Payload {
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

pub type Handler = Listener<Payload>;

type TopicKey = (Channel, String);

#[derive(Clone, Default)]
pub struct ChannelBus {
    topics: Rc<RefCell<HashMap<TopicKey, ListenerSet<Payload>>>>,
}

impl ChannelBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn topic(&self, channel: Channel, event: &str) -> Option<ListenerSet<Payload>> {
        self.topics
            .borrow()
            .get(&(channel, event.to_string()))
            .cloned()
    }

    pub fn subscribe(&self, channel: Channel, event: &str, handler: Handler) -> Subscription {
        let set = self
            .topics
            .borrow_mut()
            .entry((channel, event.to_string()))
            .or_default()
            .clone();
        set.add(handler)
    }

    /// Convenience wrapper turning a closure into a handler.
    pub fn on(
        &self,
        channel: Channel,
        event: &str,
        handler: impl Fn(&Payload) + 'static,
    ) -> Subscription {
        self.subscribe(channel, event, Rc::new(handler))
    }

    #[allow(dead_code)]
    pub fn unsubscribe(&self, channel: Channel, event: &str, handler: &Handler) {
        if let Some(set) = self.topic(channel, event) {
            set.remove(handler);
        }
    }

    pub fn publish(&self, channel: Channel, event: &str, payload: Payload) {
        match self.topic(channel, event) {
            Some(set) => {
                let delivered = set.emit(&payload);
                log::trace!("bus {}/{event}: delivered to {delivered}", channel.name());
            }
            None => log::trace!("bus {}/{event}: no subscribers", channel.name()),
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self, channel: Channel, event: &str) -> usize {
        self.topic(channel, event).map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn delivers_in_registration_order() {
        let bus = ChannelBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let a = Rc::clone(&seen);
        let b = Rc::clone(&seen);
        let _s1 = bus.on(Channel::Form, events::EXPORT, move |p| {
            a.borrow_mut().push(format!("first:{}", p.text().unwrap_or("")))
        });
        let _s2 = bus.on(Channel::Form, events::EXPORT, move |_| {
            b.borrow_mut().push("second".to_string())
        });
        bus.publish(Channel::Form, events::EXPORT, Payload::Text("out".into()));
        assert_eq!(*seen.borrow(), vec!["first:out", "second"]);
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = ChannelBus::new();
        bus.publish(Channel::Edition, events::FORM_COMMIT, Payload::Empty);
        assert_eq!(bus.subscriber_count(Channel::Edition, events::FORM_COMMIT), 0);
    }

    #[test]
    fn topics_are_isolated_by_channel_and_name() {
        let bus = ChannelBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _s = bus.on(Channel::Form, events::EXIT, move |_| h.set(h.get() + 1));
        bus.publish(Channel::Edition, events::EXIT, Payload::Empty);
        bus.publish(Channel::Form, events::SAVE_FAIL, Payload::Empty);
        bus.publish(Channel::Form, events::EXIT, Payload::Empty);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn explicit_unsubscribe_is_idempotent() {
        let bus = ChannelBus::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let handler: Handler = Rc::new(move |_: &Payload| h.set(h.get() + 1));
        let _sub = bus.subscribe(Channel::Form, events::EDIT_FORM, Rc::clone(&handler));
        let _again = bus.subscribe(Channel::Form, events::EDIT_FORM, Rc::clone(&handler));
        bus.publish(Channel::Form, events::EDIT_FORM, Payload::Empty);
        bus.unsubscribe(Channel::Form, events::EDIT_FORM, &handler);
        bus.unsubscribe(Channel::Form, events::EDIT_FORM, &handler);
        bus.publish(Channel::Form, events::EDIT_FORM, Payload::Empty);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn handlers_can_publish_reentrantly() {
        let bus = ChannelBus::new();
        let inner = bus.clone();
        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        let _a = bus.on(Channel::Edition, events::EDITION_DONE, move |_| {
            inner.publish(Channel::Edition, events::FORM_COMMIT, Payload::Empty)
        });
        let _b = bus.on(Channel::Edition, events::FORM_COMMIT, move |_| d.set(true));
        bus.publish(Channel::Edition, events::EDITION_DONE, Payload::Empty);
        assert!(done.get());
    }

    #[test]
    fn view_dropped_names_the_target_scope() {
        assert_eq!(events::view_dropped(Scope::Fieldset(7)), "viewDropped:7");
        assert_eq!(events::view_dropped(Scope::Canvas), "viewDropped:canvas");
    }
}
