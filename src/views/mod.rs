//! Field views: one per model, bound to it through a collection subscription.
//!
//! A view never mutates ordering itself. `update_index` is a request that the
//! collection turns into a renumbering.

pub mod fieldset;
pub mod horizontal_line;
pub mod input;
pub mod numeric;
pub mod orchestrator;
pub mod plugin;
pub mod templates;
pub mod thesaurus;

use crate::builder_core::bus::ChannelBus;
use crate::builder_core::listeners::Subscription;
use crate::error::FormError;
use crate::fields::{CollectionEvent, FieldCollection, FieldId, FieldModel, FieldType};
use crate::services::jobs::JobQueue;
use crate::services::view_loader::{ResolvedView, ViewLoader};
use ratatui::text::Line;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub use fieldset::FieldsetView;
pub use orchestrator::ViewOrchestrator;

pub trait FieldView {
    fn id(&self) -> FieldId;
    /// Rebuild the cached lines from the bound model.
    fn render(&mut self);
    /// Cached lines, re-rendered first when the model changed.
    fn lines(&mut self) -> Vec<Line<'static>>;
    /// Ask the collection to move this field to `index` in its level.
    fn update_index(&self, index: usize) -> bool;
    /// Detach and release listeners. Safe to call more than once.
    fn remove_view(&mut self);
    fn is_removed(&self) -> bool;
    fn as_fieldset(&self) -> Option<&FieldsetView> {
        None
    }
    fn as_fieldset_mut(&mut self) -> Option<&mut FieldsetView> {
        None
    }
}

pub type ViewHandle = Rc<RefCell<Box<dyn FieldView>>>;

pub fn handle(view: Box<dyn FieldView>) -> ViewHandle {
    Rc::new(RefCell::new(view))
}

/// A detached view travelling between orchestrators on `viewDropped:<scope>`.
/// Whoever takes it first owns it.
#[derive(Clone)]
pub struct ViewHandoff {
    field_id: FieldId,
    view: Rc<RefCell<Option<ViewHandle>>>,
}

impl ViewHandoff {
    pub fn new(field_id: FieldId, view: ViewHandle) -> Self {
        Self {
            field_id,
            view: Rc::new(RefCell::new(Some(view))),
        }
    }

    /// Hand a taken view back, e.g. when adoption failed.
    pub fn restore(&self, view: ViewHandle) {
        *self.view.borrow_mut() = Some(view);
    }

    pub fn field_id(&self) -> FieldId {
        self.field_id
    }

    pub fn take(&self) -> Option<ViewHandle> {
        self.view.borrow_mut().take()
    }

    pub fn is_claimed(&self) -> bool {
        self.view.borrow().is_none()
    }
}

impl std::fmt::Debug for ViewHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandoff")
            .field("field_id", &self.field_id)
            .field("claimed", &self.is_claimed())
            .finish()
    }
}

/// View-layer failures waiting to be shown to the user.
pub type ErrorSink = Rc<RefCell<Vec<FormError>>>;

/// What every view needs from the session.
#[derive(Clone)]
pub struct ViewDeps {
    pub bus: ChannelBus,
    pub collection: FieldCollection,
    pub loader: ViewLoader,
    pub jobs: JobQueue,
    pub thesaurus_cmd: String,
    pub errors: ErrorSink,
}

impl ViewDeps {
    pub fn report(&self, err: FormError) {
        log::warn!("{err}");
        self.errors.borrow_mut().push(err);
    }
}

/// Shared plumbing embedded in every concrete view: the model subscription,
/// the dirty flag and the render cache.
pub struct ViewBinding {
    id: FieldId,
    collection: FieldCollection,
    dirty: Rc<Cell<bool>>,
    sub: Option<Subscription>,
    cache: Vec<Line<'static>>,
}

impl ViewBinding {
    pub fn new(id: FieldId, collection: &FieldCollection) -> Self {
        let dirty = Rc::new(Cell::new(true));
        let flag = dirty.clone();
        let sub = collection.listen(move |ev| match ev {
            CollectionEvent::Changed(m) | CollectionEvent::Moved { model: m, .. } if m.id == id => {
                flag.set(true)
            }
            CollectionEvent::Reset => flag.set(true),
            _ => {}
        });
        Self {
            id,
            collection: collection.clone(),
            dirty,
            sub: Some(sub),
            cache: Vec::new(),
        }
    }

    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn model(&self) -> Option<FieldModel> {
        self.collection.get(self.id)
    }

    pub fn collection(&self) -> &FieldCollection {
        &self.collection
    }

    pub fn dirty_flag(&self) -> Rc<Cell<bool>> {
        self.dirty.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn store(&mut self, lines: Vec<Line<'static>>) {
        self.cache = lines;
        self.dirty.set(false);
    }

    pub fn cached(&self) -> Vec<Line<'static>> {
        self.cache.clone()
    }

    pub fn update_index(&self, index: usize) -> bool {
        if self.sub.is_none() {
            return false;
        }
        self.collection.reorder(self.id, index)
    }

    /// Returns false when the binding was already released.
    pub fn release(&mut self) -> bool {
        if self.sub.take().is_none() {
            return false;
        }
        self.cache.clear();
        log::debug!("view #{}: removed", self.id);
        true
    }

    pub fn is_released(&self) -> bool {
        self.sub.is_none()
    }
}

/// Instantiate the concrete view for a resolved type.
pub fn build_view(resolved: ResolvedView, model: &FieldModel, deps: &ViewDeps) -> Box<dyn FieldView> {
    match resolved {
        ResolvedView::Builtin(FieldType::Numeric) => {
            Box::new(numeric::NumericFieldView::new(model.id, &deps.collection))
        }
        ResolvedView::Builtin(FieldType::HorizontalLine) => Box::new(
            horizontal_line::HorizontalLineFieldView::new(model.id, &deps.collection),
        ),
        ResolvedView::Builtin(FieldType::Thesaurus) => {
            Box::new(thesaurus::ThesaurusFieldView::new(model.id, deps))
        }
        ResolvedView::Builtin(FieldType::Fieldset) => Box::new(FieldsetView::new(model.id, deps)),
        ResolvedView::Builtin(ft) => Box::new(input::InputFieldView::new(model.id, ft, &deps.collection)),
        ResolvedView::Plugin(tpl) => Box::new(plugin::PluginFieldView::new(model.id, tpl, &deps.collection)),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::builder_core::registry::FieldTypeRegistry;

    pub fn deps() -> ViewDeps {
        deps_with(FieldTypeRegistry::builtin(), "true")
    }

    pub fn deps_with(registry: FieldTypeRegistry, thesaurus_cmd: &str) -> ViewDeps {
        let bus = ChannelBus::new();
        let registry = Rc::new(registry);
        let jobs = JobQueue::new();
        let collection = FieldCollection::new(bus.clone(), registry.clone(), "New form");
        ViewDeps {
            loader: ViewLoader::new(registry, jobs.clone()),
            bus,
            collection,
            jobs,
            thesaurus_cmd: thesaurus_cmd.to_string(),
            errors: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn text_of(lines: &[Line<'static>]) -> String {
        lines
            .iter()
            .map(|l| {
                l.spans
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
