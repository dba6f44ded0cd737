//! Keeps the views of one level (the canvas or one fieldset) in step with
//! the collection.
//!
//! Loads are asynchronous: a view appears on the `pump` after its model was
//! added. A completion is dropped when the orchestrator was torn down, the
//! load is no longer pending, the model is gone, or it left this level.

use super::{build_view, handle, ViewDeps, ViewHandle, ViewHandoff};
use crate::builder_core::bus::{events, Channel, Payload, ViewDrop};
use crate::builder_core::listeners::Subscription;
use crate::error::FormError;
use crate::fields::{CollectionEvent, FieldId, FieldModel, Scope};
use crate::services::view_loader::ResolvedView;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

struct Slot {
    id: FieldId,
    view: ViewHandle,
}

#[derive(Default)]
struct OrchState {
    slots: Vec<Slot>,
    // ticket of the newest load per id; older completions are stale
    pending: HashMap<FieldId, u64>,
    next_ticket: u64,
    torn_down: bool,
    // set by render_all until every pending load has landed
    awaiting_render: bool,
}

struct OrchestratorCore {
    scope: Scope,
    deps: ViewDeps,
    state: RefCell<OrchState>,
    subs: RefCell<Vec<Subscription>>,
}

#[derive(Clone)]
pub struct ViewOrchestrator {
    core: Rc<OrchestratorCore>,
}

impl ViewOrchestrator {
    pub fn new(scope: Scope, deps: ViewDeps) -> Self {
        let core = Rc::new(OrchestratorCore {
            scope,
            deps,
            state: RefCell::new(OrchState::default()),
            subs: RefCell::new(Vec::new()),
        });
        let mut subs = Vec::new();

        let weak = Rc::downgrade(&core);
        subs.push(core.deps.collection.listen(move |ev| {
            if let Some(core) = weak.upgrade() {
                core.on_collection(ev);
            }
        }));

        let weak = Rc::downgrade(&core);
        subs.push(core.deps.bus.on(
            Channel::CollectionView,
            events::VIEW_DROP,
            move |p| {
                if let (Some(core), Payload::Drop(req)) = (weak.upgrade(), p) {
                    core.on_view_drop(*req);
                }
            },
        ));

        let weak = Rc::downgrade(&core);
        subs.push(core.deps.bus.on(
            Channel::CollectionView,
            &events::view_dropped(scope),
            move |p| {
                if let (Some(core), Payload::Handoff(h)) = (weak.upgrade(), p) {
                    core.adopt(h);
                }
            },
        ));
        *core.subs.borrow_mut() = subs;
        Self { core }
    }

    pub fn scope(&self) -> Scope {
        self.core.scope
    }

    pub fn view_count(&self) -> usize {
        self.core.state.borrow().slots.len()
    }

    pub fn pending_count(&self) -> usize {
        self.core.state.borrow().pending.len()
    }

    #[cfg(test)]
    pub fn is_torn_down(&self) -> bool {
        self.core.state.borrow().torn_down
    }

    /// Tracked ids in display order.
    pub fn ids(&self) -> Vec<FieldId> {
        self.core.state.borrow().slots.iter().map(|s| s.id).collect()
    }

    pub fn view(&self, id: FieldId) -> Option<ViewHandle> {
        self.core.view(id)
    }

    pub fn entries(&self) -> Vec<(FieldId, ViewHandle)> {
        self.core
            .state
            .borrow()
            .slots
            .iter()
            .map(|s| (s.id, s.view.clone()))
            .collect()
    }

    /// Request views for every model of this level that has none yet.
    pub fn attach_existing(&self) {
        self.core.attach_existing();
    }

    /// Drop every view and rebuild the level from the collection.
    pub fn render_all(&self) {
        self.core.render_all();
    }

    /// Tear down every tracked view. Returns how many views were removed,
    /// nested fieldset children included.
    pub fn teardown_views(&self) -> usize {
        self.core.teardown_views()
    }

    /// Tear down and stop listening for good.
    pub fn shutdown(&self) -> usize {
        let n = self.core.teardown_views();
        self.core.state.borrow_mut().torn_down = true;
        let subs = std::mem::take(&mut *self.core.subs.borrow_mut());
        drop(subs);
        n
    }

    /// Detach and release the view for `id`. Unknown ids are a no-op.
    pub fn remove(&self, id: FieldId) -> bool {
        self.core.remove(id).is_some()
    }

    /// Move `id` to `index` in this level by asking each affected view to
    /// update its index, lowest target first.
    pub fn drag_to(&self, id: FieldId, index: usize) -> bool {
        let mut order = self.ids();
        let Some(from) = order.iter().position(|x| *x == id) else {
            return false;
        };
        let to = index.min(order.len().saturating_sub(1));
        if from == to {
            return false;
        }
        let moved = order.remove(from);
        order.insert(to, moved);
        let collection = &self.core.deps.collection;
        let mut changed = false;
        for (i, vid) in order.iter().enumerate() {
            if collection.order_of(*vid) == Some(i) {
                continue;
            }
            if let Some(view) = self.view(*vid) {
                changed |= view.borrow().update_index(i);
            }
        }
        changed
    }
}

impl OrchestratorCore {
    fn attach_existing(self: &Rc<Self>) {
        for m in self.deps.collection.level(self.scope) {
            self.request_view(&m);
        }
    }

    fn render_all(self: &Rc<Self>) {
        self.teardown_views();
        self.state.borrow_mut().awaiting_render = true;
        self.attach_existing();
        self.check_render_finished();
    }

    fn view(&self, id: FieldId) -> Option<ViewHandle> {
        self.state
            .borrow()
            .slots
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.view.clone())
    }

    fn owns(&self, m: &FieldModel) -> bool {
        m.scope() == self.scope
    }

    fn on_collection(self: &Rc<Self>, ev: &CollectionEvent) {
        if self.state.borrow().torn_down {
            return;
        }
        match ev {
            CollectionEvent::Added(m) if self.owns(m) => self.request_view(m),
            CollectionEvent::Removed(m) if self.owns(m) => {
                self.state.borrow_mut().pending.remove(&m.id);
                self.remove(m.id);
                self.check_render_finished();
            }
            CollectionEvent::Reordered { parent } if *parent == self.scope.parent() => {
                self.sort_slots()
            }
            CollectionEvent::Moved { model, from, to } => {
                if *from == self.scope && *to != self.scope {
                    // moved without a handoff: our view is stale
                    self.state.borrow_mut().pending.remove(&model.id);
                    if self.view(model.id).is_some() {
                        self.remove(model.id);
                    }
                }
                if *to == self.scope {
                    if self.view(model.id).is_some() {
                        self.sort_slots();
                    } else {
                        self.request_view(model);
                    }
                }
                if *from == self.scope {
                    self.sort_slots();
                }
            }
            CollectionEvent::Reset if self.scope == Scope::Canvas => self.render_all(),
            CollectionEvent::Cleared => {
                self.teardown_views();
            }
            _ => {}
        }
    }

    fn request_view(self: &Rc<Self>, m: &FieldModel) {
        let ticket = {
            let mut st = self.state.borrow_mut();
            if st.torn_down
                || st.pending.contains_key(&m.id)
                || st.slots.iter().any(|s| s.id == m.id)
            {
                return;
            }
            st.next_ticket += 1;
            let ticket = st.next_ticket;
            st.pending.insert(m.id, ticket);
            ticket
        };
        let weak: Weak<Self> = Rc::downgrade(self);
        let id = m.id;
        self.deps.loader.load(&m.kind, move |res| {
            if let Some(core) = weak.upgrade() {
                core.complete(id, ticket, res);
            } else {
                log::debug!("orchestrator gone, dropping view load for #{id}");
            }
        });
    }

    fn complete(
        self: &Rc<Self>,
        id: FieldId,
        ticket: u64,
        res: Result<ResolvedView, FormError>,
    ) {
        {
            let mut st = self.state.borrow_mut();
            if st.torn_down || st.pending.get(&id) != Some(&ticket) {
                log::debug!("view load #{ticket} for #{id} is no longer wanted");
                return;
            }
            st.pending.remove(&id);
        }
        let model = match self.deps.collection.get(id) {
            Some(m) if self.owns(&m) => m,
            _ => {
                log::debug!("view load for #{id} landed after the model left {:?}", self.scope);
                self.check_render_finished();
                return;
            }
        };
        match res {
            Ok(resolved) => {
                let mut view = build_view(resolved, &model, &self.deps);
                view.render();
                self.state.borrow_mut().slots.push(Slot {
                    id,
                    view: handle(view),
                });
                self.sort_slots();
                log::debug!("view for {} #{id} attached to {:?}", model.kind, self.scope);
            }
            Err(e) => self.deps.report(e),
        }
        self.check_render_finished();
    }

    fn check_render_finished(&self) {
        let done = {
            let mut st = self.state.borrow_mut();
            if st.awaiting_render && st.pending.is_empty() {
                st.awaiting_render = false;
                true
            } else {
                false
            }
        };
        if done && self.scope == Scope::Canvas {
            self.deps
                .bus
                .publish(Channel::Form, events::RENDER_FINISHED, Payload::Empty);
        }
    }

    fn sort_slots(&self) {
        let collection = &self.deps.collection;
        self.state
            .borrow_mut()
            .slots
            .sort_by_key(|s| collection.order_of(s.id).unwrap_or(usize::MAX));
    }

    fn detach(&self, id: FieldId) -> Option<ViewHandle> {
        let mut st = self.state.borrow_mut();
        let pos = st.slots.iter().position(|s| s.id == id)?;
        Some(st.slots.remove(pos).view)
    }

    fn remove(&self, id: FieldId) -> Option<usize> {
        let Some(view) = self.detach(id) else {
            log::debug!("{}", FormError::StateInconsistency(id));
            return None;
        };
        Some(release(&view))
    }

    fn teardown_views(&self) -> usize {
        let slots = {
            let mut st = self.state.borrow_mut();
            st.pending.clear();
            st.awaiting_render = false;
            std::mem::take(&mut st.slots)
        };
        slots.iter().map(|s| release(&s.view)).sum()
    }

    fn on_view_drop(self: &Rc<Self>, req: ViewDrop) {
        if self.state.borrow().torn_down || req.target == self.scope {
            return;
        }
        let Some(view) = self.view(req.field_id) else {
            return;
        };
        if let Err(e) = self.check_drop(req) {
            self.deps.report(e);
            return;
        }
        self.detach(req.field_id);
        let handoff = ViewHandoff::new(req.field_id, view);
        self.deps.bus.publish(
            Channel::CollectionView,
            &events::view_dropped(req.target),
            Payload::Handoff(handoff.clone()),
        );
        if let Some(view) = handoff.take() {
            log::debug!("no taker for #{} in {:?}; keeping it", req.field_id, req.target);
            self.state.borrow_mut().slots.push(Slot {
                id: req.field_id,
                view,
            });
            self.sort_slots();
        }
    }

    fn check_drop(&self, req: ViewDrop) -> Result<(), FormError> {
        let collection = &self.deps.collection;
        let model = collection
            .get(req.field_id)
            .ok_or(FormError::StateInconsistency(req.field_id))?;
        if let Scope::Fieldset(fs) = req.target {
            if model.is_fieldset() {
                return Err(FormError::validation("fieldsets cannot be nested"));
            }
            if !collection.get(fs).is_some_and(|m| m.is_fieldset()) {
                return Err(FormError::validation(format!("field {fs} is not a fieldset")));
            }
        }
        Ok(())
    }

    fn adopt(self: &Rc<Self>, handoff: &ViewHandoff) {
        if self.state.borrow().torn_down {
            return;
        }
        let Some(view) = handoff.take() else {
            return;
        };
        let id = handoff.field_id();
        self.state.borrow_mut().slots.push(Slot {
            id,
            view: view.clone(),
        });
        if let Err(e) = self.deps.collection.move_to(id, self.scope, None) {
            self.detach(id);
            handoff.restore(view);
            self.deps.report(e);
            return;
        }
        self.sort_slots();
    }
}

/// Release one view and report how many views went with it.
fn release(view: &ViewHandle) -> usize {
    let nested = view
        .borrow()
        .as_fieldset()
        .map(|fs| fs.children().view_count())
        .unwrap_or(0);
    view.borrow_mut().remove_view();
    1 + nested
}
