//! Ordered, observable set of field models: the single source of truth for
//! form structure.
//!
//! Models of every nesting level live in one vector kept in canonical order
//! (top-level fields by `order`, each fieldset followed by its own children),
//! so moves between levels are one mutation. `order` is dense per level.

use super::model::{FieldId, FieldModel};
use super::shape::{FormAttributes, FormShape};
use super::Scope;
use crate::builder_core::bus::{events, Channel, ChannelBus, Payload};
use crate::builder_core::listeners::{ListenerSet, Subscription};
use crate::builder_core::registry::{FieldTypeRegistry, ViewEntry};
use crate::error::FormError;
use crate::services::transport::FormTransport;
use serde_json::{Map, Value as JsonValue};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum CollectionEvent {
    Added(FieldModel),
    Removed(FieldModel),
    Reordered {
        parent: Option<FieldId>,
    },
    Moved {
        model: FieldModel,
        from: Scope,
        to: Scope,
    },
    Changed(FieldModel),
    AttributesChanged(FormAttributes),
    /// Contents replaced wholesale; views must render everything again.
    Reset,
    Cleared,
}

struct CollectionState {
    attributes: FormAttributes,
    default_name: String,
    models: Vec<FieldModel>,
    next_id: FieldId,
}

impl CollectionState {
    fn position(&self, id: FieldId) -> Option<usize> {
        self.models.iter().position(|m| m.id == id)
    }

    fn get(&self, id: FieldId) -> Option<&FieldModel> {
        self.models.iter().find(|m| m.id == id)
    }

    fn get_mut(&mut self, id: FieldId) -> Option<&mut FieldModel> {
        self.models.iter_mut().find(|m| m.id == id)
    }

    fn level_ids(&self, parent: Option<FieldId>) -> Vec<FieldId> {
        self.models
            .iter()
            .filter(|m| m.fieldset_id == parent)
            .map(|m| m.id)
            .collect()
    }

    fn set_orders(&mut self, ids: &[FieldId]) {
        for (i, id) in ids.iter().enumerate() {
            if let Some(m) = self.get_mut(*id) {
                m.order = i;
            }
        }
    }

    fn renumber(&mut self, parent: Option<FieldId>) {
        let ids = self.level_ids(parent);
        self.set_orders(&ids);
        self.rebuild();
    }

    /// Restore canonical order from the `order` values.
    fn rebuild(&mut self) {
        let mut all = std::mem::take(&mut self.models);
        all.sort_by_key(|m| m.order);
        let (nested, top): (Vec<FieldModel>, Vec<FieldModel>) =
            all.into_iter().partition(|m| m.fieldset_id.is_some());
        let mut out = Vec::with_capacity(top.len() + nested.len());
        for m in top {
            let id = m.id;
            out.push(m);
            out.extend(nested.iter().filter(|c| c.fieldset_id == Some(id)).cloned());
        }
        self.models = out;
    }

    fn alloc_id(&mut self) -> FieldId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_parent(&self, model: &FieldModel) -> Result<(), FormError> {
        let Some(parent) = model.fieldset_id else {
            if model.is_under_fieldset {
                return Err(FormError::validation(
                    "field is marked as nested but names no fieldset",
                ));
            }
            return Ok(());
        };
        if model.is_fieldset() {
            return Err(FormError::validation("fieldsets cannot be nested"));
        }
        match self.get(parent) {
            Some(p) if p.is_fieldset() => Ok(()),
            Some(_) => Err(FormError::validation(format!(
                "field {parent} is not a fieldset"
            ))),
            None => Err(FormError::validation(format!("unknown fieldset {parent}"))),
        }
    }
}

#[derive(Clone)]
pub struct FieldCollection {
    state: Rc<RefCell<CollectionState>>,
    listeners: ListenerSet<CollectionEvent>,
    registry: Rc<FieldTypeRegistry>,
    bus: ChannelBus,
    transport: Rc<RefCell<Option<Rc<dyn FormTransport>>>>,
}

impl FieldCollection {
    pub fn new(bus: ChannelBus, registry: Rc<FieldTypeRegistry>, default_name: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(CollectionState {
                attributes: FormAttributes {
                    name: default_name.to_string(),
                    description: String::new(),
                },
                default_name: default_name.to_string(),
                models: Vec::new(),
                next_id: 1,
            })),
            listeners: ListenerSet::new(),
            registry,
            bus,
            transport: Rc::new(RefCell::new(None)),
        }
    }

    pub fn set_transport(&self, transport: Rc<dyn FormTransport>) {
        *self.transport.borrow_mut() = Some(transport);
    }

    pub fn listen(&self, listener: impl Fn(&CollectionEvent) + 'static) -> Subscription {
        self.listeners.add(Rc::new(listener))
    }

    fn emit(&self, event: CollectionEvent) {
        self.listeners.emit(&event);
    }

    pub fn registry(&self) -> &Rc<FieldTypeRegistry> {
        &self.registry
    }

    // ----- reads ---------------------------------------------------------

    pub fn name(&self) -> String {
        self.state.borrow().attributes.name.clone()
    }

    pub fn attributes(&self) -> FormAttributes {
        self.state.borrow().attributes.clone()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().models.is_empty()
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.state.borrow().position(id).is_some()
    }

    pub fn get(&self, id: FieldId) -> Option<FieldModel> {
        self.state.borrow().get(id).cloned()
    }

    /// Every model in canonical order.
    pub fn models(&self) -> Vec<FieldModel> {
        self.state.borrow().models.clone()
    }

    /// Models of one level, in order.
    pub fn level(&self, scope: Scope) -> Vec<FieldModel> {
        let st = self.state.borrow();
        st.models
            .iter()
            .filter(|m| m.fieldset_id == scope.parent())
            .cloned()
            .collect()
    }

    pub fn level_ids(&self, scope: Scope) -> Vec<FieldId> {
        self.state.borrow().level_ids(scope.parent())
    }

    pub fn order_of(&self, id: FieldId) -> Option<usize> {
        self.state.borrow().get(id).map(|m| m.order)
    }

    pub fn to_shape(&self) -> FormShape {
        let st = self.state.borrow();
        FormShape {
            name: st.attributes.name.clone(),
            description: st.attributes.description.clone(),
            fields: st.models.clone(),
        }
    }

    fn defaults_for(&self, tag: &str) -> (Map<String, JsonValue>, Map<String, JsonValue>) {
        match self.registry.resolve(tag) {
            Some(ViewEntry::Builtin(ft)) => (ft.default_attributes(), ft.base_schema()),
            Some(ViewEntry::Plugin(p)) => (p.defaults, p.schema),
            None => (Map::new(), Map::new()),
        }
    }

    // ----- mutations -----------------------------------------------------

    /// Append `model` to the end of its level. The id is always assigned here.
    pub fn add(&self, mut model: FieldModel) -> Result<FieldId, FormError> {
        let tag = self.registry.canonical_tag(&model.kind).ok_or_else(|| {
            FormError::validation(format!("unknown field type '{}'", model.kind))
        })?;
        model.kind = tag;
        let (defaults, schema) = self.defaults_for(&model.kind);
        for (k, v) in defaults {
            model.attributes.entry(k).or_insert(v);
        }
        if model.base_schema.is_empty() {
            model.base_schema = schema;
        }
        model.sync_derived_schema();
        let added = {
            let mut st = self.state.borrow_mut();
            st.check_parent(&model)?;
            model.is_under_fieldset = model.fieldset_id.is_some();
            model.id = st.alloc_id();
            model.order = st.level_ids(model.fieldset_id).len();
            st.models.push(model.clone());
            st.rebuild();
            model
        };
        log::debug!(
            "collection: added {} #{} at {:?}/{}",
            added.kind,
            added.id,
            added.scope(),
            added.order
        );
        let id = added.id;
        self.emit(CollectionEvent::Added(added));
        Ok(id)
    }

    /// Palette helper: a fresh field of type `tag` at the end of `scope`.
    pub fn add_type(&self, tag: &str, scope: Scope) -> Result<FieldId, FormError> {
        let mut model = FieldModel::new(tag);
        if let Scope::Fieldset(parent) = scope {
            model = model.inside(parent);
        }
        self.add(model)
    }

    /// Remove a field (and, for a fieldset, its children). Unknown ids are a no-op.
    pub fn remove(&self, id: FieldId) -> Option<FieldModel> {
        let removed = {
            let mut st = self.state.borrow_mut();
            let pos = st.position(id)?;
            let model = st.models[pos].clone();
            let mut out: Vec<FieldModel> = st
                .models
                .iter()
                .filter(|m| m.fieldset_id == Some(id))
                .cloned()
                .collect();
            st.models
                .retain(|m| m.id != id && m.fieldset_id != Some(id));
            st.renumber(model.fieldset_id);
            out.push(model);
            out
        };
        for m in &removed {
            log::debug!("collection: removed {} #{}", m.kind, m.id);
            self.emit(CollectionEvent::Removed(m.clone()));
        }
        removed.last().cloned()
    }

    /// Move `id` to `index` within its own level (clamped). Returns whether
    /// anything changed.
    pub fn reorder(&self, id: FieldId, index: usize) -> bool {
        let parent = {
            let mut st = self.state.borrow_mut();
            let Some(parent) = st.get(id).map(|m| m.fieldset_id) else {
                return false;
            };
            let mut ids = st.level_ids(parent);
            let Some(from) = ids.iter().position(|x| *x == id) else {
                return false;
            };
            let to = index.min(ids.len().saturating_sub(1));
            if from == to {
                return false;
            }
            let moved = ids.remove(from);
            ids.insert(to, moved);
            st.set_orders(&ids);
            st.rebuild();
            parent
        };
        self.emit(CollectionEvent::Reordered { parent });
        true
    }

    /// Reassign a field to another level in one step. `index` defaults to the
    /// end of the target level.
    pub fn move_to(&self, id: FieldId, target: Scope, index: Option<usize>) -> Result<(), FormError> {
        let current = self
            .get(id)
            .ok_or_else(|| FormError::validation(format!("unknown field {id}")))?;
        if current.scope() == target {
            if let Some(i) = index {
                self.reorder(id, i);
            }
            return Ok(());
        }
        let (moved, from) = {
            let mut st = self.state.borrow_mut();
            if target == Scope::Fieldset(id) {
                return Err(FormError::validation("a fieldset cannot contain itself"));
            }
            let mut probe = current.clone();
            probe.fieldset_id = target.parent();
            probe.is_under_fieldset = probe.fieldset_id.is_some();
            st.check_parent(&probe)?;

            let from = current.scope();
            let mut dest = st.level_ids(target.parent());
            let at = index.unwrap_or(dest.len()).min(dest.len());
            dest.insert(at, id);
            if let Some(m) = st.get_mut(id) {
                m.fieldset_id = probe.fieldset_id;
                m.is_under_fieldset = probe.is_under_fieldset;
            }
            st.set_orders(&dest);
            let src = st.level_ids(from.parent());
            st.set_orders(&src);
            st.rebuild();
            (st.get(id).cloned(), from)
        };
        let Some(moved) = moved else {
            return Err(FormError::StateInconsistency(id));
        };
        log::debug!("collection: moved #{id} {from:?} -> {target:?}");
        self.emit(CollectionEvent::Moved {
            model: moved,
            from,
            to: target,
        });
        Ok(())
    }

    pub fn update_field(&self, id: FieldId, attrs: Map<String, JsonValue>) -> Result<(), FormError> {
        let changed = {
            let mut st = self.state.borrow_mut();
            let model = st
                .get_mut(id)
                .ok_or_else(|| FormError::validation(format!("unknown field {id}")))?;
            model.set_attributes(attrs)?;
            model.clone()
        };
        self.emit(CollectionEvent::Changed(changed));
        Ok(())
    }

    /// Merge form-level metadata; an empty name keeps the current one.
    pub fn update_collection_attributes(&self, attrs: FormAttributes) {
        let merged = {
            let mut st = self.state.borrow_mut();
            if !attrs.name.trim().is_empty() {
                st.attributes.name = attrs.name.trim().to_string();
            }
            st.attributes.description = attrs.description;
            st.attributes.clone()
        };
        self.emit(CollectionEvent::AttributesChanged(merged.clone()));
        self.bus.publish(
            Channel::Form,
            events::UPDATE_FINISHED,
            Payload::Attributes(merged),
        );
    }

    /// Replace everything from a persisted shape. The payload is validated in
    /// full first; on error the collection is untouched.
    pub fn update_with_json(&self, shape: FormShape) -> Result<(), FormError> {
        let (models, next_id) = self.prepare(shape.fields)?;
        {
            let mut st = self.state.borrow_mut();
            st.attributes = FormAttributes {
                name: if shape.name.trim().is_empty() {
                    st.default_name.clone()
                } else {
                    shape.name
                },
                description: shape.description,
            };
            st.models = models;
            st.next_id = next_id;
            st.rebuild();
            st.renumber(None);
            let fieldsets: Vec<FieldId> = st
                .models
                .iter()
                .filter(|m| m.is_fieldset())
                .map(|m| m.id)
                .collect();
            for fs in fieldsets {
                st.renumber(Some(fs));
            }
        }
        log::debug!("collection: replaced from payload ({} fields)", self.len());
        self.emit(CollectionEvent::Reset);
        Ok(())
    }

    #[cfg(test)]
    pub fn update_with_json_str(&self, text: &str) -> Result<(), FormError> {
        self.update_with_json(FormShape::from_json(text)?)
    }

    fn prepare(&self, fields: Vec<FieldModel>) -> Result<(Vec<FieldModel>, FieldId), FormError> {
        let mut seen = HashSet::new();
        let keep_ids = fields.iter().all(|f| f.id != 0 && seen.insert(f.id));
        let mut remap: HashMap<FieldId, FieldId> = HashMap::new();
        let mut out = Vec::with_capacity(fields.len());
        for (i, mut f) in fields.into_iter().enumerate() {
            f.kind = self.registry.canonical_tag(&f.kind).ok_or_else(|| {
                FormError::validation(format!("fields[{i}]: unknown field type '{}'", f.kind))
            })?;
            if !keep_ids {
                let fresh = i as FieldId + 1;
                if f.id != 0 {
                    remap.entry(f.id).or_insert(fresh);
                }
                f.id = fresh;
            }
            out.push(f);
        }
        if !keep_ids {
            for f in &mut out {
                f.fieldset_id = f.fieldset_id.and_then(|p| remap.get(&p).copied());
            }
        }
        let fieldsets: HashSet<FieldId> = out.iter().filter(|f| f.is_fieldset()).map(|f| f.id).collect();
        for (i, f) in out.iter_mut().enumerate() {
            match f.fieldset_id {
                Some(p) if !fieldsets.contains(&p) => {
                    return Err(FormError::validation(format!(
                        "fields[{i}]: fieldset {p} not found"
                    )))
                }
                Some(_) if f.is_fieldset() => {
                    return Err(FormError::validation(format!(
                        "fields[{i}]: fieldsets cannot be nested"
                    )))
                }
                None if f.is_under_fieldset => {
                    return Err(FormError::validation(format!(
                        "fields[{i}]: nested field has no fieldset"
                    )))
                }
                _ => {}
            }
            f.is_under_fieldset = f.fieldset_id.is_some();
        }
        let next_id = out.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        Ok((out, next_id))
    }

    /// Empty the form, reset its name and the id counter.
    pub fn clear_all(&self) {
        {
            let mut st = self.state.borrow_mut();
            st.attributes = FormAttributes {
                name: st.default_name.clone(),
                description: String::new(),
            };
            st.models.clear();
            st.next_id = 1;
        }
        log::debug!("collection: cleared");
        self.emit(CollectionEvent::Cleared);
    }

    /// Hand the serialized form to the transport; the outcome arrives on the
    /// `form` channel.
    pub fn save(&self) {
        let transport = self.transport.borrow().clone();
        match transport {
            Some(t) => t.save(self.to_shape()),
            None => self.bus.publish(
                Channel::Form,
                events::SAVE_FAIL,
                Payload::Text("No save transport configured".into()),
            ),
        }
    }
}
