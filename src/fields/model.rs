use super::kind::FieldType;
use super::Scope;
use crate::error::FormError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};

pub type FieldId = u64;

/// Keys owned by the collection; attribute edits may not touch them.
pub const RESERVED_KEYS: [&str; 6] = [
    "id",
    "type",
    "order",
    "isUnderFieldset",
    "fieldsetId",
    "baseSchema",
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldModel {
    #[serde(default)]
    pub id: FieldId,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub order: usize,
    #[serde(default)]
    pub is_under_fieldset: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fieldset_id: Option<FieldId>,
    #[serde(default)]
    pub base_schema: Map<String, JsonValue>,
    // Type-specific values (label, decimal, webServiceURL, ...)
    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
}

impl FieldModel {
    /// A draft; the collection assigns `id` and `order` when it is added.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: 0,
            kind: kind.into(),
            order: 0,
            is_under_fieldset: false,
            fieldset_id: None,
            base_schema: Map::new(),
            attributes: Map::new(),
        }
    }

    pub fn inside(mut self, fieldset: FieldId) -> Self {
        self.fieldset_id = Some(fieldset);
        self.is_under_fieldset = true;
        self
    }

    #[cfg(test)]
    pub fn with_attribute(mut self, key: &str, value: JsonValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn parent(&self) -> Option<FieldId> {
        self.fieldset_id
    }

    pub fn scope(&self) -> Scope {
        Scope::of(self.fieldset_id)
    }

    pub fn is_fieldset(&self) -> bool {
        self.kind == FieldType::Fieldset.tag()
    }

    pub fn field_type(&self) -> Option<FieldType> {
        FieldType::from_normalized(&crate::builder_core::registry::normalize_tag(&self.kind))
    }

    pub fn attr(&self, key: &str) -> Option<&JsonValue> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attributes
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Caption shown on the canvas.
    pub fn title(&self) -> String {
        self.attr_str("label")
            .or_else(|| self.attr_str("legend"))
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.kind.clone())
    }

    /// Editor descriptors; a model loaded without one falls back to its type's.
    pub fn editable_schema(&self) -> Map<String, JsonValue> {
        if !self.base_schema.is_empty() {
            return self.base_schema.clone();
        }
        self.field_type()
            .map(|ft| ft.base_schema())
            .unwrap_or_default()
    }

    /// Merge `attrs` into the model. Either every key is applied or none is.
    pub fn set_attributes(&mut self, attrs: Map<String, JsonValue>) -> Result<(), FormError> {
        if let Some(bad) = attrs.keys().find(|k| RESERVED_KEYS.contains(&k.as_str())) {
            return Err(FormError::validation(format!(
                "'{bad}' cannot be edited on field {}",
                self.id
            )));
        }
        let decimal_touched = attrs.contains_key("decimal");
        for (k, v) in attrs {
            self.attributes.insert(k, v);
        }
        if decimal_touched {
            self.sync_derived_schema();
        }
        Ok(())
    }

    /// Numeric fields show their precision editor only when `decimal` is on.
    pub fn sync_derived_schema(&mut self) {
        if self.field_type() != Some(FieldType::Numeric) {
            return;
        }
        let class = if self.attr_bool("decimal") {
            "advanced"
        } else {
            ""
        };
        let entry = self
            .base_schema
            .entry("precision".to_string())
            .or_insert_with(|| json!({"type": "Number", "title": "Precision"}));
        if let Some(obj) = entry.as_object_mut() {
            obj.insert("fieldClass".to_string(), JsonValue::String(class.to_string()));
        }
    }
}
