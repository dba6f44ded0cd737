use super::model::FieldModel;
use crate::error::FormError;
use serde::{Deserialize, Serialize};

/// Form-level metadata edited from the settings pane.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormAttributes {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Persisted/exported form: `{ name, fields: [...] }`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FormShape {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldModel>,
}

impl FormShape {
    pub fn from_json(text: &str) -> Result<Self, FormError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, FormError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn attributes(&self) -> FormAttributes {
        FormAttributes {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }
}
