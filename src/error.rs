//! Error taxonomy shared by the data layer and the view layer.

use crate::fields::FieldId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormError {
    /// Rejected mutation: unknown field type, unresolvable parent, reserved attribute...
    /// The collection is left unchanged.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A field view could not be loaded. The model stays in the collection.
    #[error("Could not load the view for '{tag}': {message}")]
    ViewLoad { tag: String, message: String },

    /// Save or export failed. The form stays in memory and editable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation assumed a view that does not exist (double remove, stale id).
    #[error("No view tracked for field {0}")]
    StateInconsistency(FieldId),

    /// A persisted form could not be decoded.
    #[error("Invalid form payload: {0}")]
    Payload(String),
}

impl FormError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn view_load(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ViewLoad {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for FormError {
    fn from(e: serde_json::Error) -> Self {
        Self::Payload(e.to_string())
    }
}
