pub mod collection;
pub mod kind;
pub mod model;
pub mod shape;

pub use collection::{CollectionEvent, FieldCollection};
pub use kind::FieldType;
pub use model::{FieldId, FieldModel};
pub use shape::{FormAttributes, FormShape};

/// A nesting level: the top-level canvas or the inside of one fieldset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Canvas,
    Fieldset(FieldId),
}

impl Scope {
    pub fn of(parent: Option<FieldId>) -> Self {
        match parent {
            Some(id) => Scope::Fieldset(id),
            None => Scope::Canvas,
        }
    }

    pub fn parent(self) -> Option<FieldId> {
        match self {
            Scope::Canvas => None,
            Scope::Fieldset(id) => Some(id),
        }
    }

    pub fn key(self) -> String {
        match self {
            Scope::Canvas => "canvas".to_string(),
            Scope::Fieldset(id) => id.to_string(),
        }
    }
}
