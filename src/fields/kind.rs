use serde_json::{json, Map, Value as JsonValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    TextArea,
    Numeric,
    Checkbox,
    HorizontalLine,
    Thesaurus,
    Fieldset,
}

impl FieldType {
    pub const ALL: [FieldType; 7] = [
        FieldType::Text,
        FieldType::TextArea,
        FieldType::Numeric,
        FieldType::Checkbox,
        FieldType::HorizontalLine,
        FieldType::Thesaurus,
        FieldType::Fieldset,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::TextArea => "TextArea",
            FieldType::Numeric => "Numeric",
            FieldType::Checkbox => "Checkbox",
            FieldType::HorizontalLine => "HorizontalLine",
            FieldType::Thesaurus => "Thesaurus",
            FieldType::Fieldset => "Fieldset",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::TextArea => "Text area",
            FieldType::Numeric => "Number",
            FieldType::Checkbox => "Checkbox",
            FieldType::HorizontalLine => "Horizontal line",
            FieldType::Thesaurus => "Thesaurus",
            FieldType::Fieldset => "Fieldset",
        }
    }

    /// Lookup by a tag already passed through `normalize_tag`.
    pub fn from_normalized(norm: &str) -> Option<Self> {
        Some(match norm {
            "text" => FieldType::Text,
            "textarea" => FieldType::TextArea,
            "numeric" => FieldType::Numeric,
            "checkbox" => FieldType::Checkbox,
            "horizontalline" => FieldType::HorizontalLine,
            "thesaurus" => FieldType::Thesaurus,
            "fieldset" => FieldType::Fieldset,
            _ => return None
        })
    }

    pub fn default_attributes(self) -> Map<String, JsonValue> {
        let v = match self {
            FieldType::Text => json!({
                "label": "Text field",
                "required": false,
                "defaultValue": "",
                "maxLength": 255
            }),
            FieldType::TextArea => json!({
                "label": "Text area",
                "required": false,
                "defaultValue": "",
                "rows": 3
            }),
            FieldType::Numeric => json!({
                "label": "Numeric field",
                "required": false,
                "minValue": 0,
                "maxValue": 100,
                "decimal": false,
                "precision": 2,
                "unity": ""
            }),
            FieldType::Checkbox => json!({
                "label": "Checkbox",
                "defaultValue": false
            }),
            FieldType::HorizontalLine => json!({}),
            FieldType::Thesaurus => json!({
                "label": "Thesaurus",
                "webServiceURL": "",
                "defaultNode": ""
            }),
            FieldType::Fieldset => json!({
                "legend": "Fieldset"
            }),
        };
        into_map(v)
    }

    /// Editor descriptors for the settings pane, one per editable attribute.
    pub fn base_schema(self) -> Map<String, JsonValue> {
        let v = match self {
            FieldType::Text => json!({
                "label": editor("Text", "Label"),
                "required": editor("Checkbox", "Required"),
                "defaultValue": editor("Text", "Default value"),
                "maxLength": editor("Number", "Max length")
            }),
            FieldType::TextArea => json!({
                "label": editor("Text", "Label"),
                "required": editor("Checkbox", "Required"),
                "defaultValue": editor("Text", "Default value"),
                "rows": editor("Number", "Rows")
            }),
            FieldType::Numeric => json!({
                "label": editor("Text", "Label"),
                "required": editor("Checkbox", "Required"),
                "minValue": editor("Number", "Minimum"),
                "maxValue": editor("Number", "Maximum"),
                "decimal": editor("Checkbox", "Decimal"),
                "precision": {"type": "Number", "title": "Precision", "fieldClass": ""},
                "unity": editor("Text", "Unit")
            }),
            FieldType::Checkbox => json!({
                "label": editor("Text", "Label"),
                "defaultValue": editor("Checkbox", "Checked by default")
            }),
            FieldType::HorizontalLine => json!({}),
            FieldType::Thesaurus => json!({
                "label": editor("Text", "Label"),
                "webServiceURL": editor("Text", "Web service URL"),
                "defaultNode": editor("Text", "Default node")
            }),
            FieldType::Fieldset => json!({
                "legend": editor("Text", "Legend")
            }),
        };
        into_map(v)
    }
}

fn editor(kind: &str, title: &str) -> JsonValue {
    json!({"type": kind, "title": title})
}

fn into_map(v: JsonValue) -> Map<String, JsonValue> {
    match v {
        JsonValue::Object(m) => m,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_schema_entry_has_a_default_value() {
        for ft in FieldType::ALL {
            let defaults = ft.default_attributes();
            for key in ft.base_schema().keys() {
                assert!(defaults.contains_key(key), "{} lacks default for {key}", ft.tag());
            }
        }
    }

    #[test]
    fn tags_round_trip_through_normalized_lookup() {
        for ft in FieldType::ALL {
            let norm = crate::builder_core::registry::normalize_tag(ft.tag());
            assert_eq!(FieldType::from_normalized(&norm), Some(ft));
        }
    }
}
