//! Company details intake form.
//!
//! Fields are a tagged variant over the supported input kinds. The JSON
//! shape is flat (`{"id": .., "type": "select", "options": [..]}`) so
//! forms persisted by other contexts deserialize unchanged.

use serde::{Deserialize, Serialize};

/// One ordered section of the company details form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSection {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
    pub order: i32,
    /// Show the section only when another field holds a given value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<SectionCondition>,
}

impl FormSection {
    /// Returns a copy with fields sorted ascending by `order`.
    ///
    /// The sort is stable: fields sharing an order keep their relative
    /// position.
    #[must_use]
    pub fn with_ordered_fields(&self) -> Self {
        let mut section = self.clone();
        section.fields.sort_by_key(|f| f.order);
        section
    }
}

/// Visibility condition for a section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCondition {
    pub field: String,
    pub value: serde_json::Value,
}

/// A single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub order: i32,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FormField {
    /// Returns the wire name of the field kind (`"text"`, `"select"`, ...).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.kind {
            FieldKind::Text { .. } => "text",
            FieldKind::Number { .. } => "number",
            FieldKind::Select { .. } => "select",
            FieldKind::Textarea { .. } => "textarea",
            FieldKind::Checkbox { .. } => "checkbox",
            FieldKind::Radio { .. } => "radio",
        }
    }
}

/// The input kind of a field and the settings that only make sense for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum FieldKind {
    Text {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<FieldValidation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<FieldValidation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<f64>,
    },
    Select {
        #[serde(default)]
        options: Vec<FieldOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    Textarea {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        validation: Option<FieldValidation>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
    Checkbox {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<bool>,
    },
    Radio {
        #[serde(default)]
        options: Vec<FieldOption>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default_value: Option<String>,
    },
}

/// A selectable value for `select` and `radio` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// Declarative constraints carried for the form renderer.
///
/// `min`/`max` are lengths for text inputs and bounds for numbers. They
/// are not enforced here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
