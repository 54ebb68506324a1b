use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::spec::options::OptionSource;

/// Tag selecting the validator applied to a field's answer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Enum,
    Boolean,
    Identifier,
    TableSettings,
    /// Wizard-specific tag; validated only when a validator is registered for it.
    Custom(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Enum => "enum",
            FieldType::Boolean => "boolean",
            FieldType::Identifier => "identifier",
            FieldType::TableSettings => "table_settings",
            FieldType::Custom(tag) => tag,
        }
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag {
            "string" => FieldType::String,
            "enum" => FieldType::Enum,
            "boolean" => FieldType::Boolean,
            "identifier" => FieldType::Identifier,
            "table_settings" => FieldType::TableSettings,
            other => FieldType::Custom(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        FieldType::from(tag.as_str())
    }
}

impl From<FieldType> for String {
    fn from(kind: FieldType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single input requested by a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    #[schemars(with = "String")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options_source: Option<OptionSource>,
    /// Inline options, or the list produced by enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<Value>>,
    /// Validator-specific metadata, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, kind: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            prompt: None,
            description: None,
            options_source: None,
            options: None,
            extra: Map::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<Value>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_source(mut self, source: OptionSource) -> Self {
        self.options_source = Some(source);
        self
    }

    /// The `value` entries of object-shaped options; other shapes contribute nothing.
    pub fn allowed_values(&self) -> Vec<&Value> {
        self.options
            .iter()
            .flatten()
            .filter_map(|option| option.as_object())
            .filter_map(|option| option.get("value"))
            .collect()
    }
}
