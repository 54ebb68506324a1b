use std::collections::{BTreeMap, BTreeSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::answers::StepId;
use crate::condition::InclusionCondition;
use crate::error::SpecError;
use crate::spec::field::{FieldDefinition, FieldType};
use crate::spec::options::OptionSource;

/// One question/prompt unit of a wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepDefinition {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "required_inputs", alias = "fields")]
    pub fields: Vec<FieldDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<BTreeMap<String, Value>>")]
    pub include_if: Option<InclusionCondition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StepDefinition {
    pub fn new(id: impl Into<StepId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            fields: Vec::new(),
            include_if: None,
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_condition(mut self, condition: InclusionCondition) -> Self {
        self.include_if = Some(condition);
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Structural checks that hold for every well-formed step.
    pub fn check(&self, index: usize) -> Result<(), SpecError> {
        if self.id.trim().is_empty() {
            return Err(SpecError::EmptyStepId { index });
        }

        let mut names = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SpecError::EmptyFieldName {
                    step: self.id.clone(),
                });
            }
            if !names.insert(field.name.as_str()) {
                return Err(SpecError::DuplicateField {
                    step: self.id.clone(),
                    field: field.name.clone(),
                });
            }
            if let Some(OptionSource::Function { name, .. }) = &field.options_source
                && name.trim().is_empty()
            {
                return Err(SpecError::EmptyProviderName {
                    step: self.id.clone(),
                    field: field.name.clone(),
                });
            }
            if field.kind == FieldType::Enum
                && field.options_source.is_none()
                && field.options.is_none()
            {
                return Err(SpecError::EnumWithoutOptions {
                    step: self.id.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}
