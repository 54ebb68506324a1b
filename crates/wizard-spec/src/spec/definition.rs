use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SpecError;
use crate::spec::step::StepDefinition;

/// Top-level wizard definition document: an ordered list of steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct WizardDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
}

impl WizardDefinition {
    pub fn from_json_str(raw: &str) -> Result<Self, SpecError> {
        let definition: Self = serde_json::from_str(raw)?;
        definition.check()?;
        Ok(definition)
    }

    pub fn from_value(value: Value) -> Result<Self, SpecError> {
        let definition: Self = serde_json::from_value(value)?;
        definition.check()?;
        Ok(definition)
    }

    pub fn check(&self) -> Result<(), SpecError> {
        let mut ids = BTreeSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            step.check(index)?;
            if !ids.insert(step.id.as_str()) {
                return Err(SpecError::DuplicateStep(step.id.clone()));
            }
        }
        Ok(())
    }
}
