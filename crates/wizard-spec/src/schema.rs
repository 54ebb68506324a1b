use schemars::schema_for;
use serde_json::Value;

use crate::spec::definition::WizardDefinition;
use crate::state::WizardState;

/// JSON Schema describing wizard definition documents.
pub fn definition_schema() -> Value {
    serde_json::to_value(schema_for!(WizardDefinition)).unwrap_or_default()
}

/// JSON Schema describing persisted wizard state records.
pub fn state_schema() -> Value {
    serde_json::to_value(schema_for!(WizardState)).unwrap_or_default()
}
