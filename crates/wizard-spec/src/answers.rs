use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier for wizard steps.
pub type StepId = String;

/// Answers submitted for a single step, keyed by field name.
pub type StepAnswers = Map<String, Value>;

/// Answers collected so far, keyed by step id.
pub type AnswerBook = BTreeMap<StepId, StepAnswers>;

/// A field-level problem found while validating submitted answers.
///
/// This is returned to the caller as data; it never aborts an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}
