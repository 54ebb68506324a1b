use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::answers::{StepAnswers, ValidationError};
use crate::spec::field::FieldDefinition;
use crate::spec::step::StepDefinition;

/// Checks a present answer against the rules of one field type.
///
/// Validators report problems by appending to `errors`; they never fail.
pub trait TypeValidator: Send + Sync {
    fn validate(&self, field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>);
}

impl<F> TypeValidator for F
where
    F: Fn(&FieldDefinition, &Value, &mut Vec<ValidationError>) + Send + Sync,
{
    fn validate(&self, field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>) {
        self(field, value, errors)
    }
}

/// Type tag to validator map.
#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: BTreeMap<String, Arc<dyn TypeValidator>>,
}

impl ValidatorRegistry {
    pub fn empty() -> Self {
        Self {
            validators: BTreeMap::new(),
        }
    }

    /// `string`, `enum` and `boolean`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.insert("string", validate_string);
        registry.insert("enum", validate_enum);
        registry.insert("boolean", validate_boolean);
        registry
    }

    pub fn insert(&mut self, tag: impl Into<String>, validator: impl TypeValidator + 'static) {
        self.insert_shared(tag, Arc::new(validator));
    }

    pub fn insert_shared(&mut self, tag: impl Into<String>, validator: Arc<dyn TypeValidator>) {
        self.validators.insert(tag.into(), validator);
    }

    pub fn get(&self, tag: &str) -> Option<&Arc<dyn TypeValidator>> {
        self.validators.get(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// Copy of `self` where every entry of `overrides` replaces the same tag.
    pub fn merged(&self, overrides: &ValidatorRegistry) -> Self {
        let mut validators = self.validators.clone();
        for (tag, validator) in &overrides.validators {
            validators.insert(tag.clone(), Arc::clone(validator));
        }
        Self { validators }
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.tags()).finish()
    }
}

/// Absent, `null` and `""` all count as "not answered".
pub fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(_) => false,
    }
}

/// Validates submitted answers against the fields a step declares.
///
/// Answers for fields the step does not declare are ignored. Errors from all
/// fields are collected; a missing answer yields one error and skips the type
/// check for that field. Tags without a registered validator are accepted.
pub fn validate(
    step: &StepDefinition,
    answers: &StepAnswers,
    validators: &ValidatorRegistry,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for field in &step.fields {
        let value = answers.get(&field.name);
        let Some(value) = value.filter(|value| !is_missing(Some(value))) else {
            errors.push(ValidationError::new(
                &field.name,
                format!("'{}' is required for this step.", field.name),
            ));
            continue;
        };

        if let Some(validator) = validators.get(field.kind.as_str()) {
            validator.validate(field, value, &mut errors);
        }
    }

    errors
}

fn validate_string(field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>) {
    if !value.is_string() {
        errors.push(ValidationError::new(
            &field.name,
            format!("'{}' must be a string value.", field.name),
        ));
    }
}

fn validate_boolean(field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>) {
    let accepted = match value {
        Value::Bool(_) => true,
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0 || n == 1.0),
        _ => false,
    };
    if !accepted {
        errors.push(ValidationError::new(
            &field.name,
            format!("'{}' must be a boolean value.", field.name),
        ));
    }
}

fn validate_enum(field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>) {
    let allowed = field.allowed_values();
    if allowed.is_empty() || allowed.contains(&value) {
        return;
    }
    let listed = allowed
        .iter()
        .map(|value| display_value(value))
        .collect::<Vec<_>>()
        .join(", ");
    errors.push(ValidationError::new(
        &field.name,
        format!("'{}' must be one of: {}.", field.name, listed),
    ));
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
