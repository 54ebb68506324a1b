//! Opt-in validators for wizard-specific field types.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::answers::ValidationError;
use crate::spec::field::FieldDefinition;
use crate::validate::TypeValidator;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("identifier pattern compiles")
});

const ENFORCED_SETTINGS: &[&str] = &["id", "name", "ignore"];
const BOOL_SETTINGS: &[&str] = &["ignore", "create_grid", "create_form"];

/// Looks up a validator shipped with the crate by its tag.
pub fn builtin(name: &str) -> Option<Arc<dyn TypeValidator>> {
    let validator: Arc<dyn TypeValidator> = match name {
        "string" | "enum" | "boolean" => {
            return crate::validate::ValidatorRegistry::with_defaults()
                .get(name)
                .cloned();
        }
        "identifier" => Arc::new(validate_identifier),
        "table_settings" => Arc::new(validate_table_settings),
        _ => return None,
    };
    Some(validator)
}

/// Lower-camel identifiers: a lowercase letter followed by letters and digits.
pub fn validate_identifier(
    field: &FieldDefinition,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) {
    let Some(text) = value.as_str() else {
        errors.push(ValidationError::new(
            &field.name,
            format!("'{}' must be a string value.", field.name),
        ));
        return;
    };
    if !IDENTIFIER.is_match(text) {
        errors.push(ValidationError::new(
            &field.name,
            "Name must start with a lowercase letter and contain only letters and digits, with no spaces.",
        ));
    }
}

/// Rows of per-table settings; reports only the first offending row.
pub fn validate_table_settings(
    field: &FieldDefinition,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) {
    let name = &field.name;
    let Some(rows) = value.as_array() else {
        errors.push(ValidationError::new(
            name,
            format!("'{name}' must be a list of table settings."),
        ));
        return;
    };

    for (idx, row) in rows.iter().enumerate() {
        let Some(row) = row.as_object() else {
            errors.push(ValidationError::new(
                name,
                format!("Row {idx} in '{name}' must be an object with table settings."),
            ));
            return;
        };

        let missing = ENFORCED_SETTINGS
            .iter()
            .filter(|key| !row.contains_key(**key))
            .copied()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            errors.push(ValidationError::new(
                name,
                format!(
                    "Each table setting must include: {}. Missing: {}.",
                    ENFORCED_SETTINGS.join(", "),
                    missing.join(", ")
                ),
            ));
            return;
        }

        for key in BOOL_SETTINGS {
            if let Some(flag) = row.get(*key)
                && !(flag.is_boolean() || flag.is_i64() || flag.is_u64())
            {
                errors.push(ValidationError::new(
                    name,
                    format!("'{key}' in '{name}' must be a boolean or 0/1 value."),
                ));
                return;
            }
        }
    }
}

/// A regular expression the answer must match, with the message reported otherwise.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub pattern: Regex,
    pub message: String,
}

impl PatternRule {
    pub fn new(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            message: message.into(),
        })
    }
}

/// String validator built from ordered regex rules; the first failing rule wins.
#[derive(Debug, Clone, Default)]
pub struct PatternValidator {
    rules: Vec<PatternRule>,
}

impl PatternValidator {
    pub fn new(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }
}

impl TypeValidator for PatternValidator {
    fn validate(&self, field: &FieldDefinition, value: &Value, errors: &mut Vec<ValidationError>) {
        let Some(text) = value.as_str() else {
            errors.push(ValidationError::new(
                &field.name,
                format!("'{}' must be a string value.", field.name),
            ));
            return;
        };
        if let Some(rule) = self.rules.iter().find(|rule| !rule.pattern.is_match(text)) {
            errors.push(ValidationError::new(&field.name, rule.message.clone()));
        }
    }
}
