use thiserror::Error;

/// Problems found while loading a wizard definition.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read definition: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("step at position {index} has an empty id")]
    EmptyStepId { index: usize },
    #[error("duplicate step id '{0}'")]
    DuplicateStep(String),
    #[error("step '{step}' has a field with an empty name")]
    EmptyFieldName { step: String },
    #[error("step '{step}' declares field '{field}' more than once")]
    DuplicateField { step: String, field: String },
    #[error("include_if key '{0}' must have the form '<step_id>.<field_name>'")]
    ConditionKey(String),
    #[error("enum field '{field}' in step '{step}' needs an options_source or inline options")]
    EnumWithoutOptions { step: String, field: String },
    #[error("field '{field}' in step '{step}' names an option provider with an empty name")]
    EmptyProviderName { step: String, field: String },
}
