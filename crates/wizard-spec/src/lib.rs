#![allow(missing_docs)]

pub mod answers;
pub mod condition;
pub mod error;
pub mod path;
pub mod schema;
pub mod spec;
pub mod state;
pub mod validate;
pub mod validators;

pub use answers::{AnswerBook, StepAnswers, StepId, ValidationError};
pub use condition::{Clause, InclusionCondition, is_included};
pub use error::SpecError;
pub use schema::definition_schema;
pub use spec::{
    FieldDefinition, FieldType, OptionArg, OptionSource, StepDefinition, WizardDefinition,
};
pub use state::{WizardPhase, WizardState};
pub use validate::{TypeValidator, ValidatorRegistry, is_missing, validate};
pub use validators::{PatternRule, PatternValidator, builtin};
