pub mod definition;
pub mod field;
pub mod options;
pub mod step;

pub use definition::WizardDefinition;
pub use field::{FieldDefinition, FieldType};
pub use options::{OptionArg, OptionSource, resolve_args};
pub use step::StepDefinition;
