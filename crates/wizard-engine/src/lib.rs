#![allow(missing_docs)]

pub mod action;
pub mod controller;
pub mod error;
pub mod options;
pub mod steps;
pub mod store;

pub use action::{ActionError, CompletionAction, CompletionReport, NoopAction, Submission};
pub use controller::{CompletionSummary, InspectOutcome, StartOutcome, StepOutcome, Wizard};
pub use error::EngineError;
pub use options::{
    OptionContext, OptionProvider, OptionRegistry, ProviderError, options_from_records,
    records_from_envelope,
};
pub use steps::{StepManager, StepSource};
pub use store::{FileStateStore, MemoryStateStore, StateKey, StateLock, StateStore, StoreError};

pub use wizard_spec;
