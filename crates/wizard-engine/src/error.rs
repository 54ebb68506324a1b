use std::path::PathBuf;

use thiserror::Error;
use wizard_spec::SpecError;

use crate::action::ActionError;
use crate::options::ProviderError;
use crate::store::{StateKey, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid wizard definition{}: {source}", path_suffix(.path))]
    Config {
        path: Option<PathBuf>,
        #[source]
        source: SpecError,
    },
    #[error("option provider '{0}' is already registered")]
    DuplicateProvider(String),
    #[error("no option provider registered under '{0}'")]
    UnknownProvider(String),
    #[error("option provider '{name}' failed: {source}")]
    Provider {
        name: String,
        #[source]
        source: ProviderError,
    },
    #[error("completion action for '{kind}' failed: {source}")]
    Action {
        kind: String,
        #[source]
        source: ActionError,
    },
    #[error("wizard state '{0}' is locked by another caller")]
    Conflict(StateKey),
    #[error("invalid state key: {0}")]
    InvalidKey(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<SpecError> for EngineError {
    fn from(source: SpecError) -> Self {
        EngineError::Config { path: None, source }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Locked(key) => EngineError::Conflict(key),
            StoreError::InvalidKey(reason) => EngineError::InvalidKey(reason),
            other => EngineError::Store(other),
        }
    }
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| format!(" in {}", path.display()))
        .unwrap_or_default()
}
