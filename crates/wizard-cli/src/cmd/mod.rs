pub mod schema;
pub mod wizard;

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::config::StepwiseConfig;

/// Loaded configuration plus command-line overrides.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub config: StepwiseConfig,
    pub state_dir: PathBuf,
}

impl Workspace {
    pub fn new(config: StepwiseConfig, state_dir: Option<PathBuf>) -> Self {
        let state_dir = state_dir.unwrap_or_else(|| config.state_dir());
        Self { config, state_dir }
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
