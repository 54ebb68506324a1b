use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use wizard_spec::{
    AnswerBook, SpecError, StepDefinition, WizardDefinition, WizardState, is_included,
};

use crate::error::EngineError;
use crate::options::{OptionContext, OptionRegistry};
use crate::store::StateKey;

/// Ordered, immutable list of step definitions for one wizard kind.
#[derive(Debug, Clone, Default)]
pub struct StepManager {
    steps: Vec<StepDefinition>,
}

impl StepManager {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let config_error = |source: SpecError| EngineError::Config {
            path: Some(path.to_path_buf()),
            source,
        };
        let raw = fs::read_to_string(path).map_err(|err| config_error(err.into()))?;
        let definition = WizardDefinition::from_json_str(&raw).map_err(config_error)?;
        debug!(path = %path.display(), steps = definition.steps.len(), "loaded wizard definition");
        Ok(Self::from_definition(definition))
    }

    pub fn from_json_str(raw: &str) -> Result<Self, EngineError> {
        Ok(Self::from_definition(WizardDefinition::from_json_str(raw)?))
    }

    /// Wraps an already checked definition.
    pub fn from_definition(definition: WizardDefinition) -> Self {
        Self {
            steps: definition.steps,
        }
    }

    pub fn first(&self) -> Option<&StepDefinition> {
        self.steps.first()
    }

    pub fn get(&self, step_id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|step| step.id == step_id)
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// First step after `step_id` whose inclusion condition holds.
    ///
    /// Returns `None` when `step_id` is unknown or nothing eligible remains.
    pub fn next_after(&self, step_id: &str, prior: &AnswerBook) -> Option<&StepDefinition> {
        let position = self.steps.iter().position(|step| step.id == step_id)?;
        self.steps[position + 1..].iter().find(|step| {
            let included = is_included(step.include_if.as_ref(), prior);
            if !included {
                debug!(step = %step.id, "skipping step, include_if does not hold");
            }
            included
        })
    }

    /// Resolves option sources of `step` against a snapshot of `state`.
    pub fn enrich(
        &self,
        step: &StepDefinition,
        state: &WizardState,
        registry: &OptionRegistry,
        key: Option<&StateKey>,
    ) -> Result<StepDefinition, EngineError> {
        let ctx = OptionContext::new(key.cloned(), state.snapshot());
        registry.enrich_step(step, &ctx)
    }
}

/// Where a wizard kind gets its steps from.
#[derive(Debug, Clone)]
pub enum StepSource {
    Single(Arc<StepManager>),
    /// One step list per combination of `meta` values, joined with `/`.
    Variants {
        keys: Vec<String>,
        variants: BTreeMap<String, Arc<StepManager>>,
    },
}

impl StepSource {
    pub fn single(manager: StepManager) -> Self {
        StepSource::Single(Arc::new(manager))
    }

    /// Variant key built from `meta`, e.g. `"item/php"`; `None` if a value is missing.
    pub fn variant_key(keys: &[String], meta: &Map<String, Value>) -> Option<String> {
        let parts = keys
            .iter()
            .map(|key| match meta.get(key)? {
                Value::String(text) if !text.is_empty() => Some(text.clone()),
                Value::Null | Value::String(_) => None,
                other => Some(other.to_string()),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(parts.join("/"))
    }

    pub fn select(&self, meta: &Map<String, Value>) -> Option<&Arc<StepManager>> {
        match self {
            StepSource::Single(manager) => Some(manager),
            StepSource::Variants { keys, variants } => {
                let key = Self::variant_key(keys, meta)?;
                variants.get(&key)
            }
        }
    }

    /// Message describing why [`select`](Self::select) found nothing for `meta`.
    pub fn selection_error(&self, meta: &Map<String, Value>) -> String {
        match self {
            StepSource::Single(_) => "No wizard steps configured.".to_string(),
            StepSource::Variants { keys, variants } => match Self::variant_key(keys, meta) {
                None => format!("Meta must provide: {}.", keys.join(", ")),
                Some(key) => format!(
                    "No steps configured for '{key}'. Known variants: {}.",
                    variants.keys().cloned().collect::<Vec<_>>().join(", ")
                ),
            },
        }
    }
}
