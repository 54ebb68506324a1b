//! The wizard controller: `start`, `step` and `inspect` over one wizard kind.
//!
//! Every mutating operation holds the state lock for its key while it loads,
//! mutates and persists. Sequencing problems come back as `Error` outcomes and
//! leave persisted state untouched; engine failures propagate as
//! [`EngineError`].

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use wizard_spec::{
    AnswerBook, StepAnswers, StepDefinition, ValidationError, ValidatorRegistry, WizardPhase,
    WizardState, validate,
};

use crate::action::{CompletionAction, NoopAction, Submission};
use crate::error::EngineError;
use crate::options::OptionRegistry;
use crate::steps::{StepManager, StepSource};
use crate::store::{StateKey, StateStore};

const NOT_STARTED: &str = "Wizard has not been started. Call start first.";
const ALREADY_COMPLETED: &str = "Wizard has already been completed. Call start to run it again.";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    #[serde(rename = "ok")]
    Started {
        current_step: StepDefinition,
        meta: Map<String, Value>,
    },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    #[serde(rename = "ok")]
    Advanced {
        current_step: StepDefinition,
        meta: Map<String, Value>,
    },
    /// The step with options resolved, and every problem found.
    ValidationError {
        step: StepDefinition,
        errors: Vec<ValidationError>,
    },
    Completed { summary: CompletionSummary },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InspectOutcome {
    #[serde(rename = "ok")]
    Snapshot {
        state: WizardState,
        current_step: Option<StepDefinition>,
    },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionSummary {
    pub success: bool,
    pub meta: Map<String, Value>,
    pub answers: AnswerBook,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// One wizard kind wired to its steps, providers, validators, store and action.
#[derive(Clone)]
pub struct Wizard {
    kind: String,
    steps: StepSource,
    options: Arc<OptionRegistry>,
    validators: ValidatorRegistry,
    store: Arc<dyn StateStore>,
    action: Arc<dyn CompletionAction>,
}

impl Wizard {
    pub fn new(kind: impl Into<String>, steps: StepSource, store: Arc<dyn StateStore>) -> Self {
        Self {
            kind: kind.into(),
            steps,
            options: Arc::new(OptionRegistry::new()),
            validators: ValidatorRegistry::with_defaults(),
            store,
            action: Arc::new(NoopAction),
        }
    }

    pub fn with_options(mut self, options: Arc<OptionRegistry>) -> Self {
        self.options = options;
        self
    }

    /// Entries in `overrides` replace the built-in validator for the same tag.
    pub fn with_validators(mut self, overrides: &ValidatorRegistry) -> Self {
        self.validators = ValidatorRegistry::with_defaults().merged(overrides);
        self
    }

    pub fn with_action(mut self, action: Arc<dyn CompletionAction>) -> Self {
        self.action = action;
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn steps(&self) -> &StepSource {
        &self.steps
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn key(&self, session: &str) -> Result<StateKey, EngineError> {
        Ok(StateKey::new(self.kind.as_str(), session)?)
    }

    /// Resets the session and positions it on the first step.
    pub fn start(
        &self,
        session: &str,
        meta: Map<String, Value>,
    ) -> Result<StartOutcome, EngineError> {
        let key = self.key(session)?;
        let _lock = self.store.lock(&key)?;

        let Some(manager) = self.steps.select(&meta) else {
            let message = self.steps.selection_error(&meta);
            warn!(key = %key, %message, "cannot start wizard");
            return Ok(StartOutcome::Error { message });
        };
        let Some(first) = manager.first() else {
            warn!(key = %key, "cannot start wizard without steps");
            return Ok(StartOutcome::Error {
                message: "No wizard steps configured.".into(),
            });
        };

        let mut pending = WizardState::fresh(meta.clone());
        pending.begin(first.id.as_str());
        let current_step = manager.enrich(first, &pending, &self.options, Some(&key))?;

        let mut state = self.store.reset(&key, meta)?;
        state.begin(first.id.as_str());
        self.store.save(&key, &state)?;
        info!(key = %key, step = %first.id, "wizard started");

        Ok(StartOutcome::Started {
            current_step,
            meta: state.meta,
        })
    }

    /// Submits answers for the current step.
    pub fn step(
        &self,
        session: &str,
        step_id: &str,
        answers: StepAnswers,
    ) -> Result<StepOutcome, EngineError> {
        let key = self.key(session)?;
        let _lock = self.store.lock(&key)?;
        let mut state = self.store.load(&key)?;

        let rejection = match state.phase() {
            WizardPhase::NotStarted => Some(NOT_STARTED.to_string()),
            WizardPhase::Completed => Some(ALREADY_COMPLETED.to_string()),
            WizardPhase::InProgress(current) if current != step_id => Some(format!(
                "Expected step '{current}', but got '{step_id}'."
            )),
            WizardPhase::InProgress(_) => None,
        };
        if let Some(message) = rejection {
            warn!(key = %key, step = %step_id, %message, "rejected step");
            return Ok(StepOutcome::Error { message });
        }

        let Some(manager) = self.steps.select(&state.meta) else {
            return Ok(StepOutcome::Error {
                message: self.steps.selection_error(&state.meta),
            });
        };
        let Some(step) = manager.get(step_id) else {
            return Ok(StepOutcome::Error {
                message: format!("Unknown step id '{step_id}'."),
            });
        };

        let enriched = manager.enrich(step, &state, &self.options, Some(&key))?;
        let errors = validate(&enriched, &answers, &self.validators);
        if !errors.is_empty() {
            info!(key = %key, step = %step_id, errors = errors.len(), "answers rejected");
            return Ok(StepOutcome::ValidationError {
                step: enriched,
                errors,
            });
        }

        state.record(step_id, answers);
        match manager.next_after(step_id, &state.answers) {
            Some(next) => {
                state.advance_to(next.id.as_str());
                let current_step = manager.enrich(next, &state, &self.options, Some(&key))?;
                self.store.save(&key, &state)?;
                info!(key = %key, from = %step_id, to = %next.id, "wizard advanced");
                Ok(StepOutcome::Advanced {
                    current_step,
                    meta: state.meta,
                })
            }
            None => self.complete(&key, state),
        }
    }

    /// Runs the completion action; state is persisted only when it succeeds.
    fn complete(&self, key: &StateKey, mut state: WizardState) -> Result<StepOutcome, EngineError> {
        let submission = Submission {
            kind: key.kind().to_string(),
            session: key.session().to_string(),
            meta: state.meta.clone(),
            answers: state.answers.clone(),
        };
        let report = self
            .action
            .complete(&submission)
            .map_err(|source| EngineError::Action {
                kind: self.kind.clone(),
                source,
            })?;

        if !report.success {
            let reason = report.message.as_deref().unwrap_or("unknown error");
            warn!(key = %key, %reason, "completion action reported failure");
            return Ok(StepOutcome::Error {
                message: format!("Wizard completion failed: {reason}"),
            });
        }

        state.finish();
        self.store.save(key, &state)?;
        info!(key = %key, "wizard completed");

        Ok(StepOutcome::Completed {
            summary: CompletionSummary {
                success: true,
                meta: state.meta,
                answers: state.answers,
                message: report.message,
                details: report.details,
            },
        })
    }

    /// Reads the persisted state without changing it.
    pub fn inspect(&self, session: &str) -> Result<InspectOutcome, EngineError> {
        let key = self.key(session)?;
        let state = self.store.load(&key)?;

        let current_step = match state.current_step_id.as_deref() {
            None => None,
            Some(step_id) => {
                let Some(manager) = self.steps.select(&state.meta) else {
                    return Ok(InspectOutcome::Error {
                        message: self.steps.selection_error(&state.meta),
                    });
                };
                self.enrich_current(manager, step_id, &state, &key)?
            }
        };

        Ok(InspectOutcome::Snapshot {
            state,
            current_step,
        })
    }

    fn enrich_current(
        &self,
        manager: &StepManager,
        step_id: &str,
        state: &WizardState,
        key: &StateKey,
    ) -> Result<Option<StepDefinition>, EngineError> {
        manager
            .get(step_id)
            .map(|step| manager.enrich(step, state, &self.options, Some(key)))
            .transpose()
    }

    /// Discards the persisted state of a session.
    pub fn reset(&self, session: &str) -> Result<bool, EngineError> {
        let key = self.key(session)?;
        let _lock = self.store.lock(&key)?;
        let removed = self.store.remove(&key)?;
        if removed {
            info!(key = %key, "wizard state removed");
        }
        Ok(removed)
    }

    pub fn sessions(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store.sessions(&self.kind)?)
    }
}
