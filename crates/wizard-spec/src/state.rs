use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::answers::{AnswerBook, StepAnswers, StepId};

/// Persisted progress of one wizard run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct WizardState {
    #[serde(default)]
    pub current_step_id: Option<StepId>,
    #[serde(default)]
    pub completed_step_ids: Vec<StepId>,
    #[serde(default)]
    pub answers: AnswerBook,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default)]
    pub completed: bool,
}

/// Coarse lifecycle position derived from a [`WizardState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPhase<'a> {
    NotStarted,
    InProgress(&'a str),
    Completed,
}

impl WizardState {
    /// Fresh state carrying caller-supplied metadata.
    pub fn fresh(meta: Map<String, Value>) -> Self {
        Self {
            meta,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> WizardPhase<'_> {
        match (&self.current_step_id, self.completed) {
            (Some(step), _) => WizardPhase::InProgress(step),
            (None, true) => WizardPhase::Completed,
            (None, false) => WizardPhase::NotStarted,
        }
    }

    pub fn begin(&mut self, first_step: impl Into<StepId>) {
        self.current_step_id = Some(first_step.into());
        self.completed = false;
    }

    /// Stores the answers for a step and marks it completed (once).
    pub fn record(&mut self, step_id: &str, answers: StepAnswers) {
        self.answers.insert(step_id.to_string(), answers);
        if !self.completed_step_ids.iter().any(|id| id == step_id) {
            self.completed_step_ids.push(step_id.to_string());
        }
    }

    pub fn advance_to(&mut self, next_step: impl Into<StepId>) {
        self.current_step_id = Some(next_step.into());
    }

    pub fn finish(&mut self) {
        self.current_step_id = None;
        self.completed = true;
    }

    /// JSON view handed to option providers for `$from` lookups.
    pub fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Describes the first broken invariant, if any.
    pub fn invariant_violation(&self) -> Option<String> {
        if self.completed && self.current_step_id.is_some() {
            return Some("a completed wizard must not have a current step".into());
        }
        for (idx, step_id) in self.completed_step_ids.iter().enumerate() {
            if self.completed_step_ids[..idx].contains(step_id) {
                return Some(format!("step '{step_id}' is listed as completed twice"));
            }
        }
        self.answers
            .keys()
            .find(|step_id| !self.completed_step_ids.contains(*step_id))
            .map(|step_id| format!("answers recorded for step '{step_id}' which is not completed"))
    }
}
