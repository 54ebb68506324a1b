use std::error::Error as StdError;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use wizard_spec::AnswerBook;

/// Everything collected by a finished wizard run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub kind: String,
    pub session: String,
    pub meta: Map<String, Value>,
    pub answers: AnswerBook,
}

/// Outcome reported by the backend that applied a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Backend payload echoed into the completion summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl CompletionReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            details: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Applies the answers of a completed wizard.
///
/// An `Err` means the action could not run at all; a report with
/// `success: false` means it ran and the backend refused the submission.
pub trait CompletionAction: Send + Sync {
    fn complete(&self, submission: &Submission) -> Result<CompletionReport, ActionError>;
}

impl<F> CompletionAction for F
where
    F: Fn(&Submission) -> Result<CompletionReport, ActionError> + Send + Sync,
{
    fn complete(&self, submission: &Submission) -> Result<CompletionReport, ActionError> {
        self(submission)
    }
}

/// Accepts every submission without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAction;

impl CompletionAction for NoopAction {
    fn complete(&self, _submission: &Submission) -> Result<CompletionReport, ActionError> {
        Ok(CompletionReport {
            success: true,
            message: None,
            details: None,
        })
    }
}
