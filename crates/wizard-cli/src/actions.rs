//! Completion actions selected by `[wizards.<kind>.completion]`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use reqwest::blocking::Client;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::info;
use wizard_engine::{
    ActionError, CompletionAction, CompletionReport, NoopAction, Submission,
};

use crate::config::{CompletionConfig, StepwiseConfig};
use crate::providers::{http_client, http_headers};

pub fn build_action(
    config: &StepwiseConfig,
    completion: &CompletionConfig,
) -> Result<Arc<dyn CompletionAction>> {
    let action: Arc<dyn CompletionAction> = match completion {
        CompletionConfig::None => Arc::new(NoopAction),
        CompletionConfig::File { path } => Arc::new(FileAction {
            path: config.resolve(path),
        }),
        CompletionConfig::Http(http) => Arc::new(HttpAction {
            client: http_client(http)?,
            url: http.url.clone(),
            headers: http_headers(http)?,
        }),
    };
    Ok(action)
}

/// Writes each submission as pretty JSON, replacing the target atomically.
#[derive(Debug, Clone)]
pub struct FileAction {
    /// May contain `{kind}` and `{session}` placeholders.
    pub path: PathBuf,
}

impl FileAction {
    pub fn target(&self, submission: &Submission) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(
            raw.replace("{kind}", &submission.kind)
                .replace("{session}", &submission.session),
        )
    }
}

impl CompletionAction for FileAction {
    fn complete(&self, submission: &Submission) -> Result<CompletionReport, ActionError> {
        let target = self.target(submission);
        write_atomically(&target, submission).map_err(|err| {
            ActionError::Failed(format!("failed to write {}: {err}", target.display()))
        })?;
        info!(path = %target.display(), "submission written");
        Ok(CompletionReport {
            success: true,
            message: Some(format!("Submission written to {}", target.display())),
            details: None,
        })
    }
}

fn write_atomically(target: &Path, submission: &Submission) -> std::io::Result<()> {
    let dir = target
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), submission)?;
    tmp.as_file_mut().write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|err| err.error)?;
    Ok(())
}

/// POSTs the submission and reads `{success, message}` from the response.
#[derive(Debug, Clone)]
pub struct HttpAction {
    client: Client,
    url: String,
    headers: Vec<(String, String)>,
}

impl CompletionAction for HttpAction {
    fn complete(&self, submission: &Submission) -> Result<CompletionReport, ActionError> {
        let mut request = self.client.post(&self.url).json(submission);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .map_err(|err| ActionError::Other(Box::new(err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Failed(format!(
                "{} answered {status}",
                self.url
            )));
        }
        let body: Value = response
            .json()
            .map_err(|err| ActionError::Other(Box::new(err)))?;
        Ok(report_from_body(body))
    }
}

/// A body without a boolean `success` counts as success.
fn report_from_body(body: Value) -> CompletionReport {
    let success = body
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    CompletionReport {
        success,
        message,
        details: Some(body),
    }
}
