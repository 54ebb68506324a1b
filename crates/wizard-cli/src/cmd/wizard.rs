use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::debug;
use wizard_engine::{FileStateStore, StepManager, StepSource, Wizard};
use wizard_spec::{PatternRule, PatternValidator, StepDefinition, ValidatorRegistry, builtin};

use crate::actions::build_action;
use crate::cmd::{Workspace, print_json};
use crate::config::{StepwiseConfig, ValidatorConfig, WizardConfig};
use crate::providers::build_registry;

#[derive(Args, Debug, Clone)]
pub struct StartArgs {
    /// Wizard kind as named in the config
    pub kind: String,
    #[arg(long, value_name = "SESSION")]
    pub session: String,
    /// Metadata object as inline JSON
    #[arg(long, value_name = "JSON", conflicts_with = "meta_file")]
    pub meta: Option<String>,
    /// Metadata object read from a file (`-` for stdin)
    #[arg(long = "meta-file", value_name = "PATH")]
    pub meta_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StepArgs {
    pub kind: String,
    #[arg(long, value_name = "SESSION")]
    pub session: String,
    /// Id of the step being answered
    #[arg(long = "step", value_name = "STEP_ID")]
    pub step_id: String,
    /// Answers object as inline JSON
    #[arg(long, value_name = "JSON", conflicts_with = "answers_file")]
    pub answers: Option<String>,
    /// Answers object read from a file (`-` for stdin)
    #[arg(long = "answers-file", value_name = "PATH")]
    pub answers_file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    pub kind: String,
    #[arg(long, value_name = "SESSION")]
    pub session: String,
}

#[derive(Args, Debug, Clone)]
pub struct StepsArgs {
    pub kind: String,
    /// Variant key such as `item/php`; all variants are listed when omitted
    #[arg(long, value_name = "KEY")]
    pub variant: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct KindArgs {
    pub kind: String,
}

pub fn start(ws: &Workspace, args: &StartArgs) -> Result<()> {
    let wizard = build_wizard(ws, &args.kind)?;
    let meta = read_object("meta", args.meta.as_deref(), args.meta_file.as_deref())?;
    let outcome = wizard
        .start(&args.session, meta)
        .with_context(|| format!("failed to start {}/{}", args.kind, args.session))?;
    print_json(&outcome)
}

pub fn step(ws: &Workspace, args: &StepArgs) -> Result<()> {
    let wizard = build_wizard(ws, &args.kind)?;
    let answers = read_object(
        "answers",
        args.answers.as_deref(),
        args.answers_file.as_deref(),
    )?;
    let outcome = wizard
        .step(&args.session, &args.step_id, answers)
        .with_context(|| {
            format!(
                "failed to submit step '{}' for {}/{}",
                args.step_id, args.kind, args.session
            )
        })?;
    print_json(&outcome)
}

pub fn inspect(ws: &Workspace, args: &SessionArgs) -> Result<()> {
    let wizard = build_wizard(ws, &args.kind)?;
    let outcome = wizard
        .inspect(&args.session)
        .with_context(|| format!("failed to inspect {}/{}", args.kind, args.session))?;
    print_json(&outcome)
}

pub fn reset(ws: &Workspace, args: &SessionArgs) -> Result<()> {
    let wizard = build_wizard(ws, &args.kind)?;
    let removed = wizard
        .reset(&args.session)
        .with_context(|| format!("failed to reset {}/{}", args.kind, args.session))?;
    print_json(&serde_json::json!({ "status": "ok", "removed": removed }))
}

pub fn sessions(ws: &Workspace, args: &KindArgs) -> Result<()> {
    let wizard = build_wizard(ws, &args.kind)?;
    let sessions = wizard.sessions()?;
    print_json(&serde_json::json!({ "kind": args.kind, "sessions": sessions }))
}

#[derive(Debug, Serialize)]
struct StepSummary<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    fields: Vec<&'a str>,
    conditional: bool,
}

pub fn steps(ws: &Workspace, args: &StepsArgs) -> Result<()> {
    let cfg = ws.config.wizard(&args.kind)?;
    let source = step_source(&ws.config, &args.kind, cfg)?;

    match (&source, args.variant.as_deref()) {
        (StepSource::Single(manager), None) => print_json(&summarize(manager.steps())),
        (StepSource::Single(_), Some(_)) => {
            bail!("wizard '{}' has no variants", args.kind)
        }
        (StepSource::Variants { variants, .. }, Some(key)) => {
            let manager = variants
                .get(key)
                .ok_or_else(|| anyhow!("wizard '{}' has no variant '{key}'", args.kind))?;
            print_json(&summarize(manager.steps()))
        }
        (StepSource::Variants { variants, .. }, None) => {
            let listing = variants
                .iter()
                .map(|(key, manager)| (key.as_str(), summarize(manager.steps())))
                .collect::<BTreeMap<_, _>>();
            print_json(&listing)
        }
    }
}

fn summarize(steps: &[StepDefinition]) -> Vec<StepSummary<'_>> {
    steps
        .iter()
        .map(|step| StepSummary {
            id: &step.id,
            title: step.title.as_deref(),
            fields: step.fields.iter().map(|field| field.name.as_str()).collect(),
            conditional: step.include_if.as_ref().is_some_and(|cond| !cond.is_empty()),
        })
        .collect()
}

/// Wires a configured wizard kind to its steps, providers, validators and store.
pub fn build_wizard(ws: &Workspace, kind: &str) -> Result<Wizard> {
    let cfg = ws.config.wizard(kind)?;
    let steps = step_source(&ws.config, kind, cfg)?;
    let options = build_registry(&ws.config)?;
    let validators = build_validators(kind, cfg)?;
    let action = build_action(&ws.config, &cfg.completion)
        .with_context(|| format!("failed to configure completion for '{kind}'"))?;
    let store = FileStateStore::new(&ws.state_dir)
        .with_lock_wait(Duration::from_millis(ws.config.lock_wait_ms));
    debug!(kind, state_dir = %ws.state_dir.display(), "wizard configured");

    Ok(Wizard::new(kind, steps, Arc::new(store))
        .with_options(Arc::new(options))
        .with_validators(&validators)
        .with_action(action))
}

fn step_source(config: &StepwiseConfig, kind: &str, cfg: &WizardConfig) -> Result<StepSource> {
    match (&cfg.steps, cfg.variants.is_empty()) {
        (Some(path), true) => Ok(StepSource::single(StepManager::load(config.resolve(path))?)),
        (None, false) => {
            if cfg.variant_keys.is_empty() {
                bail!("wizard '{kind}' declares variants but no variant_keys");
            }
            let mut variants = BTreeMap::new();
            for (key, path) in &cfg.variants {
                let manager = StepManager::load(config.resolve(path))
                    .with_context(|| format!("failed to load variant '{key}' of '{kind}'"))?;
                variants.insert(key.clone(), Arc::new(manager));
            }
            Ok(StepSource::Variants {
                keys: cfg.variant_keys.clone(),
                variants,
            })
        }
        (Some(_), false) => bail!("wizard '{kind}' must declare either steps or variants, not both"),
        (None, true) => bail!("wizard '{kind}' has no steps configured"),
    }
}

fn build_validators(kind: &str, cfg: &WizardConfig) -> Result<ValidatorRegistry> {
    let mut registry = ValidatorRegistry::empty();
    for (tag, validator) in &cfg.validators {
        match validator {
            ValidatorConfig::Builtin { builtin: name } => {
                let shared = builtin(name).ok_or_else(|| {
                    anyhow!("wizard '{kind}': unknown builtin validator '{name}' for type '{tag}'")
                })?;
                registry.insert_shared(tag.as_str(), shared);
            }
            ValidatorConfig::Pattern { rules } => {
                let rules = rules
                    .iter()
                    .map(|rule| {
                        PatternRule::new(&rule.pattern, rule.message.as_str()).with_context(|| {
                            format!("wizard '{kind}': invalid pattern for type '{tag}'")
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                registry.insert(tag.as_str(), PatternValidator::new(rules));
            }
        }
    }
    Ok(registry)
}

/// Parses a JSON object from an inline string or a file; absent means empty.
fn read_object(
    label: &str,
    inline: Option<&str>,
    file: Option<&Path>,
) -> Result<JsonMap<String, JsonValue>> {
    let raw = match (inline, file) {
        (Some(raw), _) => raw.to_string(),
        (None, Some(path)) if path == Path::new("-") => {
            let mut raw = String::new();
            io::stdin()
                .read_to_string(&mut raw)
                .with_context(|| format!("failed to read {label} from stdin"))?;
            raw
        }
        (None, Some(path)) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {label} file {}", path.display()))?,
        (None, None) => return Ok(JsonMap::new()),
    };
    match serde_json::from_str::<JsonValue>(&raw).with_context(|| format!("{label} must be valid JSON"))? {
        JsonValue::Object(map) => Ok(map),
        other => bail!("{label} must be a JSON object, got {other}"),
    }
}
