use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;
use wizard_spec::{FieldDefinition, OptionSource, StepDefinition, spec::resolve_args};

use crate::error::EngineError;
use crate::store::StateKey;

/// What an option provider can see about the run it is resolving for.
#[derive(Debug, Clone, Default)]
pub struct OptionContext {
    pub key: Option<StateKey>,
    /// JSON snapshot of the wizard state; `$from` paths are resolved against it.
    pub wizard_state: Value,
}

impl OptionContext {
    pub fn new(key: Option<StateKey>, wizard_state: Value) -> Self {
        Self { key, wizard_state }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Computes the selectable values for a field at runtime.
pub trait OptionProvider: Send + Sync {
    fn provide(
        &self,
        ctx: &OptionContext,
        args: &Map<String, Value>,
    ) -> Result<Vec<Value>, ProviderError>;
}

impl<F> OptionProvider for F
where
    F: Fn(&OptionContext, &Map<String, Value>) -> Result<Vec<Value>, ProviderError> + Send + Sync,
{
    fn provide(
        &self,
        ctx: &OptionContext,
        args: &Map<String, Value>,
    ) -> Result<Vec<Value>, ProviderError> {
        self(ctx, args)
    }
}

/// Named option providers, populated once at process start.
#[derive(Clone, Default)]
pub struct OptionRegistry {
    providers: BTreeMap<String, Arc<dyn OptionProvider>>,
}

impl OptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        provider: impl OptionProvider + 'static,
    ) -> Result<(), EngineError> {
        self.register_shared(name, Arc::new(provider))
    }

    pub fn register_shared(
        &mut self,
        name: impl Into<String>,
        provider: Arc<dyn OptionProvider>,
    ) -> Result<(), EngineError> {
        let name = name.into();
        if self.providers.contains_key(&name) {
            return Err(EngineError::DuplicateProvider(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Produces the option list for a source. No source means no options.
    pub fn resolve(
        &self,
        source: Option<&OptionSource>,
        ctx: &OptionContext,
    ) -> Result<Vec<Value>, EngineError> {
        match source {
            None => Ok(Vec::new()),
            Some(OptionSource::Static { values }) => Ok(values.clone()),
            Some(OptionSource::Function { name, args }) => {
                let provider = self
                    .providers
                    .get(name)
                    .ok_or_else(|| EngineError::UnknownProvider(name.clone()))?;
                let resolved = resolve_args(args, &ctx.wizard_state);
                debug!(provider = %name, args = ?resolved, "resolving options");
                provider
                    .provide(ctx, &resolved)
                    .map_err(|source| EngineError::Provider {
                        name: name.clone(),
                        source,
                    })
            }
        }
    }

    /// Copy of `field` with `options` filled from its source, if it has one.
    pub fn enrich_field(
        &self,
        field: &FieldDefinition,
        ctx: &OptionContext,
    ) -> Result<FieldDefinition, EngineError> {
        let mut enriched = field.clone();
        if field.options_source.is_some() {
            enriched.options = Some(self.resolve(field.options_source.as_ref(), ctx)?);
        }
        Ok(enriched)
    }

    pub fn enrich_step(
        &self,
        step: &StepDefinition,
        ctx: &OptionContext,
    ) -> Result<StepDefinition, EngineError> {
        let fields = step
            .fields
            .iter()
            .map(|field| self.enrich_field(field, ctx))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StepDefinition {
            fields,
            ..step.clone()
        })
    }
}

impl fmt::Debug for OptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Turns backend records (`{id, id_display_value}`) into `{value, label}` options.
///
/// Records without an `id` are skipped; the label falls back to the value.
pub fn options_from_records(records: &[Value]) -> Vec<Value> {
    records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|record| {
            let value = match record.get("id")? {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let label = record
                .get("id_display_value")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.clone());
            Some(json!({ "value": value, "label": label }))
        })
        .collect()
}

/// Extracts the `records` list from a `{success, records}` response envelope.
///
/// With a `topic`, the envelope is looked up under that key first. A
/// `success: false` envelope becomes a provider failure carrying its message.
pub fn records_from_envelope(body: &Value, topic: Option<&str>) -> Result<Vec<Value>, ProviderError> {
    let envelope = match topic {
        Some(topic) => body.get(topic).unwrap_or(body),
        None => body,
    };
    if envelope.get("success").and_then(Value::as_bool) == Some(false) {
        let message = envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("backend reported failure");
        return Err(ProviderError::Failed(message.to_string()));
    }
    match envelope.get("records") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(records)) => Ok(records.clone()),
        Some(_) => Err(ProviderError::InvalidArgument {
            name: "records".into(),
            reason: "expected a list of records".into(),
        }),
    }
}
