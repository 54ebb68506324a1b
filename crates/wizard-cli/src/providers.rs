//! Option providers declared in the `[providers]` section of the config.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::debug;
use wizard_engine::{
    OptionContext, OptionProvider, OptionRegistry, ProviderError, options_from_records,
    records_from_envelope,
};

use crate::config::{HttpConfig, HttpMethod, ProviderConfig, StepwiseConfig};

pub fn build_registry(config: &StepwiseConfig) -> Result<OptionRegistry> {
    let mut registry = OptionRegistry::new();
    for (name, provider) in &config.providers {
        match provider {
            ProviderConfig::Lookup {
                arg,
                table,
                default,
            } => registry.register(
                name.as_str(),
                LookupProvider {
                    arg: arg.clone(),
                    table: table.clone(),
                    default: default.clone(),
                },
            )?,
            ProviderConfig::File { path } => registry.register(
                name.as_str(),
                FileProvider {
                    path: config.resolve(path),
                },
            )?,
            ProviderConfig::Http(http) => registry.register(
                name.as_str(),
                HttpProvider::new(http)
                    .with_context(|| format!("failed to configure provider '{name}'"))?,
            )?,
        }
    }
    Ok(registry)
}

/// Static table of option lists keyed by one argument's value.
#[derive(Debug, Clone)]
pub struct LookupProvider {
    pub arg: String,
    pub table: BTreeMap<String, Vec<Value>>,
    pub default: Vec<Value>,
}

impl OptionProvider for LookupProvider {
    fn provide(
        &self,
        _ctx: &OptionContext,
        args: &Map<String, Value>,
    ) -> Result<Vec<Value>, ProviderError> {
        let key = match args.get(&self.arg) {
            None | Some(Value::Null) => return Ok(self.default.clone()),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        };
        Ok(self
            .table
            .get(&key)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

/// Options stored in a JSON file, re-read on every resolution.
#[derive(Debug, Clone)]
pub struct FileProvider {
    pub path: PathBuf,
}

impl OptionProvider for FileProvider {
    fn provide(
        &self,
        _ctx: &OptionContext,
        _args: &Map<String, Value>,
    ) -> Result<Vec<Value>, ProviderError> {
        let raw = fs::read(&self.path).map_err(|err| {
            ProviderError::Failed(format!("failed to read {}: {err}", self.path.display()))
        })?;
        let body: Value = serde_json::from_slice(&raw).map_err(|err| {
            ProviderError::Failed(format!("{} is not valid JSON: {err}", self.path.display()))
        })?;
        match body {
            Value::Array(options) => Ok(options),
            envelope => Ok(options_from_records(&records_from_envelope(&envelope, None)?)),
        }
    }
}

/// Fetches a `{success, records}` envelope and turns its records into options.
///
/// `post` sends the resolved arguments as a JSON body; `get` sends them as
/// query parameters.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    url: String,
    method: HttpMethod,
    headers: Vec<(String, String)>,
    topic: Option<String>,
}

impl HttpProvider {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config)?,
            url: config.url.clone(),
            method: config.method,
            headers: http_headers(config)?,
            topic: config.topic.clone(),
        })
    }
}

impl OptionProvider for HttpProvider {
    fn provide(
        &self,
        _ctx: &OptionContext,
        args: &Map<String, Value>,
    ) -> Result<Vec<Value>, ProviderError> {
        let mut request = match self.method {
            HttpMethod::Post => self.client.post(&self.url).json(args),
            HttpMethod::Get => {
                let mut url = Url::parse(&self.url).map_err(|err| ProviderError::InvalidArgument {
                    name: "url".into(),
                    reason: err.to_string(),
                })?;
                {
                    let mut query = url.query_pairs_mut();
                    for (name, value) in args.iter().filter(|(_, value)| !value.is_null()) {
                        match value {
                            Value::String(text) => query.append_pair(name, text),
                            other => query.append_pair(name, &other.to_string()),
                        };
                    }
                }
                self.client.get(url)
            }
        };
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        debug!(url = %self.url, "fetching options");
        let response = request
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| ProviderError::Other(Box::new(err)))?;
        let body: Value = response
            .json()
            .map_err(|err| ProviderError::Other(Box::new(err)))?;
        let records = records_from_envelope(&body, self.topic.as_deref())?;
        Ok(options_from_records(&records))
    }
}

pub(crate) fn http_client(config: &HttpConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(secs) = config.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("failed to build HTTP client")
}

/// Literal headers plus those whose values come from the environment.
pub(crate) fn http_headers(config: &HttpConfig) -> Result<Vec<(String, String)>> {
    let mut headers = config
        .headers
        .iter()
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect::<Vec<_>>();
    for (name, var) in &config.header_env {
        let value = env::var(var)
            .with_context(|| format!("environment variable {var} for header {name} is not set"))?;
        headers.push((name.clone(), value));
    }
    Ok(headers)
}
