//! `stepwise.toml`: where wizard definitions, state and collaborators live.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::Deserialize;
use serde_json::Value as JsonValue;

pub const DEFAULT_CONFIG_FILE: &str = "stepwise.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepwiseConfig {
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
    #[serde(default)]
    pub lock_wait_ms: u64,
    #[serde(default)]
    pub wizards: BTreeMap<String, WizardConfig>,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WizardConfig {
    #[serde(default)]
    pub steps: Option<PathBuf>,
    #[serde(default)]
    pub variant_keys: Vec<String>,
    #[serde(default)]
    pub variants: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub validators: BTreeMap<String, ValidatorConfig>,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValidatorConfig {
    /// Reuse a validator shipped with the engine under another tag.
    Builtin { builtin: String },
    Pattern { rules: Vec<PatternRuleConfig> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternRuleConfig {
    pub pattern: String,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Options picked from a table by the value of one argument.
    Lookup {
        arg: String,
        #[serde(default)]
        table: BTreeMap<String, Vec<JsonValue>>,
        #[serde(default)]
        default: Vec<JsonValue>,
    },
    /// Options read from a JSON file: a list, or a `{success, records}` envelope.
    File { path: PathBuf },
    Http(HttpConfig),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Header name to the environment variable holding its value.
    #[serde(default)]
    pub header_env: BTreeMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Key under which the response nests its records envelope.
    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionConfig {
    #[default]
    None,
    /// Writes the submission JSON; `{kind}` and `{session}` are substituted in the path.
    File { path: PathBuf },
    Http(HttpConfig),
}

impl StepwiseConfig {
    pub fn from_toml_str(raw: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let mut config: StepwiseConfig = toml::from_str(raw)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let base_dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_toml_str(&raw, base_dir)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Loads `path`, or the default file when present; otherwise an empty config.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self {
                        base_dir: PathBuf::from("."),
                        ..Self::default()
                    })
                }
            }
        }
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Configured state directory, else the platform data directory.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.state_dir {
            return self.resolve(dir);
        }
        ProjectDirs::from("dev", "stepwise", "stepwise")
            .map(|dirs| dirs.data_dir().join("state"))
            .unwrap_or_else(|| self.base_dir.join(".stepwise").join("state"))
    }

    pub fn wizard(&self, kind: &str) -> Result<&WizardConfig> {
        self.wizards.get(kind).ok_or_else(|| {
            let known = self.wizards.keys().cloned().collect::<Vec<_>>();
            if known.is_empty() {
                anyhow!("unknown wizard '{kind}': no wizards are configured")
            } else {
                anyhow!("unknown wizard '{kind}'; configured: {}", known.join(", "))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
state_dir = "state"
lock_wait_ms = 250

[wizards.application]
steps = "wizards/application.json"

[wizards.application.validators.base_name]
builtin = "identifier"

[wizards.application.validators.class_name]
rules = [
  { pattern = "^[A-Z]", message = "Start with an uppercase letter." },
]

[wizards.application.completion]
type = "file"
path = "out/{kind}-{session}.json"

[wizards.event]
variant_keys = ["event_type", "event_side"]

[wizards.event.variants]
"item/php" = "wizards/item_php.json"

[providers.class_choice]
type = "lookup"
arg = "dropin"
default = [{ value = "Generic", label = "Generic" }]

[providers.class_choice.table]
grid = [{ value = "GridController", label = "Grid" }]

[providers.databases]
type = "http"
url = "http://localhost:8080/databases"
header_env = { Authorization = "STEPWISE_TOKEN" }
topic = "databases"
"#;

    #[test]
    fn parses_sample_config() {
        let config = StepwiseConfig::from_toml_str(SAMPLE, "/etc/stepwise").expect("config");
        assert_eq!(config.lock_wait_ms, 250);
        assert_eq!(config.state_dir(), PathBuf::from("/etc/stepwise/state"));

        let app = config.wizard("application").expect("application");
        assert!(matches!(
            app.validators.get("base_name"),
            Some(ValidatorConfig::Builtin { builtin }) if builtin == "identifier"
        ));
        assert!(matches!(
            app.validators.get("class_name"),
            Some(ValidatorConfig::Pattern { rules }) if rules.len() == 1
        ));
        assert!(matches!(app.completion, CompletionConfig::File { .. }));

        let event = config.wizard("event").expect("event");
        assert_eq!(event.variant_keys, vec!["event_type", "event_side"]);
        assert!(matches!(event.completion, CompletionConfig::None));

        let Some(ProviderConfig::Http(http)) = config.providers.get("databases") else {
            panic!("expected an http provider");
        };
        assert_eq!(http.method, HttpMethod::Post);
        assert_eq!(http.topic.as_deref(), Some("databases"));
        assert!(matches!(
            config.providers.get("class_choice"),
            Some(ProviderConfig::Lookup { table, .. }) if table.contains_key("grid")
        ));
    }

    #[test]
    fn unknown_wizard_lists_configured_ones() {
        let config = StepwiseConfig::from_toml_str(SAMPLE, ".").expect("config");
        let err = config.wizard("nope").expect_err("unknown");
        assert!(err.to_string().contains("application, event"));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(StepwiseConfig::from_toml_str("stat_dir = 'x'", ".").is_err());
    }
}
