use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path;

/// Declared means of obtaining the selectable values for a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptionSource {
    /// Options listed inline in the definition.
    Static { values: Vec<Value> },
    /// Options computed by a named provider registered at process start.
    Function {
        name: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        args: BTreeMap<String, OptionArg>,
    },
}

/// Argument handed to an option provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum OptionArg {
    /// `{"$from": "answers.step.field"}`: read from the wizard state snapshot.
    State {
        #[serde(rename = "$from")]
        from: String,
    },
    Literal(Value),
}

impl OptionArg {
    /// Missing paths resolve to `null` rather than failing.
    pub fn resolve(&self, wizard_state: &Value) -> Value {
        match self {
            OptionArg::State { from } => path::lookup(wizard_state, from)
                .cloned()
                .unwrap_or(Value::Null),
            OptionArg::Literal(value) => value.clone(),
        }
    }
}

/// Resolves every declared argument against the state snapshot.
pub fn resolve_args(args: &BTreeMap<String, OptionArg>, wizard_state: &Value) -> Map<String, Value> {
    args.iter()
        .map(|(name, arg)| (name.clone(), arg.resolve(wizard_state)))
        .collect()
}
