use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::AnswerBook;
use crate::error::SpecError;

/// One `"<step_id>.<field_name>" == expected` equality test.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub step_id: String,
    pub field: String,
    pub expected: Value,
}

impl Clause {
    /// A clause over a step or field that has no recorded answer never holds.
    pub fn holds(&self, prior: &AnswerBook) -> bool {
        prior
            .get(&self.step_id)
            .and_then(|answers| answers.get(&self.field))
            .is_some_and(|actual| *actual == self.expected)
    }
}

/// Per-step `include_if`: a conjunction of equality clauses over prior answers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct InclusionCondition {
    clauses: Vec<Clause>,
}

impl InclusionCondition {
    pub fn new(clauses: Vec<Clause>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn holds(&self, prior: &AnswerBook) -> bool {
        self.clauses.iter().all(|clause| clause.holds(prior))
    }
}

impl TryFrom<BTreeMap<String, Value>> for InclusionCondition {
    type Error = SpecError;

    fn try_from(raw: BTreeMap<String, Value>) -> Result<Self, Self::Error> {
        let mut clauses = Vec::with_capacity(raw.len());
        for (key, expected) in raw {
            let (step_id, field) = key
                .split_once('.')
                .filter(|(step, field)| !step.is_empty() && !field.is_empty())
                .ok_or_else(|| SpecError::ConditionKey(key.clone()))?;
            clauses.push(Clause {
                step_id: step_id.to_string(),
                field: field.to_string(),
                expected,
            });
        }
        Ok(Self { clauses })
    }
}

impl From<InclusionCondition> for BTreeMap<String, Value> {
    fn from(condition: InclusionCondition) -> Self {
        condition
            .clauses
            .into_iter()
            .map(|clause| (format!("{}.{}", clause.step_id, clause.field), clause.expected))
            .collect()
    }
}

/// Decides whether a step is eligible given the answers collected so far.
///
/// No condition (or an empty one) always includes the step. A real condition
/// evaluated against an empty answer book excludes it.
pub fn is_included(condition: Option<&InclusionCondition>, prior: &AnswerBook) -> bool {
    let Some(condition) = condition.filter(|condition| !condition.is_empty()) else {
        return true;
    };
    if prior.is_empty() {
        return false;
    }
    condition.holds(prior)
}
