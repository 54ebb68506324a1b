//! Generated-input checks for traversal, persistence and rejected submissions.

use std::fs;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use wizard_engine::{FileStateStore, StateKey, StateStore, StepManager, StepOutcome, StepSource, Wizard};
use wizard_spec::{AnswerBook, WizardState, is_included};

const MAX_STEPS: usize = 8;

fn step_id(index: usize) -> String {
    format!("s{index}")
}

/// Per step: the `(referenced step, expected value)` clauses of its `include_if`.
fn arb_conditions() -> impl Strategy<Value = Vec<Vec<(usize, u8)>>> {
    prop::collection::vec(
        prop::collection::vec((0..MAX_STEPS, 0u8..3), 0..3),
        1..MAX_STEPS,
    )
}

/// Per step: the answer recorded for its `v` field, if any.
fn arb_recorded() -> impl Strategy<Value = Vec<Option<u8>>> {
    prop::collection::vec(prop::option::of(0u8..3), MAX_STEPS)
}

fn branching_manager(conditions: &[Vec<(usize, u8)>]) -> StepManager {
    let steps = conditions
        .iter()
        .enumerate()
        .map(|(index, clauses)| {
            let mut step = json!({ "id": step_id(index) });
            if !clauses.is_empty() {
                let include_if = clauses
                    .iter()
                    .map(|(target, value)| (format!("{}.v", step_id(*target)), json!(value)))
                    .collect::<Map<String, Value>>();
                step["include_if"] = Value::Object(include_if);
            }
            step
        })
        .collect::<Vec<_>>();
    StepManager::from_json_str(&json!({ "steps": steps }).to_string()).expect("definition")
}

fn answer_book(recorded: &[Option<u8>]) -> AnswerBook {
    recorded
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            value.map(|value| {
                let answers = json!({ "v": value }).as_object().cloned().expect("answers");
                (step_id(index), answers)
            })
        })
        .collect()
}

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z ]{0,12}".prop_map(Value::from),
    ]
}

fn arb_object() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,8}", arb_scalar(), 0..4)
        .prop_map(|entries| entries.into_iter().collect())
}

/// States reachable through the normal transitions.
fn arb_state() -> impl Strategy<Value = WizardState> {
    (
        arb_object(),
        prop::collection::vec(arb_object(), 0..4),
        any::<bool>(),
    )
        .prop_map(|(meta, answered, finished)| {
            let mut state = WizardState::fresh(meta);
            state.begin(step_id(0));
            for (index, answers) in answered.into_iter().enumerate() {
                state.record(&step_id(index), answers);
                state.advance_to(step_id(index + 1));
            }
            if finished {
                state.finish();
            }
            state
        })
}

fn arb_answer() -> impl Strategy<Value = Option<Value>> {
    prop::option::of(prop_oneof![
        Just(Value::Null),
        Just(json!("")),
        Just(json!("yes")),
        Just(json!("maybe")),
        Just(json!(0)),
        Just(json!(1)),
        Just(json!(2)),
        Just(json!(true)),
        Just(json!([1])),
    ])
}

fn form_wizard(store: Arc<FileStateStore>) -> Wizard {
    let manager = StepManager::from_json_str(
        &json!({
            "steps": [
                { "id": "form", "required_inputs": [
                    { "name": "name", "type": "string" },
                    { "name": "flag", "type": "boolean" },
                    { "name": "choice", "type": "enum",
                      "options": [ { "value": "yes" }, { "value": "no" } ] }
                ] },
                { "id": "done" }
            ]
        })
        .to_string(),
    )
    .expect("definition");
    Wizard::new("app", StepSource::single(manager), store)
}

proptest! {
    #[test]
    fn next_after_returns_the_first_eligible_step(
        conditions in arb_conditions(),
        recorded in arb_recorded(),
    ) {
        let manager = branching_manager(&conditions);
        let book = answer_book(&recorded);
        let steps = manager.steps();

        for (index, current) in steps.iter().enumerate() {
            let expected = steps[index + 1..]
                .iter()
                .find(|step| is_included(step.include_if.as_ref(), &book))
                .map(|step| step.id.as_str());
            let next = manager.next_after(&current.id, &book);
            prop_assert_eq!(next.map(|step| step.id.as_str()), expected);
            if let Some(step) = next {
                prop_assert!(is_included(step.include_if.as_ref(), &book));
            }
        }
    }

    #[test]
    fn file_store_save_then_load_is_identity(state in arb_state()) {
        let dir = TempDir::new().expect("tempdir");
        let store = FileStateStore::new(dir.path());
        let key = StateKey::new("app", "s1").expect("key");

        store.save(&key, &state).expect("save");
        prop_assert_eq!(store.load(&key).expect("load"), state);
    }

    #[test]
    fn rejected_submissions_leave_stored_state_unchanged(
        name in arb_answer(),
        flag in arb_answer(),
        choice in arb_answer(),
        submit_done in any::<bool>(),
    ) {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(FileStateStore::new(dir.path()));
        let wizard = form_wizard(store.clone());
        let key = StateKey::new("app", "s1").expect("key");
        wizard.start("s1", Map::new()).expect("start");
        let before = fs::read(store.state_path(&key)).expect("state file");

        let mut answers = Map::new();
        for (field, value) in [("name", name), ("flag", flag), ("choice", choice)] {
            if let Some(value) = value {
                answers.insert(field.to_string(), value);
            }
        }
        let step_id = if submit_done { "done" } else { "form" };
        let outcome = wizard.step("s1", step_id, answers).expect("step");

        match outcome {
            StepOutcome::Advanced { current_step, .. } => {
                prop_assert_eq!(current_step.id.as_str(), "done");
            }
            StepOutcome::ValidationError { errors, .. } => {
                prop_assert!(!errors.is_empty());
                prop_assert_eq!(fs::read(store.state_path(&key)).expect("state file"), before);
            }
            StepOutcome::Error { .. } => {
                prop_assert!(submit_done);
                prop_assert_eq!(fs::read(store.state_path(&key)).expect("state file"), before);
            }
            StepOutcome::Completed { .. } => prop_assert!(false, "single answer cannot complete"),
        }
    }
}
