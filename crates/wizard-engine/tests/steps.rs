use std::fs;

use serde_json::{Map, Value, json};
use tempfile::TempDir;
use wizard_engine::{
    EngineError, OptionContext, OptionRegistry, ProviderError, StepManager,
};
use wizard_spec::{AnswerBook, FieldDefinition, OptionSource, WizardState};

fn branching() -> StepManager {
    StepManager::from_json_str(
        &json!({
            "steps": [
                { "id": "a", "required_inputs": [ { "name": "x", "type": "string" } ] },
                { "id": "grid", "include_if": { "a.x": "grid" } },
                { "id": "form", "include_if": { "a.x": "form" } },
                { "id": "always" },
                { "id": "both", "include_if": { "a.x": "grid", "grid.rows": 3 } }
            ]
        })
        .to_string(),
    )
    .expect("definition")
}

fn answered(x: &str) -> AnswerBook {
    serde_json::from_value(json!({ "a": { "x": x } })).expect("answers")
}

fn ids(manager: &StepManager) -> Vec<&str> {
    manager.steps().iter().map(|step| step.id.as_str()).collect()
}

#[test]
fn lookups_follow_definition_order() {
    let manager = branching();
    assert_eq!(manager.len(), 5);
    assert_eq!(manager.first().map(|step| step.id.as_str()), Some("a"));
    assert!(manager.get("form").is_some());
    assert!(manager.get("nope").is_none());
    assert_eq!(ids(&manager), vec!["a", "grid", "form", "always", "both"]);
}

#[test]
fn next_after_picks_first_eligible_step() {
    let manager = branching();
    let next = |step: &str, book: &AnswerBook| {
        manager
            .next_after(step, book)
            .map(|step| step.id.clone())
    };

    assert_eq!(next("a", &answered("grid")).as_deref(), Some("grid"));
    assert_eq!(next("a", &answered("form")).as_deref(), Some("form"));
    assert_eq!(next("a", &answered("list")).as_deref(), Some("always"));
    assert_eq!(next("grid", &answered("grid")).as_deref(), Some("always"));
}

#[test]
fn next_after_never_returns_an_excluded_step() {
    let manager = branching();
    for answer in ["grid", "form", "list"] {
        let book = answered(answer);
        let mut cursor = "a".to_string();
        while let Some(step) = manager.next_after(&cursor, &book) {
            assert!(wizard_spec::is_included(step.include_if.as_ref(), &book));
            cursor = step.id.clone();
        }
        assert_eq!(cursor, "always", "walk for {answer}");
    }
}

#[test]
fn next_after_conditions_see_later_answers() {
    let manager = branching();
    let book: AnswerBook = serde_json::from_value(json!({
        "a": { "x": "grid" },
        "grid": { "rows": 3 }
    }))
    .expect("answers");
    assert_eq!(
        manager.next_after("always", &book).map(|step| step.id.as_str()),
        Some("both")
    );
}

#[test]
fn next_after_handles_end_unknown_and_empty_answers() {
    let manager = branching();
    assert!(manager.next_after("both", &answered("grid")).is_none());
    assert!(manager.next_after("missing", &answered("grid")).is_none());
    assert_eq!(
        manager
            .next_after("a", &AnswerBook::new())
            .map(|step| step.id.as_str()),
        Some("always")
    );
}

#[test]
fn load_reports_path_on_bad_definitions() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("steps.json");
    fs::write(&path, r#"{ "steps": [ { "id": "a" }, { "id": "a" } ] }"#).expect("write");

    let err = StepManager::load(&path).expect_err("duplicate ids");
    let EngineError::Config { path: Some(reported), .. } = &err else {
        panic!("expected a config error, got {err:?}");
    };
    assert_eq!(reported, &path);
    assert!(err.to_string().contains("duplicate step id 'a'"));

    let missing = StepManager::load(dir.path().join("absent.json")).expect_err("missing");
    assert!(matches!(missing, EngineError::Config { .. }));
}

#[test]
fn load_reads_definition_files() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("steps.json");
    fs::write(
        &path,
        r#"{ "steps": [ { "id": "a", "fields": [ { "name": "x", "type": "string" } ] } ] }"#,
    )
    .expect("write");
    let manager = StepManager::load(&path).expect("load");
    assert_eq!(manager.first().expect("first").fields[0].name, "x");
}

#[test]
fn enrich_fills_options_without_touching_definition() {
    let manager = StepManager::from_json_str(
        &json!({
            "steps": [ { "id": "pick", "required_inputs": [
                { "name": "color", "type": "enum",
                  "options_source": { "type": "static", "values": [ { "value": "red" } ] } },
                { "name": "size", "type": "enum",
                  "options_source": { "type": "function", "name": "sizes",
                                      "args": { "db": { "$from": "answers.a.db" } } } },
                { "name": "note", "type": "string" }
            ] } ]
        })
        .to_string(),
    )
    .expect("definition");

    let mut registry = OptionRegistry::new();
    registry
        .register(
            "sizes",
            |_: &OptionContext, args: &Map<String, Value>| -> Result<Vec<Value>, ProviderError> {
                Ok(vec![json!({ "value": args.get("db").cloned().unwrap_or(Value::Null) })])
            },
        )
        .expect("register");

    let step = manager.first().expect("first");
    let enriched = manager
        .enrich(step, &WizardState::default(), &registry, None)
        .expect("enrich");

    assert_eq!(
        enriched.fields[0].options,
        Some(vec![json!({ "value": "red" })])
    );
    assert_eq!(enriched.fields[1].options, Some(vec![json!({ "value": null })]));
    assert_eq!(enriched.fields[2].options, None);
    assert!(step.fields.iter().all(|field: &FieldDefinition| field.options.is_none()));
    assert!(matches!(
        step.fields[0].options_source,
        Some(OptionSource::Static { .. })
    ));
}
