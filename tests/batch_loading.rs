//! Loading test batches and pipeline definitions from disk

use promptcheck::core::PipelineConfig;
use promptcheck::testing::{load_test_cases, BatchError};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

fn file_with(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_cases_in_file_order() {
    let file = file_with(
        r#"[
            {"id": "b", "params": {"name": "World"}, "expected_output": "Hello World"},
            {"id": "a", "expected_output": {"label": "spam"}, "comparator": "subset"}
        ]"#,
    );

    let cases = load_test_cases(file.path()).unwrap();

    assert_eq!(cases.len(), 2);
    assert_eq!(cases[0].id, "b");
    assert_eq!(cases[0].params["name"], json!("World"));
    assert_eq!(cases[1].id, "a");
    assert!(cases[1].params.is_empty());
    assert_eq!(cases[1].comparator_name(), Some("subset"));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let error = load_test_cases(&missing).unwrap_err();

    assert!(matches!(error, BatchError::Io { .. }), "{:?}", error);
    assert!(error.to_string().contains("nope.json"));
}

#[test]
fn invalid_batch_names_the_file() {
    let file = file_with(r#"[{"id": 7, "expected_output": 1}]"#);

    let error = load_test_cases(file.path()).unwrap_err();

    assert!(matches!(error, BatchError::Invalid(_)), "{:?}", error);
    let message = error.to_string();
    assert!(message.contains("test case #0"), "{}", message);
    assert!(message.contains(&file.path().display().to_string()), "{}", message);
}

#[test]
fn malformed_json_is_rejected() {
    let file = file_with("[{\"id\": \"a\",");
    assert!(matches!(
        load_test_cases(file.path()),
        Err(BatchError::Invalid(_))
    ));
}

#[test]
fn pipeline_definition_from_file() {
    let file = file_with(
        r#"
name: "Greeter"
prompt:
  user: "Hello {name}"
client:
  model: "gpt-4o"
"#,
    );

    let definition = PipelineConfig::from_file(file.path()).unwrap();

    assert_eq!(definition.name, "Greeter");
    assert_eq!(definition.client.model.as_deref(), Some("gpt-4o"));
}

#[test]
fn broken_pipeline_definition_names_the_file() {
    let file = file_with("name: \"\"\nprompt:\n  user: \"hi\"\n");

    let error = PipelineConfig::from_file(file.path()).unwrap_err();

    assert!(format!("{:#}", error).contains("name must not be empty"));
    assert!(error
        .to_string()
        .contains(&file.path().display().to_string()));
}
