//! Tests for `thicket.toml` parsing and path handling.

use super::{CONFIG_FILE_NAME, Config, add_input, normalize_path};
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType;
use crate::runtime::interpreter::DEFAULT_MAX_STEPS;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn empty_config_uses_defaults() {
    let config = Config::from_toml("").expect("empty config should parse");
    assert_eq!(config, Config::default());
    assert_eq!(config.frame_allocation, FrameAllocation::EscapeAnalysis);
    assert_eq!(config.max_interpreter_steps, DEFAULT_MAX_STEPS);
    assert!(!config.dumps.any());
}

#[test]
fn config_fields_are_snake_case() {
    let config = Config::from_toml(
        r#"
frame_allocation = "always_heap"
emit_wasm = true
max_interpreter_steps = 500

[dumps]
layouts = true
"#,
    )
    .expect("config should parse");

    assert_eq!(config.frame_allocation, FrameAllocation::AlwaysHeap);
    assert!(config.emit_wasm);
    assert_eq!(config.max_interpreter_steps, 500);
    assert!(config.dumps.layouts);
    assert!(!config.dumps.lir);
}

#[test]
fn invalid_values_are_config_errors() {
    let error = Config::from_toml("frame_allocation = \"sometimes\"")
        .expect_err("unknown allocation policy");
    assert_eq!(error.error_type, ErrorType::Config);

    let error = Config::from_toml("max_interpreter_steps = 0").expect_err("zero steps");
    assert!(error.msg.contains("greater than zero"));
}

#[test]
fn config_survives_a_toml_round_trip() {
    let mut config = Config::default();
    config.frame_allocation = FrameAllocation::AlwaysHeap;
    config.output_dir = Some(PathBuf::from("out"));
    config.dumps.set_all(true);

    let text = config.to_toml().expect("config should serialize");
    assert_eq!(Config::from_toml(&text).expect("config should parse back"), config);
}

#[test]
fn find_in_falls_back_to_defaults() {
    let dir = tempdir().expect("temp dir should be created");
    assert_eq!(Config::find_in(dir.path()).unwrap(), Config::default());

    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "emit_wasm = true\n").unwrap();
    assert!(Config::find_in(dir.path()).unwrap().emit_wasm);
}

#[test]
fn load_errors_point_at_the_config_file() {
    let dir = tempdir().expect("temp dir should be created");
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "emit_wasm = \"yes\"\n").unwrap();

    let error = Config::load(&path).expect_err("emit_wasm must be a bool");
    assert_eq!(error.location.file.as_deref(), Some(path.as_path()));
}

#[test]
fn empty_paths_are_rejected() {
    let error = normalize_path("   ").expect_err("blank path");
    assert_eq!(error.error_type, ErrorType::Config);

    let mut inputs = Vec::new();
    assert!(add_input(&mut inputs, "").is_err());
    add_input(&mut inputs, "units/main.json").unwrap();
    add_input(&mut inputs, "other.json").unwrap();
    assert_eq!(inputs.len(), 2);
    assert_eq!(inputs[0], PathBuf::from("units").join("main.json"));
}
