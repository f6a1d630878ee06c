//! Integration tests for configuration files and binding persistence.
//!
//! Tests verify that configuration and stored bindings survive a trip
//! through the file system.

use inputbind::config::{EngineConfig, RECORD_AXIS_THRESHOLD};
use inputbind::{Binding, BindingTable, DeviceId, InputIdentifier, Key};
use std::fs;
use std::path::PathBuf;

/// Returns a unique temporary file path for test isolation.
fn get_test_file_path(name: &str) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!(
        "inputbind_integration_test_{}_{}.toml",
        name,
        std::process::id()
    ));
    path
}

/// Removes a test file if it exists.
fn cleanup_test_file(path: &PathBuf) {
    let _ = fs::remove_file(path);
}

/// Tests configuration save and load cycle preserves data.
#[test]
fn test_config_round_trip() {
    let path = get_test_file_path("round_trip");

    let config = EngineConfig {
        buffer_size: 64,
        record_axis_threshold: 0.4,
        polling_thread_name: "poll".to_string(),
        delivery_thread_name: "deliver".to_string(),
    };

    config.save_to_file(&path).expect("Failed to save config");
    let loaded = EngineConfig::load_from_file(&path).expect("Failed to load config");

    assert_eq!(loaded, config);

    cleanup_test_file(&path);
}

/// Tests that a missing file is created with defaults.
#[test]
fn test_config_load_or_create() {
    let path = get_test_file_path("load_or_create");
    cleanup_test_file(&path);

    let created = EngineConfig::load_or_create(&path).expect("Failed to create config");
    assert_eq!(created, EngineConfig::default());
    assert!(path.exists());

    let loaded = EngineConfig::load_or_create(&path).expect("Failed to load config");
    assert_eq!(loaded, created);

    cleanup_test_file(&path);
}

/// Tests that out-of-range values are clamped on load.
#[test]
fn test_config_validation_on_load() {
    let path = get_test_file_path("validation");

    fs::write(&path, "buffer_size = 0\nrecord_axis_threshold = 0.0\n").unwrap();
    let config = EngineConfig::load_from_file(&path).expect("Failed to load config");

    assert_eq!(config.buffer_size, 1);
    assert_eq!(config.record_axis_threshold, RECORD_AXIS_THRESHOLD);

    cleanup_test_file(&path);
}

/// Tests that the saved file carries comments and stays valid TOML.
#[test]
fn test_config_file_format_preservation() {
    let path = get_test_file_path("format");

    EngineConfig::default().save_to_file(&path).unwrap();
    let content = fs::read_to_string(&path).unwrap();

    assert!(content.contains("buffer_size = 10"));
    assert!(content.contains('#'));
    assert!(toml::from_str::<toml::Table>(&content).is_ok());

    cleanup_test_file(&path);
}

/// Tests that a malformed file is reported.
#[test]
fn test_config_invalid_toml() {
    let path = get_test_file_path("invalid");

    fs::write(&path, "buffer_size = [").unwrap();
    assert!(EngineConfig::load_from_file(&path).is_err());

    cleanup_test_file(&path);
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredBinding {
    input: InputIdentifier,
    command: String,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredBindings {
    bindings: Vec<StoredBinding>,
}

/// Tests that bindings written as TOML load back into an identical table.
#[test]
fn test_bindings_persist_through_toml() {
    let path = get_test_file_path("bindings");
    let pad = DeviceId::from_u128(0x77aa0000_1234_11ef_8000_444553540000);

    let stored = StoredBindings {
        bindings: vec![
            StoredBinding {
                input: InputIdentifier::keys(Key::Space),
                command: "jump".to_string(),
            },
            StoredBinding {
                input: InputIdentifier::mouse_button(0),
                command: "fire".to_string(),
            },
            StoredBinding {
                input: InputIdentifier::joystick(pad, 4, None),
                command: "throttle".to_string(),
            },
        ],
    };
    fs::write(&path, toml::to_string(&stored).unwrap()).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    let loaded: StoredBindings = toml::from_str(&content).unwrap();

    let mut table = BindingTable::new();
    table
        .set_bindings(
            loaded
                .bindings
                .into_iter()
                .map(|b| Binding::new(b.input, b.command)),
        )
        .unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(
        table.resolve(&InputIdentifier::keys(Key::Space)).map(String::as_str),
        Some("jump")
    );
    assert_eq!(table.resolve_joystick(pad, 4).map(String::as_str), Some("throttle"));

    cleanup_test_file(&path);
}

/// Tests that stored text forms, legacy key names included, are accepted
/// directly as binding inputs.
#[test]
fn test_bindings_from_stored_text() {
    let keyboard = DeviceId::SYSTEM_KEYBOARD;
    let mut table = BindingTable::new();
    table
        .set_bindings([
            Binding::new(format!("{}|NumPad0", keyboard), 1),
            Binding::new(format!("{}|LeftControl+Prior", keyboard), 2),
        ])
        .unwrap();

    assert_eq!(table.resolve(&InputIdentifier::keys(Key::NumberPad0)), Some(&1));
    let chord = inputbind::Chord::new([Key::LeftControl, Key::PageUp]).unwrap();
    assert_eq!(table.resolve_chord(&chord), Some(&2));
}
