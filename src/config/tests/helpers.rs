//! Shared fixtures and helper functions for config tests.

use std::sync::Arc;

use ortho_config::MergeComposer;
use ortho_config::serde_json::json;
use rstest::fixture;

use crate::config::HarnessConfig;

/// Fixture providing a `HarnessConfig` parsed from a full TOML example.
#[fixture]
pub fn config_from_full_toml() -> HarnessConfig {
    let toml = r#"
        engine_socket = "unix:///run/podman/podman.sock"

        [suite]
        concurrency = 8
        timeout_secs = 900

        [readiness]
        poll_interval_ms = 250
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Fixture providing a `HarnessConfig` parsed from a minimal TOML example.
#[fixture]
pub fn config_from_partial_toml() -> HarnessConfig {
    let toml = r#"
        [suite]
        timeout_secs = 60
    "#;

    toml::from_str(toml).expect("TOML parsing should succeed")
}

/// Creates a `MergeComposer` with the serialised defaults layer pushed.
pub fn create_composer_with_defaults() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = MergeComposer::new();
    let defaults = ortho_config::serde_json::to_value(HarnessConfig::default())?;
    composer.push_defaults(defaults);
    Ok(composer)
}

/// Creates a composer with defaults, a file layer, and an environment layer.
pub fn create_composer_with_file_and_env() -> Result<MergeComposer, serde_json::Error> {
    let mut composer = create_composer_with_defaults()?;
    composer.push_file(
        json!({
            "engine_socket": "unix:///from/file.sock",
            "suite": { "concurrency": 2, "timeout_secs": 120 }
        }),
        None,
    );
    composer.push_environment(json!({
        "engine_socket": "unix:///from/env.sock"
    }));
    Ok(composer)
}

/// Merges the composer's layers into a `HarnessConfig`.
pub fn merge_config(
    composer: MergeComposer,
) -> Result<HarnessConfig, Arc<ortho_config::OrthoError>> {
    HarnessConfig::merge_from_layers(composer.layers())
}

/// Asserts every field holds its default.
pub fn assert_config_has_defaults(config: &HarnessConfig) {
    assert!(config.engine_socket.is_none(), "engine_socket should be None");
    assert_eq!(config.suite.concurrency, 4, "suite.concurrency should be 4");
    assert!(config.suite.timeout_secs.is_none(), "suite.timeout_secs should be None");
    assert_eq!(
        config.readiness.poll_interval_ms, 100,
        "readiness.poll_interval_ms should be 100"
    );
}
