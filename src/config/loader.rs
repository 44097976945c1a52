//! Configuration loading with layered precedence.
//!
//! Layers, lowest to highest: defaults, configuration file, environment
//! variables, command-line flags. The layers are composed by hand with
//! `MergeComposer` so typed environment variables can fail fast: an
//! unparseable `SCENARIOPOD_SUITE_CONCURRENCY=lots` is an error rather than a
//! silent fallback to the default.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::{DefaultEnv, Env};
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use super::{Cli, HarnessConfig};
use crate::error::{ConfigError, Result};

#[derive(Clone, Copy)]
enum EnvVarType {
    /// Always accepted.
    String,
    /// Unsigned integer; anything else is an error.
    U64,
}

struct EnvVarSpec {
    env_var: &'static str,
    path: &'static [&'static str],
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "SCENARIOPOD_ENGINE_SOCKET",
        path: &["engine_socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "SCENARIOPOD_SUITE_CONCURRENCY",
        path: &["suite", "concurrency"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "SCENARIOPOD_SUITE_TIMEOUT_SECS",
        path: &["suite", "timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "SCENARIOPOD_READINESS_POLL_INTERVAL_MS",
        path: &["readiness", "poll_interval_ms"],
        var_type: EnvVarType::U64,
    },
];

/// Environment variables read by [`load_config`].
///
/// `SCENARIOPOD_CONFIG_PATH` is read by file discovery and is not listed.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Load configuration from every layer, reading the process environment.
///
/// # Errors
///
/// Returns `ConfigError` when an explicit `--config` file is missing, a file
/// cannot be parsed, a typed environment variable is malformed, or the merged
/// layers do not deserialise.
pub fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    load_config_with_env(cli, &DefaultEnv::new())
}

/// [`load_config`] reading environment variables through `env`.
///
/// # Errors
///
/// As for [`load_config`].
pub fn load_config_with_env<E: Env>(cli: &Cli, env: &E) -> Result<HarnessConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(HarnessConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_path(cli)? {
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        HarnessConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    debug!(
        engine_socket = config.engine_socket.as_deref().unwrap_or("<resolved>"),
        concurrency = config.suite.concurrency,
        "loaded configuration"
    );
    Ok(config)
}

/// An explicit `--config` must exist; otherwise fall back to discovery.
fn config_path(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(explicit) = &cli.config {
        if explicit.exists() {
            return Ok(Some(explicit.clone()));
        }
        return Err(ConfigError::FileNotFound {
            path: explicit.clone().into_std_path_buf(),
        }
        .into());
    }

    let discovery = ConfigDiscovery::builder("scenariopod")
        .env_var("SCENARIOPOD_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".scenariopod.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|candidate| candidate.exists())
        .find_map(|candidate| Utf8PathBuf::try_from(candidate).ok()))
}

fn load_config_file(path: &Utf8Path, composer: &mut MergeComposer) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;
    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;
    let value = toml::from_str::<Value>(&content).map_err(|e| ConfigError::ParseError {
        message: format!("failed to parse {path}: {e}"),
    })?;

    debug!(path = %path, "loaded configuration file");
    composer.push_file(value, Some(path.to_path_buf()));
    Ok(())
}

fn collect_env_vars<E: Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.trim().parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: String::from(spec.env_var),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(String::from(segment))
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(String::from(field), value);
}

fn build_cli_overrides(cli: &Cli) -> Value {
    let mut overrides = Map::new();

    if let Some(socket) = &cli.engine_socket {
        overrides.insert(String::from("engine_socket"), Value::String(socket.clone()));
    }

    let mut suite = Map::new();
    if let Some(concurrency) = cli.concurrency {
        suite.insert(String::from("concurrency"), Value::from(concurrency));
    }
    if let Some(timeout_secs) = cli.timeout_secs {
        suite.insert(String::from("timeout_secs"), Value::from(timeout_secs));
    }
    if !suite.is_empty() {
        overrides.insert(String::from("suite"), Value::Object(suite));
    }

    if overrides.is_empty() {
        Value::Null
    } else {
        Value::Object(overrides)
    }
}
