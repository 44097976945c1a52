//! Semantic error types for scenariopod.
//!
//! Each failure domain gets its own `thiserror` enum so callers can tell a
//! configuration mistake from an engine fault, a readiness timeout, a cleanup
//! failure, or a cancelled run. [`HarnessError`] aggregates them. Opaque
//! `eyre::Report` values only appear at the step boundary (see
//! [`crate::suite`]).

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while validating definitions or loading configuration.
///
/// These are always detected before any engine call is attempted.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the expected path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path where the configuration file was expected.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// A file-injection option was given an empty file list.
    #[error("{option} requires at least one file")]
    EmptyFileList {
        /// The option that received no files.
        option: &'static str,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while connecting to the container engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to connect to the container engine endpoint.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The engine did not answer the health-check ping correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// The health-check ping timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },
}

/// Engine-level failures while creating networks or containers.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// The engine refused to create a network.
    #[error("failed to create network '{alias}': {message}")]
    NetworkCreateFailed {
        /// Alias of the network definition.
        alias: String,
        /// A description of the engine failure.
        message: String,
    },

    /// Building an image from a build context failed.
    #[error("failed to build image from '{context}': {message}")]
    ImageBuildFailed {
        /// The build-context directory.
        context: String,
        /// A description of the build failure.
        message: String,
    },

    /// The engine refused to create a container.
    #[error("failed to create container: {message}")]
    CreateFailed {
        /// A description of the creation failure.
        message: String,
    },

    /// Copying file payloads into a container failed.
    #[error("failed to upload files to container '{container_id}': {message}")]
    UploadFailed {
        /// The ID of the target container.
        container_id: String,
        /// A description of the upload failure.
        message: String,
    },

    /// The engine failed to start a created container.
    #[error("failed to start container '{container_id}': {message}")]
    StartFailed {
        /// The ID of the container that failed to start.
        container_id: String,
        /// A description of the start failure.
        message: String,
    },

    /// Inspecting a started container failed.
    #[error("failed to inspect container '{container_id}': {message}")]
    InspectFailed {
        /// The ID of the inspected container.
        container_id: String,
        /// A description of the inspect failure.
        message: String,
    },

    /// The engine reported no host binding for a declared port.
    #[error("port {port} is not mapped for container '{container_id}'")]
    PortNotMapped {
        /// The ID of the container.
        container_id: String,
        /// The declared container port.
        port: String,
    },
}

/// Readiness signal not observed in time.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The readiness condition did not hold before the startup timeout.
    #[error("container '{container_id}' not ready after {timeout_ms} ms waiting for {condition}")]
    Timeout {
        /// The ID of the container being waited on.
        container_id: String,
        /// Human-readable description of the awaited condition.
        condition: String,
        /// The startup timeout in milliseconds.
        timeout_ms: u128,
    },
}

/// Which resource a teardown failure concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownTarget {
    /// A container, by ID.
    Container(String),
    /// A network, by engine name.
    Network(String),
}

impl fmt::Display for TeardownTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container(id) => write!(f, "container '{id}'"),
            Self::Network(name) => write!(f, "network '{name}'"),
        }
    }
}

/// A single resource that could not be released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    /// The resource that failed to release.
    pub target: TeardownTarget,
    /// A description of the engine failure.
    pub message: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.target, self.message)
    }
}

/// Aggregated cleanup failures for one scenario.
///
/// Teardown never stops at the first failure, so this carries every resource
/// that could not be released.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("teardown of scenario '{scenario_id}' left {} resource(s) behind: {}", .failures.len(), render_failures(.failures))]
pub struct TeardownError {
    /// The scenario whose entry was being torn down.
    pub scenario_id: String,
    /// Every individual failure, in teardown order.
    pub failures: Vec<TeardownFailure>,
}

fn render_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur while reading host files.
#[derive(Debug, Error)]
pub enum FilesystemError {
    /// A file or directory was not found.
    #[error("path not found: {path}")]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Permission denied when accessing a path.
    #[error("permission denied: {path}")]
    PermissionDenied {
        /// The path that could not be accessed.
        path: PathBuf,
    },

    /// An I/O error occurred.
    #[error("I/O error at '{path}': {message}")]
    IoError {
        /// The path where the error occurred.
        path: PathBuf,
        /// A description of the I/O error.
        message: String,
    },
}

impl FilesystemError {
    /// Classify an I/O error observed at `path`.
    #[must_use]
    pub fn from_io(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let path_buf = path.into();
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path: path_buf },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path_buf },
            _ => Self::IoError {
                path: path_buf,
                message: error.to_string(),
            },
        }
    }
}

/// Top-level error type for scenariopod.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Invalid configuration or definition.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine could not be reached.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The engine failed to create a resource.
    #[error(transparent)]
    Provisioning(#[from] ProvisioningError),

    /// A container never became ready.
    #[error(transparent)]
    Readiness(#[from] ReadinessError),

    /// Cleanup left resources behind.
    #[error(transparent)]
    Teardown(#[from] TeardownError),

    /// Host filesystem access failed.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    /// The run was cancelled while an operation was in flight.
    #[error("operation '{operation}' cancelled")]
    Cancelled {
        /// The operation that observed the cancellation.
        operation: String,
    },
}

impl HarnessError {
    /// Returns true when the error was caused by run cancellation rather than
    /// an engine fault.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// A specialised `Result` type for scenariopod operations.
pub type Result<T> = std::result::Result<T, HarnessError>;
