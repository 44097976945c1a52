//! Endpoint resolution and container engine connection.
//!
//! The endpoint is taken from explicit configuration first, then from the
//! conventional engine environment variables, then from the platform default.
//! Connecting yields a [`DockerEngine`] whose published-port host is derived
//! from the endpoint itself.

use bollard::Docker;
use tracing::debug;

use super::client::DockerEngine;
use crate::error::{EngineError, HarnessError};

mod health_check;

/// Environment variable names checked in fallback order after configuration sources.
const FALLBACK_ENV_VARS: &[&str] = &["DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

/// Connection timeout in seconds for engine API calls.
const CONNECTION_TIMEOUT_SECS: u64 = 120;

/// Timeout in seconds for the health-check ping.
const HEALTH_CHECK_TIMEOUT_SECS: u64 = 10;

/// Host reported for published ports when the engine is reached over a local socket.
const LOCAL_HOST: &str = "localhost";

#[cfg(unix)]
const DEFAULT_SOCKET: &str = "unix:///var/run/docker.sock";

#[cfg(windows)]
const DEFAULT_SOCKET: &str = "npipe:////./pipe/docker_engine";

/// Resolves engine endpoints from environment variables.
///
/// # Example
///
/// ```ignore
/// use mockable::DefaultEnv;
/// use scenariopod::engine::SocketResolver;
///
/// let env = DefaultEnv::new();
/// let resolver = SocketResolver::new(&env);
/// let _socket = resolver
///     .resolve_from_env()
///     .unwrap_or_else(|| String::from(SocketResolver::<DefaultEnv>::default_socket()));
/// ```
pub struct SocketResolver<'a, E: mockable::Env> {
    env: &'a E,
}

impl<'a, E: mockable::Env> SocketResolver<'a, E> {
    /// Creates a resolver reading through `env`.
    #[must_use]
    pub const fn new(env: &'a E) -> Self {
        Self { env }
    }

    /// Returns the first non-empty value of `DOCKER_HOST`, `CONTAINER_HOST`,
    /// or `PODMAN_HOST`, checked in that order.
    #[must_use]
    pub fn resolve_from_env(&self) -> Option<String> {
        FALLBACK_ENV_VARS
            .iter()
            .filter_map(|var_name| self.env.string(var_name))
            .find(|value| !value.is_empty())
    }

    /// Returns the platform default endpoint.
    #[must_use]
    pub const fn default_socket() -> &'static str {
        DEFAULT_SOCKET
    }
}

/// Endpoint classification by scheme.
enum SocketType {
    /// Unix socket or Windows named pipe with explicit scheme.
    Socket,
    /// `tcp://`, `http://`, or `https://` endpoint.
    Http,
    /// Path without any scheme.
    BarePath,
}

impl SocketType {
    fn is_socket_scheme(socket: &str) -> bool {
        socket.starts_with("unix://") || socket.starts_with("npipe://")
    }

    fn is_http_scheme(socket: &str) -> bool {
        socket.starts_with("tcp://")
            || socket.starts_with("http://")
            || socket.starts_with("https://")
    }

    fn classify(socket: &str) -> Self {
        match (Self::is_socket_scheme(socket), Self::is_http_scheme(socket)) {
            (true, _) => Self::Socket,
            (_, true) => Self::Http,
            _ => Self::BarePath,
        }
    }
}

/// Connects to Docker-compatible container engines.
pub struct EngineConnector;

impl EngineConnector {
    /// Connect to the engine at `socket` without contacting it.
    ///
    /// Accepts `unix://`, `npipe://`, `tcp://` (sent as HTTP), `http://`,
    /// `https://`, and bare paths. Bare paths starting with `\\` or `//` are
    /// treated as named pipes; anything else as a Unix socket.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed` if the client cannot be
    /// configured for the endpoint.
    pub fn connect(socket: &str) -> Result<Docker, HarnessError> {
        let docker = match SocketType::classify(socket) {
            SocketType::Socket => Docker::connect_with_socket(
                socket,
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
            SocketType::Http => {
                let http_socket = if socket.starts_with("tcp://") {
                    socket.replacen("tcp://", "http://", 1)
                } else {
                    socket.to_owned()
                };
                Docker::connect_with_http(
                    &http_socket,
                    CONNECTION_TIMEOUT_SECS,
                    bollard::API_DEFAULT_VERSION,
                )
            }
            SocketType::BarePath => Docker::connect_with_socket(
                &Self::normalize_bare_path(socket),
                CONNECTION_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| {
            HarnessError::from(EngineError::ConnectionFailed {
                message: e.to_string(),
            })
        })?;

        debug!(socket, "configured container engine client");
        Ok(docker)
    }

    /// Connect to `socket` and wrap the client as a [`DockerEngine`].
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed` if the client cannot be
    /// configured for the endpoint.
    pub fn connect_engine(socket: &str) -> Result<DockerEngine, HarnessError> {
        let docker = Self::connect(socket)?;
        Ok(DockerEngine::new(docker, Self::published_host(socket)))
    }

    /// Connect using the resolved endpoint.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed` if the client cannot be
    /// configured for the endpoint.
    pub fn connect_with_fallback<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<DockerEngine, HarnessError> {
        let socket = Self::resolve_socket(config_socket, resolver);
        Self::connect_engine(&socket)
    }

    /// Resolve the endpoint without connecting.
    ///
    /// Resolution order:
    /// 1. `config_socket` (from CLI, config file, or `SCENARIOPOD_ENGINE_SOCKET`)
    /// 2. `DOCKER_HOST`, `CONTAINER_HOST`, `PODMAN_HOST`
    /// 3. Platform default
    #[must_use]
    pub fn resolve_socket<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> String {
        config_socket
            .filter(|s| !s.is_empty())
            .map(String::from)
            .or_else(|| resolver.resolve_from_env())
            .unwrap_or_else(|| SocketResolver::<E>::default_socket().to_owned())
    }

    /// Host name under which ports published by the engine at `socket` are
    /// reachable from the test process.
    ///
    /// Local sockets publish on `localhost`; remote endpoints publish on the
    /// endpoint's own host.
    #[must_use]
    pub fn published_host(socket: &str) -> String {
        match SocketType::classify(socket) {
            SocketType::Http => remote_host(socket).unwrap_or_else(|| String::from(LOCAL_HOST)),
            SocketType::Socket | SocketType::BarePath => String::from(LOCAL_HOST),
        }
    }

    fn normalize_bare_path(path: &str) -> String {
        if path.starts_with("\\\\") || path.starts_with("//") {
            format!("npipe://{path}")
        } else {
            format!("unix://{path}")
        }
    }
}

fn remote_host(socket: &str) -> Option<String> {
    let (_, rest) = socket.split_once("://")?;
    let authority = rest.split('/').next().unwrap_or_default();
    let host = authority.strip_prefix('[').map_or_else(
        || authority.split(':').next().unwrap_or_default(),
        |bracketed| bracketed.split(']').next().unwrap_or_default(),
    );
    (!host.is_empty()).then(|| String::from(host))
}
