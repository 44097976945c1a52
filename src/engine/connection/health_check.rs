//! Connect-and-verify helpers: every connection is pinged before use.

use std::time::Duration;

use bollard::Docker;

use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS, SocketResolver};
use crate::engine::DockerEngine;
use crate::error::{EngineError, HarnessError};

impl EngineConnector {
    async fn ping_with_timeout(docker: &Docker) -> Result<(), HarnessError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                HarnessError::from(EngineError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| {
                HarnessError::from(EngineError::HealthCheckFailed {
                    message: e.to_string(),
                })
            })?;
        Ok(())
    }

    async fn connect_then_verify<F>(connect_fn: F) -> Result<DockerEngine, HarnessError>
    where
        F: FnOnce() -> Result<DockerEngine, HarnessError>,
    {
        let engine = connect_fn()?;
        Self::ping_with_timeout(engine.docker()).await?;
        Ok(engine)
    }

    /// Connect to `socket` and confirm the engine answers a ping.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed`, `EngineError::HealthCheckFailed`
    /// or `EngineError::HealthCheckTimeout`.
    pub async fn connect_and_verify_async(
        socket: impl AsRef<str>,
    ) -> Result<DockerEngine, HarnessError> {
        let socket_str = socket.as_ref();
        Self::connect_then_verify(|| Self::connect_engine(socket_str)).await
    }

    /// Resolve the endpoint, connect, and confirm the engine answers a ping.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::ConnectionFailed`, `EngineError::HealthCheckFailed`
    /// or `EngineError::HealthCheckTimeout`.
    pub async fn connect_with_fallback_and_verify_async<E: mockable::Env>(
        config_socket: Option<&str>,
        resolver: &SocketResolver<'_, E>,
    ) -> Result<DockerEngine, HarnessError> {
        Self::connect_then_verify(|| Self::connect_with_fallback(config_socket, resolver)).await
    }
}
