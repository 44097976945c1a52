//! Deciding when a started container is usable.
//!
//! A waiter moves `Starting → WaitingForSignal → Ready` or
//! `Starting → WaitingForSignal → TimedOut`. Log and port policies poll at a
//! fixed interval until their condition holds or the startup timeout elapses.
//! A fixed delay always ends `Ready`; it cannot tell a slow service from a
//! broken one.

use std::future::Future;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationSignal;
use crate::container::{ContainerPort, LiveContainer};
use crate::engine::ContainerEngine;
use crate::error::{ReadinessError, Result};
use crate::network::AddressMode;

/// Default interval between readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Rule deciding when a container is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessPolicy {
    /// Ready once the combined output contains `pattern` literally.
    LogPattern {
        /// Text to look for.
        pattern: String,
        /// Startup timeout.
        timeout: Duration,
    },
    /// Ready once a TCP connection to the mapped `port` succeeds.
    PortListening {
        /// Declared container port.
        port: ContainerPort,
        /// Startup timeout.
        timeout: Duration,
    },
    /// Ready after an unconditional sleep.
    FixedDelay(Duration),
}

impl ReadinessPolicy {
    /// Human-readable description of the awaited condition.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::LogPattern { pattern, .. } => format!("log output containing '{pattern}'"),
            Self::PortListening { port, .. } => format!("port {port} accepting connections"),
            Self::FixedDelay(delay) => format!("fixed delay of {} ms", delay.as_millis()),
        }
    }
}

/// Progress of a readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    /// The container has started; no probe has run yet.
    Starting,
    /// Probing for the readiness condition.
    WaitingForSignal,
    /// The condition held.
    Ready,
    /// The startup timeout elapsed first.
    TimedOut,
}

/// Evaluates one [`ReadinessPolicy`] against a started container.
#[derive(Debug)]
pub struct ReadinessWaiter {
    poll_interval: Duration,
    state: WaitState,
}

impl ReadinessWaiter {
    /// Create a waiter probing every `poll_interval`.
    #[must_use]
    pub const fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            state: WaitState::Starting,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> WaitState {
        self.state
    }

    /// Block until `policy` holds for `container`.
    ///
    /// # Errors
    ///
    /// Returns `ReadinessError::Timeout` when the condition does not hold in
    /// time, `ProvisioningError::PortNotMapped` when a port policy names a port
    /// the engine did not publish, and `HarnessError::Cancelled` when the run
    /// is cancelled mid-wait.
    pub async fn wait<E>(
        &mut self,
        engine: &E,
        cancellation: &CancellationSignal,
        container: &LiveContainer,
        policy: &ReadinessPolicy,
    ) -> Result<()>
    where
        E: ContainerEngine + ?Sized,
    {
        self.state = WaitState::Starting;
        debug!(container_id = %container.id(), condition = %policy.describe(), "waiting for readiness");

        match policy {
            ReadinessPolicy::FixedDelay(delay) => {
                self.state = WaitState::WaitingForSignal;
                cancellation
                    .guard("fixed readiness delay", tokio::time::sleep(*delay))
                    .await?;
                self.state = WaitState::Ready;
                Ok(())
            }
            ReadinessPolicy::LogPattern { pattern, timeout } => {
                let container_id = container.id();
                let probe = move || async move {
                    match engine.container_logs(container_id).await {
                        Ok(output) => String::from_utf8_lossy(&output).contains(pattern.as_str()),
                        Err(e) => {
                            debug!(container_id, error = %e, "log probe failed");
                            false
                        }
                    }
                };
                self.poll(cancellation, container, policy, *timeout, probe)
                    .await
            }
            ReadinessPolicy::PortListening { port, timeout } => {
                let endpoint = container.endpoint(*port, AddressMode::External)?;
                let probe = || {
                    let host = endpoint.host.clone();
                    let host_port = endpoint.port;
                    async move { TcpStream::connect((host.as_str(), host_port)).await.is_ok() }
                };
                self.poll(cancellation, container, policy, *timeout, probe)
                    .await
            }
        }
    }

    async fn poll<F, Fut>(
        &mut self,
        cancellation: &CancellationSignal,
        container: &LiveContainer,
        policy: &ReadinessPolicy,
        timeout: Duration,
        mut probe: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.state = WaitState::WaitingForSignal;
        let interval = self.poll_interval;
        let polling = tokio::time::timeout(timeout, async {
            while !probe().await {
                tokio::time::sleep(interval).await;
            }
        });

        match cancellation.guard("readiness wait", polling).await? {
            Ok(()) => {
                self.state = WaitState::Ready;
                info!(container_id = %container.id(), "container ready");
                Ok(())
            }
            Err(_elapsed) => {
                self.state = WaitState::TimedOut;
                warn!(
                    container_id = %container.id(),
                    timeout_ms = timeout.as_millis(),
                    "container readiness timed out"
                );
                Err(ReadinessError::Timeout {
                    container_id: String::from(container.id()),
                    condition: policy.describe(),
                    timeout_ms: timeout.as_millis(),
                }
                .into())
            }
        }
    }
}

impl Default for ReadinessWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
