//! Scenario networks and address derivation.
//!
//! A [`NetworkDefinition`] creates at most one engine network no matter how
//! many containers ask for it. Containers attached to it are reachable from
//! each other under the network alias and their declared ports; the test
//! process reaches them through the engine host and the mapped ports. The
//! caller picks which with [`AddressMode`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bollard::models::NetworkCreateRequest;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationSignal;
use crate::engine::ContainerEngine;
use crate::error::{HarnessError, ProvisioningError, Result};

const DEFAULT_ALIAS: &str = "network";

static NEXT_NETWORK: AtomicU64 = AtomicU64::new(1);

/// Network driver requested from the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NetworkDriver {
    /// Single-host bridge network.
    #[default]
    Bridge,
    /// Any other driver, by engine name.
    Custom(String),
}

impl NetworkDriver {
    /// Engine name of the driver.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bridge => "bridge",
            Self::Custom(name) => name,
        }
    }
}

/// How a container address is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// From the test process: engine host and mapped port.
    External,
    /// From another container on the same network: alias and declared port.
    Internal,
}

/// A host and port pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or address.
    pub host: String,
    /// TCP or UDP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Render as `scheme://host:port`.
    #[must_use]
    pub fn url(&self, scheme: &str) -> String {
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

/// Renders as `host=<host> port=<port>`, the key/value form understood by
/// libpq-style connection strings.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host={} port={}", self.host, self.port)
    }
}

/// A network that exists on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveNetwork {
    id: String,
    name: String,
    alias: String,
}

impl LiveNetwork {
    /// Describe a network that already exists on the engine.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            alias: alias.into(),
        }
    }

    /// Engine-assigned network ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine network name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable alias from the definition.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

/// Declarative network with a lazily created, cached engine instance.
#[derive(Debug)]
pub struct NetworkDefinition {
    alias: String,
    driver: NetworkDriver,
    name: String,
    live: OnceCell<LiveNetwork>,
}

impl NetworkDefinition {
    /// Create a bridge network definition aliased `"network"`.
    #[must_use]
    pub fn new() -> Self {
        let sequence = NEXT_NETWORK.fetch_add(1, Ordering::Relaxed);
        Self {
            alias: String::from(DEFAULT_ALIAS),
            driver: NetworkDriver::default(),
            name: format!("scenariopod-net-{}-{sequence}", std::process::id()),
            live: OnceCell::new(),
        }
    }

    /// Set the alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Set the driver.
    #[must_use]
    pub fn with_driver(mut self, driver: NetworkDriver) -> Self {
        self.driver = driver;
        self
    }

    /// The alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The requested driver.
    #[must_use]
    pub const fn driver(&self) -> &NetworkDriver {
        &self.driver
    }

    /// The engine name used on creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live network, once built.
    #[must_use]
    pub fn live(&self) -> Option<&LiveNetwork> {
        self.live.get()
    }

    /// Create the network, or return the one created by an earlier call.
    ///
    /// Concurrent first calls create exactly one network. A failed call
    /// leaves the definition unbuilt so it can be retried.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningError::NetworkCreateFailed` when the engine
    /// refuses the request, or `HarnessError::Cancelled` when the run is
    /// cancelled. A network that finishes creation after cancellation is
    /// removed again before the error is returned.
    pub async fn build<E>(
        &self,
        engine: &E,
        cancellation: &CancellationSignal,
    ) -> Result<&LiveNetwork>
    where
        E: ContainerEngine + ?Sized,
    {
        if let Some(live) = self.live.get() {
            debug!(network = %self.name, alias = %self.alias, "reusing network");
            return Ok(live);
        }

        self.live
            .get_or_try_init(|| async {
                let request = NetworkCreateRequest {
                    name: self.name.clone(),
                    driver: Some(String::from(self.driver.as_str())),
                    ..NetworkCreateRequest::default()
                };
                cancellation.check("create network")?;
                let response = engine.create_network(request).await.map_err(|e| {
                    ProvisioningError::NetworkCreateFailed {
                        alias: self.alias.clone(),
                        message: e.to_string(),
                    }
                })?;
                info!(network = %self.name, alias = %self.alias, "created network");

                if let Err(error) = cancellation.check("create network") {
                    self.discard(engine).await;
                    return Err(error);
                }
                Ok::<_, HarnessError>(LiveNetwork {
                    id: response.id,
                    name: self.name.clone(),
                    alias: self.alias.clone(),
                })
            })
            .await
    }

    async fn discard<E>(&self, engine: &E)
    where
        E: ContainerEngine + ?Sized,
    {
        match engine.remove_network(&self.name).await {
            Ok(()) => debug!(network = %self.name, "removed network created after cancellation"),
            Err(e) => warn!(
                network = %self.name,
                error = %e,
                "failed to remove network created after cancellation"
            ),
        }
    }
}

impl Default for NetworkDefinition {
    fn default() -> Self {
        Self::new()
    }
}
