//! Per-scenario record of live resources and their teardown.
//!
//! Every scenario writes under its own [`ScenarioId`], so concurrent
//! scenarios only meet in the sharded map. Teardown removes every container
//! (continuing past failures), then every network, then the entry itself.

use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::container::LiveContainer;
use crate::engine::ContainerEngine;
use crate::error::{TeardownError, TeardownFailure, TeardownTarget};
use crate::network::LiveNetwork;
use crate::state::ScenarioId;

/// Live resources owned by one scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupEntry {
    networks: Vec<LiveNetwork>,
    containers: Vec<LiveContainer>,
}

impl GroupEntry {
    /// An entry with no resources.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a network. A network already present is not added twice.
    #[must_use]
    pub fn with_network(mut self, network: LiveNetwork) -> Self {
        self.push_network(network);
        self
    }

    /// Append a container.
    #[must_use]
    pub fn with_container(mut self, container: LiveContainer) -> Self {
        self.containers.push(container);
        self
    }

    /// Networks in build order.
    #[must_use]
    pub fn networks(&self) -> &[LiveNetwork] {
        &self.networks
    }

    fn push_network(&mut self, network: LiveNetwork) -> bool {
        if self.networks.iter().any(|known| known.id() == network.id()) {
            return false;
        }
        self.networks.push(network);
        true
    }

    /// Containers in build order.
    #[must_use]
    pub fn containers(&self) -> &[LiveContainer] {
        &self.containers
    }
}

/// What a successful teardown released.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// IDs of removed containers.
    pub containers_removed: Vec<String>,
    /// Engine names of removed networks.
    pub networks_removed: Vec<String>,
}

/// Concurrency-safe map from scenario to its live resources.
#[derive(Debug, Default)]
pub struct GroupRegistry {
    entries: DashMap<ScenarioId, GroupEntry>,
}

impl GroupRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `scenario_id`.
    pub fn register(&self, scenario_id: ScenarioId, entry: GroupEntry) {
        debug!(scenario_id = %scenario_id, containers = entry.containers.len(), "registering group");
        self.entries.insert(scenario_id, entry);
    }

    /// Add a network to the scenario's entry, creating it if needed.
    ///
    /// Recording the same network again is a no-op; a different network is
    /// kept alongside the ones already recorded.
    pub fn record_network(&self, scenario_id: &ScenarioId, network: LiveNetwork) {
        let name = String::from(network.name());
        let mut entry = self.entries.entry(scenario_id.clone()).or_default();
        if entry.push_network(network) {
            debug!(scenario_id = %scenario_id, network = %name, "recording network");
        }
    }

    /// Append a container to the scenario's entry, creating it if needed.
    pub fn record_container(&self, scenario_id: &ScenarioId, container: LiveContainer) {
        debug!(scenario_id = %scenario_id, container_id = %container.id(), "recording container");
        self.entries
            .entry(scenario_id.clone())
            .or_default()
            .containers
            .push(container);
    }

    /// A snapshot of the entry for `scenario_id`.
    #[must_use]
    pub fn get(&self, scenario_id: &ScenarioId) -> Option<GroupEntry> {
        self.entries.get(scenario_id).map(|entry| entry.clone())
    }

    /// Number of scenarios with live resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no scenario holds live resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tear down everything recorded for `scenario_id`.
    ///
    /// The entry is taken out of the registry first, so it is gone whatever
    /// the outcome. Containers are removed concurrently and every one is
    /// attempted; the networks are removed afterwards, in build order, again
    /// continuing past failures. An unknown scenario
    /// yields an empty report.
    ///
    /// # Errors
    ///
    /// Returns a [`TeardownError`] listing every resource the engine failed
    /// to remove.
    pub async fn destroy<E>(
        &self,
        engine: &E,
        scenario_id: &ScenarioId,
    ) -> Result<TeardownReport, TeardownError>
    where
        E: ContainerEngine + ?Sized,
    {
        let Some((_, entry)) = self.entries.remove(scenario_id) else {
            debug!(scenario_id = %scenario_id, "nothing to tear down");
            return Ok(TeardownReport::default());
        };

        let mut report = TeardownReport::default();
        let mut failures = vec![];

        let removals = entry.containers.iter().map(|container| async move {
            let outcome = engine.remove_container(container.id()).await;
            (container.id(), outcome)
        });
        for (container_id, outcome) in join_all(removals).await {
            match outcome {
                Ok(()) => {
                    debug!(scenario_id = %scenario_id, container_id, "removed container");
                    report.containers_removed.push(String::from(container_id));
                }
                Err(e) => {
                    warn!(
                        scenario_id = %scenario_id,
                        container_id,
                        error = %e,
                        "failed to remove container"
                    );
                    failures.push(TeardownFailure {
                        target: TeardownTarget::Container(String::from(container_id)),
                        message: e.to_string(),
                    });
                }
            }
        }

        for network in &entry.networks {
            match engine.remove_network(network.name()).await {
                Ok(()) => {
                    debug!(scenario_id = %scenario_id, network = %network.name(), "removed network");
                    report.networks_removed.push(String::from(network.name()));
                }
                Err(e) => {
                    warn!(
                        scenario_id = %scenario_id,
                        network = %network.name(),
                        error = %e,
                        "failed to remove network"
                    );
                    failures.push(TeardownFailure {
                        target: TeardownTarget::Network(String::from(network.name())),
                        message: e.to_string(),
                    });
                }
            }
        }

        if failures.is_empty() {
            info!(
                scenario_id = %scenario_id,
                containers = report.containers_removed.len(),
                networks = report.networks_removed.len(),
                "scenario torn down"
            );
            Ok(report)
        } else {
            Err(TeardownError {
                scenario_id: String::from(scenario_id.as_str()),
                failures,
            })
        }
    }
}
