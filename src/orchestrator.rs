//! Run-scoped owner of the engine, the group registry, and cancellation.
//!
//! One [`Orchestrator`] is built per test run and shared by reference with
//! every scenario's lifecycle hooks. A scenario's Before hook opens a
//! [`ScenarioSetup`] and builds through it, so whatever comes up is recorded
//! straight away and the After hook can tear it down even when setup failed
//! half way.

use std::sync::Arc;
use std::time::Duration;

use mockable::DefaultEnv;
use tracing::{debug, info};

use crate::cancellation::CancellationSignal;
use crate::config::HarnessConfig;
use crate::container::{ContainerDefinition, LiveContainer};
use crate::engine::{ContainerEngine, DockerEngine, EngineConnector, SocketResolver};
use crate::error::{Result, TeardownError};
use crate::network::{LiveNetwork, NetworkDefinition};
use crate::readiness::{DEFAULT_POLL_INTERVAL, ReadinessWaiter};
use crate::registry::{GroupRegistry, TeardownReport};
use crate::state::ScenarioId;

/// Owns the engine handle and the per-scenario resource registry.
#[derive(Debug)]
pub struct Orchestrator<E: ?Sized> {
    engine: Arc<E>,
    registry: GroupRegistry,
    cancellation: CancellationSignal,
    poll_interval: Duration,
}

impl Orchestrator<DockerEngine> {
    /// Connect to the engine named by `config` (or the environment) and
    /// verify it answers.
    ///
    /// # Errors
    ///
    /// Returns `EngineError` when the engine cannot be reached.
    pub async fn connect(config: &HarnessConfig) -> Result<Self> {
        let env = DefaultEnv::new();
        let resolver = SocketResolver::new(&env);
        let engine = EngineConnector::connect_with_fallback_and_verify_async(
            config.engine_socket.as_deref(),
            &resolver,
        )
        .await?;
        Ok(Self::from_config(Arc::new(engine), config))
    }
}

impl<E> Orchestrator<E>
where
    E: ContainerEngine + ?Sized,
{
    /// Orchestrate against `engine` with default settings.
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self {
            engine,
            registry: GroupRegistry::new(),
            cancellation: CancellationSignal::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Orchestrate against `engine` using the readiness settings in `config`.
    #[must_use]
    pub fn from_config(engine: Arc<E>, config: &HarnessConfig) -> Self {
        Self::new(engine).with_poll_interval(config.readiness.poll_interval())
    }

    /// Probe readiness every `interval`.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Share an existing cancellation signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationSignal) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Resources recorded so far, by scenario.
    #[must_use]
    pub const fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// The run's cancellation signal.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationSignal {
        &self.cancellation
    }

    /// Start building resources for `scenario_id`.
    pub fn setup(&self, scenario_id: impl Into<ScenarioId>) -> ScenarioSetup<'_, E> {
        let id = scenario_id.into();
        debug!(scenario_id = %id, "scenario setup started");
        ScenarioSetup {
            orchestrator: self,
            scenario_id: id,
        }
    }

    /// Remove everything recorded for `scenario_id`.
    ///
    /// Runs even after the run was cancelled.
    ///
    /// # Errors
    ///
    /// Returns the aggregated [`TeardownError`] when any resource survives.
    pub async fn teardown(
        &self,
        scenario_id: &ScenarioId,
    ) -> std::result::Result<TeardownReport, TeardownError> {
        self.registry.destroy(self.engine.as_ref(), scenario_id).await
    }
}

/// Builds one scenario's resources and records each as soon as it exists.
#[derive(Debug)]
pub struct ScenarioSetup<'a, E: ?Sized> {
    orchestrator: &'a Orchestrator<E>,
    scenario_id: ScenarioId,
}

impl<E> ScenarioSetup<'_, E>
where
    E: ContainerEngine + ?Sized,
{
    /// The scenario being set up.
    #[must_use]
    pub const fn scenario_id(&self) -> &ScenarioId {
        &self.scenario_id
    }

    /// Build `network` (once) and record it.
    ///
    /// # Errors
    ///
    /// As for [`NetworkDefinition::build`].
    pub async fn build_network(&self, network: &NetworkDefinition) -> Result<LiveNetwork> {
        let live = network
            .build(self.orchestrator.engine(), &self.orchestrator.cancellation)
            .await?
            .clone();
        self.orchestrator
            .registry
            .record_network(&self.scenario_id, live.clone());
        Ok(live)
    }

    /// Build `definition` and record the container.
    ///
    /// An attached network is built and recorded first. A container that
    /// fails to come up has already been removed and is not recorded.
    ///
    /// # Errors
    ///
    /// As for [`ContainerDefinition::build`].
    pub async fn build_container(&self, definition: &ContainerDefinition) -> Result<LiveContainer> {
        if let Some(network) = definition.network() {
            self.build_network(network).await?;
        }

        let live = definition
            .build_with_waiter(
                self.orchestrator.engine(),
                &self.orchestrator.cancellation,
                ReadinessWaiter::new(self.orchestrator.poll_interval),
            )
            .await?;
        info!(
            scenario_id = %self.scenario_id,
            container_id = %live.id(),
            "container ready for scenario"
        );
        self.orchestrator
            .registry
            .record_container(&self.scenario_id, live.clone());
        Ok(live)
    }
}
