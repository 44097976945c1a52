//! Scenario state for container lifecycle behavioural tests.

use std::net::TcpListener;
use std::sync::Arc;

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use scenariopod::cancellation::CancellationSignal;
use scenariopod::container::{ContainerDefinitionBuilder, LiveContainer};
use scenariopod::error::HarnessError;

use crate::fake_engine::FakeEngine;

/// Which layer a failed build reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    Provisioning,
    Readiness,
    Cancelled,
    Other,
}

impl From<&HarnessError> for FailureKind {
    fn from(error: &HarnessError) -> Self {
        match error {
            HarnessError::Provisioning(_) => Self::Provisioning,
            HarnessError::Readiness(_) => Self::Readiness,
            HarnessError::Cancelled { .. } => Self::Cancelled,
            _ => Self::Other,
        }
    }
}

/// Result of the build step.
#[derive(Debug, Clone)]
pub(crate) enum BuildResult {
    Live(LiveContainer),
    Failed { kind: FailureKind, message: String },
}

#[derive(Default, ScenarioState)]
pub(crate) struct LifecycleState {
    pub(crate) engine: Slot<Arc<FakeEngine>>,
    pub(crate) builder: Slot<ContainerDefinitionBuilder>,
    pub(crate) cancellation: Slot<CancellationSignal>,
    pub(crate) listener: Slot<Arc<TcpListener>>,
    pub(crate) result: Slot<BuildResult>,
}

#[fixture]
pub(crate) fn lifecycle_state() -> LifecycleState {
    let state = LifecycleState::default();
    state.cancellation.set(CancellationSignal::new());
    state
}
