//! Given/when steps for group teardown scenarios.

use std::sync::Arc;

use rstest_bdd_macros::{given, when};
use scenariopod::container::ContainerDefinition;
use scenariopod::network::NetworkDefinition;
use scenariopod::orchestrator::Orchestrator;
use scenariopod::state::{ScenarioContext, ScenarioState};
use scenariopod::suite::{HookFuture, ScenarioHooks, ScenarioPlan, Suite};

use super::StepResult;
use super::state::TeardownState;
use crate::fake_engine::FakeEngine;

fn runtime() -> StepResult<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
}

fn redis(network: Option<&Arc<NetworkDefinition>>) -> StepResult<ContainerDefinition> {
    network
        .into_iter()
        .fold(
            ContainerDefinition::builder().with_image("redis:7"),
            |builder, shared| builder.with_network(Arc::clone(shared)),
        )
        .finish()
        .map_err(|e| e.to_string())
}

fn provision(
    teardown_state: &TeardownState,
    scenario: &str,
    count: usize,
    network: Option<Arc<NetworkDefinition>>,
) -> StepResult<()> {
    let orchestrator = teardown_state.orchestrator()?;
    let definition = redis(network.as_ref())?;

    let outcome = runtime()?.block_on(async {
        let setup = orchestrator.setup(scenario);
        for _ in 0..count {
            setup.build_container(&definition).await?;
        }
        Ok::<_, scenariopod::error::HarnessError>(())
    });
    if let Err(error) = outcome {
        teardown_state.setup_error.set(error.to_string());
    }
    Ok(())
}

#[given("an orchestrator over an in-memory engine")]
fn orchestrator_over_fake(teardown_state: &TeardownState) {
    teardown_state
        .orchestrator
        .set(Arc::new(Orchestrator::new(Arc::new(FakeEngine::default()))));
}

#[given("the engine refuses to remove {container_id}")]
fn engine_refuses_removal(teardown_state: &TeardownState, container_id: String) -> StepResult<()> {
    teardown_state
        .orchestrator()?
        .engine()
        .fail_removal_of(&container_id);
    Ok(())
}

#[given("the engine fails to start container {nth}")]
fn engine_fails_start(teardown_state: &TeardownState, nth: u32) -> StepResult<()> {
    teardown_state.orchestrator()?.engine().fail_start_of(nth);
    Ok(())
}

#[when("scenario {scenario} provisions {count} containers on a shared network")]
fn provisions_on_network(
    teardown_state: &TeardownState,
    scenario: String,
    count: usize,
) -> StepResult<()> {
    let network = Arc::new(NetworkDefinition::new().with_alias("backend"));
    provision(teardown_state, &scenario, count, Some(network))
}

#[when("scenario {scenario} provisions {count} containers without a network")]
fn provisions_without_network(
    teardown_state: &TeardownState,
    scenario: String,
    count: usize,
) -> StepResult<()> {
    provision(teardown_state, &scenario, count, None)
}

#[when("scenario {scenario} is torn down")]
fn scenario_is_torn_down(teardown_state: &TeardownState, scenario: String) -> StepResult<()> {
    let orchestrator = teardown_state.orchestrator()?;
    let outcome = runtime()?.block_on(orchestrator.teardown(&scenario.as_str().into()));
    let failures = outcome.map_or_else(|error| error.failures.len(), |_| 0);
    teardown_state.teardown_failures.set(failures);
    Ok(())
}

/// Provisions one container per scenario and hands its ID to the steps.
struct OneContainerHooks {
    definition: ContainerDefinition,
}

fn container_slot() -> ScenarioState<String> {
    ScenarioState::new().with_key("container")
}

impl ScenarioHooks<FakeEngine> for OneContainerHooks {
    fn before<'a>(
        &'a self,
        orchestrator: &'a Orchestrator<FakeEngine>,
        ctx: ScenarioContext,
    ) -> HookFuture<'a, scenariopod::error::Result<ScenarioContext>> {
        Box::pin(async move {
            let live = orchestrator
                .setup(ctx.scenario_id().clone())
                .build_container(&self.definition)
                .await?;
            Ok(container_slot().enrich(&ctx, String::from(live.id())))
        })
    }
}

#[when("a suite of {count} scenarios runs with concurrency {concurrency}")]
fn suite_runs(teardown_state: &TeardownState, count: usize, concurrency: usize) -> StepResult<()> {
    let orchestrator = teardown_state.orchestrator()?;
    let hooks = OneContainerHooks {
        definition: redis(None)?,
    };
    let plans = (1..=count)
        .map(|n| {
            ScenarioPlan::new(format!("scenario {n}")).step("container is known", |ctx| async move {
                if container_slot().retrieve(&ctx).is_empty() {
                    return Err(eyre::eyre!("no container recorded for this scenario"));
                }
                Ok(ctx)
            })
        })
        .collect();

    let suite = Suite::new(orchestrator).with_concurrency(concurrency);
    let report = runtime()?.block_on(suite.run(&hooks, plans));
    teardown_state.suite_report.set(Arc::new(report));
    Ok(())
}
