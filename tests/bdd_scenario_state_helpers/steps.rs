//! Given/when steps for scenario state scenarios.

use std::sync::Arc;

use rstest_bdd_macros::{given, when};
use scenariopod::engine::ContainerEngine;
use scenariopod::orchestrator::Orchestrator;
use scenariopod::state::{ScenarioContext, ScenarioState};
use scenariopod::suite::{HookFuture, ScenarioHooks, ScenarioPlan, Suite};

use super::StepResult;
use super::state::{Product, StateWorld, basket, product};
use crate::fake_engine::FakeEngine;

#[given("a fresh context for scenario {scenario}")]
fn fresh_context(state_world: &StateWorld, scenario: String) {
    let ctx = ScenarioContext::new(scenario);
    state_world.original.set(ctx.clone());
    state_world.current.set(ctx);
}

#[when("a step records the product {name}")]
fn records_product(state_world: &StateWorld, name: String) -> StepResult<()> {
    let enriched = product().enrich(&state_world.current()?, Product { name });
    state_world.current.set(enriched);
    Ok(())
}

#[when("a step records the {key} product {name}")]
fn records_keyed_product(state_world: &StateWorld, key: String, name: String) -> StepResult<()> {
    let keyed = ScenarioState::<Product>::new().with_key(key);
    let enriched = keyed.enrich(&state_world.current()?, Product { name });
    state_world.current.set(enriched);
    Ok(())
}

/// Hooks that seed the context they are given and provision nothing.
struct SeededHooks {
    seed: ScenarioContext,
}

impl<E> ScenarioHooks<E> for SeededHooks
where
    E: ContainerEngine + ?Sized,
{
    fn before<'a>(
        &'a self,
        _orchestrator: &'a Orchestrator<E>,
        _ctx: ScenarioContext,
    ) -> HookFuture<'a, scenariopod::error::Result<ScenarioContext>> {
        let seeded = self.seed.clone();
        Box::pin(async move { Ok(seeded) })
    }
}

fn add_step(plan: ScenarioPlan, amount: u32) -> ScenarioPlan {
    plan.step(format!("add {amount}"), move |ctx| async move {
        Ok(basket().update(&ctx, |total| *total += amount))
    })
}

#[when("a suite runs steps that add {first} and then {second} to the basket")]
fn suite_adds_to_basket(state_world: &StateWorld, first: u32, second: u32) -> StepResult<()> {
    let seed = state_world.current()?;
    let plan = add_step(
        add_step(ScenarioPlan::new("basket").with_id(seed.scenario_id().clone()), first),
        second,
    );
    let suite = Suite::new(Arc::new(Orchestrator::new(Arc::new(FakeEngine::default()))));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    let report = runtime.block_on(suite.run(&SeededHooks { seed }, vec![plan]));
    let outcome = report
        .outcomes
        .first()
        .ok_or_else(|| String::from("suite should report the scenario"))?;
    if !outcome.passed() {
        return Err(format!("scenario did not pass: {:?}", outcome.status));
    }
    state_world.basket_total.set(basket().retrieve(&outcome.context));
    Ok(())
}
