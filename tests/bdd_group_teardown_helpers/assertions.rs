//! Assertion steps for group teardown scenarios.

use rstest_bdd_macros::then;

use super::StepResult;
use super::state::TeardownState;

fn remaining_containers(teardown_state: &TeardownState) -> StepResult<Vec<String>> {
    Ok(teardown_state.orchestrator()?.engine().container_ids())
}

#[then("teardown succeeds")]
fn teardown_succeeds(teardown_state: &TeardownState) -> StepResult<()> {
    match teardown_state.teardown_failures.get() {
        Some(0) => Ok(()),
        Some(count) => Err(format!("expected a clean teardown, got {count} failure(s)")),
        None => Err(String::from("teardown should have run")),
    }
}

#[then("teardown reports {expected} failure")]
fn teardown_reports_failures(teardown_state: &TeardownState, expected: usize) -> StepResult<()> {
    let actual = teardown_state
        .teardown_failures
        .get()
        .ok_or_else(|| String::from("teardown should have run"))?;
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} failure(s), got {actual}"))
    }
}

#[then("setup fails")]
fn setup_fails(teardown_state: &TeardownState) -> StepResult<()> {
    if teardown_state.setup_error.is_filled() {
        Ok(())
    } else {
        Err(String::from("expected setup to fail"))
    }
}

#[then("the engine holds no containers")]
fn no_containers(teardown_state: &TeardownState) -> StepResult<()> {
    let remaining = remaining_containers(teardown_state)?;
    if remaining.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no containers, found {remaining:?}"))
    }
}

#[then("the engine still holds {count} containers")]
fn still_holds_containers(teardown_state: &TeardownState, count: usize) -> StepResult<()> {
    let remaining = remaining_containers(teardown_state)?;
    if remaining.len() == count {
        Ok(())
    } else {
        Err(format!("expected {count} container(s), found {remaining:?}"))
    }
}

#[then("only {container_id} remains on the engine")]
fn only_container_remains(teardown_state: &TeardownState, container_id: String) -> StepResult<()> {
    let remaining = remaining_containers(teardown_state)?;
    if remaining == [container_id.clone()] {
        Ok(())
    } else {
        Err(format!("expected only {container_id}, found {remaining:?}"))
    }
}

#[then("the engine holds no networks")]
fn no_networks(teardown_state: &TeardownState) -> StepResult<()> {
    let networks = teardown_state.orchestrator()?.engine().network_names();
    if networks.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no networks, found {networks:?}"))
    }
}

#[then("the registry is empty")]
fn registry_is_empty(teardown_state: &TeardownState) -> StepResult<()> {
    let orchestrator = teardown_state.orchestrator()?;
    if orchestrator.registry().is_empty() {
        Ok(())
    } else {
        Err(format!(
            "expected an empty registry, found {} entries",
            orchestrator.registry().len()
        ))
    }
}

#[then("the registry still holds scenario {scenario}")]
fn registry_holds(teardown_state: &TeardownState, scenario: String) -> StepResult<()> {
    let orchestrator = teardown_state.orchestrator()?;
    let entry = orchestrator
        .registry()
        .get(&scenario.as_str().into())
        .ok_or_else(|| format!("scenario {scenario} should still be registered"))?;
    if entry.containers().is_empty() {
        Err(format!("scenario {scenario} lost its containers"))
    } else {
        Ok(())
    }
}

#[then("every scenario passes")]
fn every_scenario_passes(teardown_state: &TeardownState) -> StepResult<()> {
    let report = teardown_state
        .suite_report
        .get()
        .ok_or_else(|| String::from("suite should have run"))?;
    if report.all_passed() {
        Ok(())
    } else {
        let failed: Vec<_> = report.failures().map(|outcome| outcome.name.clone()).collect();
        Err(format!("scenarios failed: {failed:?}"))
    }
}
