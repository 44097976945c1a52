//! Assertion steps for container lifecycle scenarios.

use rstest_bdd_macros::then;
use scenariopod::container::LiveContainer;
use scenariopod::network::AddressMode;

use super::StepResult;
use super::state::{BuildResult, FailureKind, LifecycleState};

fn live(lifecycle_state: &LifecycleState) -> StepResult<LiveContainer> {
    match lifecycle_state.result.get() {
        Some(BuildResult::Live(container)) => Ok(container),
        Some(BuildResult::Failed { message, .. }) => {
            Err(format!("expected a live container, got error: {message}"))
        }
        None => Err(String::from("build result should be set")),
    }
}

fn engine_calls(lifecycle_state: &LifecycleState) -> StepResult<Vec<String>> {
    lifecycle_state
        .engine
        .with_ref(|engine| engine.calls())
        .ok_or_else(|| String::from("engine should be configured"))
}

fn position(calls: &[String], prefix: &str) -> StepResult<usize> {
    calls
        .iter()
        .position(|call| call.starts_with(prefix))
        .ok_or_else(|| format!("expected a '{prefix}' call in {calls:?}"))
}

#[then("the container is live")]
fn container_is_live(lifecycle_state: &LifecycleState) -> StepResult<()> {
    live(lifecycle_state).map(|_| ())
}

#[then("port {port} is reachable on host {host}")]
fn port_is_reachable(lifecycle_state: &LifecycleState, port: u16, host: String) -> StepResult<()> {
    let endpoint = live(lifecycle_state)?
        .endpoint(port, AddressMode::External)
        .map_err(|e| e.to_string())?;
    if endpoint.host != host {
        return Err(format!("expected host {host}, got {}", endpoint.host));
    }
    if endpoint.port == 0 {
        return Err(String::from("expected a published host port"));
    }
    Ok(())
}

#[then("the engine saw create, start, and inspect in order")]
fn create_start_inspect(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let calls = engine_calls(lifecycle_state)?;
    let create = position(&calls, "create ")?;
    let start = position(&calls, "start ")?;
    let inspect = position(&calls, "inspect ")?;
    if create < start && start < inspect {
        Ok(())
    } else {
        Err(format!("unexpected call order: {calls:?}"))
    }
}

#[then("the upload happened before the start")]
fn upload_before_start(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let calls = engine_calls(lifecycle_state)?;
    if position(&calls, "upload ")? < position(&calls, "start ")? {
        Ok(())
    } else {
        Err(format!("upload should precede start: {calls:?}"))
    }
}

#[then("the internal endpoint for port {port} is {expected}")]
fn internal_endpoint(
    lifecycle_state: &LifecycleState,
    port: u16,
    expected: String,
) -> StepResult<()> {
    let endpoint = live(lifecycle_state)?
        .endpoint(port, AddressMode::Internal)
        .map_err(|e| e.to_string())?;
    let actual = format!("{}:{}", endpoint.host, endpoint.port);
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected}, got {actual}"))
    }
}

#[then("the engine holds {count} network")]
fn engine_holds_networks(lifecycle_state: &LifecycleState, count: usize) -> StepResult<()> {
    let networks = lifecycle_state
        .engine
        .with_ref(|engine| engine.network_names())
        .ok_or_else(|| String::from("engine should be configured"))?;
    if networks.len() == count {
        Ok(())
    } else {
        Err(format!("expected {count} network(s), got {networks:?}"))
    }
}

fn failed_with(lifecycle_state: &LifecycleState, expected: FailureKind) -> StepResult<()> {
    match lifecycle_state.result.get() {
        Some(BuildResult::Failed { kind, .. }) if kind == expected => Ok(()),
        Some(BuildResult::Failed { kind, message }) => {
            Err(format!("expected {expected:?}, got {kind:?}: {message}"))
        }
        Some(BuildResult::Live(container)) => Err(format!(
            "expected {expected:?}, got live container {}",
            container.id()
        )),
        None => Err(String::from("build result should be set")),
    }
}

#[then("the build fails with a provisioning error")]
fn fails_with_provisioning(lifecycle_state: &LifecycleState) -> StepResult<()> {
    failed_with(lifecycle_state, FailureKind::Provisioning)
}

#[then("the build fails with a readiness error")]
fn fails_with_readiness(lifecycle_state: &LifecycleState) -> StepResult<()> {
    failed_with(lifecycle_state, FailureKind::Readiness)
}

#[then("the build fails with a cancellation")]
fn fails_with_cancellation(lifecycle_state: &LifecycleState) -> StepResult<()> {
    failed_with(lifecycle_state, FailureKind::Cancelled)
}

#[then("the engine holds no containers")]
fn engine_holds_no_containers(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let remaining = lifecycle_state
        .engine
        .with_ref(|engine| engine.container_ids())
        .ok_or_else(|| String::from("engine should be configured"))?;
    if remaining.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no containers, found {remaining:?}"))
    }
}

#[then("the engine saw no container calls")]
fn engine_saw_no_calls(lifecycle_state: &LifecycleState) -> StepResult<()> {
    let calls = engine_calls(lifecycle_state)?;
    if calls.is_empty() {
        Ok(())
    } else {
        Err(format!("expected no engine calls, got {calls:?}"))
    }
}
