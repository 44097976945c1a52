//! Runs scenarios through their Before, Steps, and After phases.
//!
//! Up to `concurrency` scenarios run at once, each to completion before its
//! worker picks up the next. Within a scenario the Before hook finishes before
//! the first step, steps run in order with the context threaded through them,
//! and the After hook always runs last: after a failed Before, a failed step,
//! or a cancelled run.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{info, warn};

use crate::config::{HarnessConfig, worker_count};
use crate::engine::ContainerEngine;
use crate::error::{HarnessError, TeardownError};
use crate::orchestrator::Orchestrator;
use crate::registry::TeardownReport;
use crate::state::{ScenarioContext, ScenarioId};

/// Boxed future returned by [`ScenarioHooks`] methods.
pub type HookFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Boxed future returned by a step.
pub type StepFuture = Pin<Box<dyn Future<Output = eyre::Result<ScenarioContext>> + Send>>;

type StepFn = Box<dyn Fn(ScenarioContext) -> StepFuture + Send + Sync>;

/// One named step. It receives the current context and returns the context
/// the next step should see.
pub struct Step {
    name: String,
    run: StepFn,
}

impl Step {
    /// Wrap an async step function.
    pub fn new<F, Fut>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(ScenarioContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<ScenarioContext>> + Send + 'static,
    {
        Self {
            name: name.into(),
            run: Box::new(move |ctx| -> StepFuture { Box::pin(run(ctx)) }),
        }
    }

    /// The step's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A named scenario and its ordered steps.
#[derive(Debug)]
#[must_use]
pub struct ScenarioPlan {
    name: String,
    id: Option<ScenarioId>,
    steps: Vec<Step>,
}

impl ScenarioPlan {
    /// A scenario with no steps yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            steps: vec![],
        }
    }

    /// Use `id` instead of a generated identifier.
    pub fn with_id(mut self, id: impl Into<ScenarioId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Append a step.
    pub fn step<F, Fut>(mut self, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(ScenarioContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<ScenarioContext>> + Send + 'static,
    {
        self.steps.push(Step::new(name, run));
        self
    }

    /// The scenario's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

/// Lifecycle hooks run around every scenario.
pub trait ScenarioHooks<E>: Send + Sync
where
    E: ContainerEngine + ?Sized,
{
    /// Provision the scenario's resources and seed its context.
    ///
    /// Build through `orchestrator.setup(ctx.scenario_id().clone())` so that
    /// everything created is recorded for the After hook.
    fn before<'a>(
        &'a self,
        orchestrator: &'a Orchestrator<E>,
        ctx: ScenarioContext,
    ) -> HookFuture<'a, crate::error::Result<ScenarioContext>>;

    /// Release the scenario's resources. Tears down the registry entry by
    /// default.
    fn after<'a>(
        &'a self,
        orchestrator: &'a Orchestrator<E>,
        ctx: &'a ScenarioContext,
    ) -> HookFuture<'a, Result<TeardownReport, TeardownError>> {
        Box::pin(orchestrator.teardown(ctx.scenario_id()))
    }
}

/// How a scenario ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStatus {
    /// Every step succeeded.
    Passed,
    /// The Before hook failed.
    SetupFailed {
        /// The setup error.
        message: String,
    },
    /// A step failed; later steps were skipped.
    StepFailed {
        /// Name of the failing step.
        step: String,
        /// The step's error, with its cause chain.
        message: String,
    },
    /// The run was cancelled before the scenario finished.
    Cancelled,
}

/// Result of one scenario.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// The scenario's identifier.
    pub id: ScenarioId,
    /// The scenario's name.
    pub name: String,
    /// How the scenario ended.
    pub status: ScenarioStatus,
    /// Cleanup failures. Never changes `status`.
    pub teardown: Option<TeardownError>,
    /// The context after the last step that ran.
    pub context: ScenarioContext,
}

impl ScenarioOutcome {
    /// True when every step passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

/// Outcomes of a suite run, in plan order.
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    /// One outcome per plan.
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    /// True when every scenario passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    /// Scenarios that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }

    /// Teardown errors across all scenarios.
    pub fn teardown_errors(&self) -> impl Iterator<Item = &TeardownError> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.teardown.as_ref())
    }
}

/// Schedules scenarios against one orchestrator.
#[derive(Debug)]
pub struct Suite<E: ?Sized> {
    orchestrator: Arc<Orchestrator<E>>,
    concurrency: usize,
    timeout: Option<Duration>,
}

impl<E> Suite<E>
where
    E: ContainerEngine + ?Sized,
{
    /// Run up to four scenarios at once with no run timeout.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator<E>>) -> Self {
        Self {
            orchestrator,
            concurrency: 4,
            timeout: None,
        }
    }

    /// Take concurrency and timeout from `config`.
    #[must_use]
    pub fn from_config(orchestrator: Arc<Orchestrator<E>>, config: &HarnessConfig) -> Self {
        Self::new(orchestrator)
            .with_concurrency(config.suite.concurrency)
            .with_timeout(config.suite.timeout())
    }

    /// Scenarios run at once; `0` runs them one after another.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Cancel the run once `timeout` elapses.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The shared orchestrator.
    #[must_use]
    pub const fn orchestrator(&self) -> &Arc<Orchestrator<E>> {
        &self.orchestrator
    }

    /// Run every plan and report how each ended.
    ///
    /// On timeout the run's cancellation signal fires: in-flight engine calls
    /// and readiness waits return `Cancelled`, scenarios not yet started are
    /// reported as cancelled, and every After hook still runs.
    ///
    /// The signal belongs to the orchestrator and is never reset, so a suite
    /// runs once per orchestrator: after a timeout, any later run on the same
    /// orchestrator reports every scenario as cancelled without provisioning
    /// anything. Build a fresh [`Orchestrator`] for each run.
    pub async fn run<H>(&self, hooks: &H, plans: Vec<ScenarioPlan>) -> SuiteReport
    where
        H: ScenarioHooks<E>,
    {
        let workers = worker_count(self.concurrency);
        info!(scenarios = plans.len(), workers, "suite started");

        let scenarios = stream::iter(plans.into_iter().enumerate())
            .map(|(index, plan)| async move { (index, self.run_scenario(hooks, plan).await) })
            .buffer_unordered(workers)
            .collect::<Vec<_>>();
        tokio::pin!(scenarios);

        let mut indexed = match self.timeout {
            None => scenarios.await,
            Some(limit) => {
                tokio::select! {
                    finished = &mut scenarios => finished,
                    () = tokio::time::sleep(limit) => {
                        warn!(timeout_secs = limit.as_secs(), "suite timed out; cancelling run");
                        self.orchestrator.cancellation().cancel();
                        scenarios.await
                    }
                }
            }
        };
        indexed.sort_by_key(|(index, _)| *index);

        let report = SuiteReport {
            outcomes: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
        };
        info!(
            scenarios = report.outcomes.len(),
            failed = report.failures().count(),
            "suite finished"
        );
        report
    }

    async fn run_scenario<H>(&self, hooks: &H, plan: ScenarioPlan) -> ScenarioOutcome
    where
        H: ScenarioHooks<E>,
    {
        let id = plan.id.clone().unwrap_or_else(ScenarioId::generate);
        let fresh = ScenarioContext::new(id.clone());
        let cancellation = self.orchestrator.cancellation();
        info!(scenario_id = %id, scenario = %plan.name, "scenario started");

        let (status, context) = if cancellation.is_cancelled() {
            (ScenarioStatus::Cancelled, fresh)
        } else {
            match hooks.before(&self.orchestrator, fresh.clone()).await {
                Ok(prepared) => self.run_steps(&plan, prepared).await,
                Err(error) if error.is_cancellation() => (ScenarioStatus::Cancelled, fresh),
                Err(error) => {
                    warn!(scenario_id = %id, error = %error, "scenario setup failed");
                    (
                        ScenarioStatus::SetupFailed {
                            message: error.to_string(),
                        },
                        fresh,
                    )
                }
            }
        };

        let teardown = match hooks.after(&self.orchestrator, &context).await {
            Ok(_) => None,
            Err(error) => {
                warn!(scenario_id = %id, error = %error, "scenario teardown incomplete");
                Some(error)
            }
        };

        info!(scenario_id = %id, status = ?status, "scenario finished");
        ScenarioOutcome {
            id,
            name: plan.name,
            status,
            teardown,
            context,
        }
    }

    async fn run_steps(
        &self,
        plan: &ScenarioPlan,
        prepared: ScenarioContext,
    ) -> (ScenarioStatus, ScenarioContext) {
        let cancellation = self.orchestrator.cancellation();
        let mut ctx = prepared;

        for step in &plan.steps {
            let outcome = cancellation
                .guard(&step.name, (step.run)(ctx.clone()))
                .await;
            match outcome {
                Ok(Ok(next)) => ctx = next,
                Ok(Err(report)) if is_cancellation(&report) => {
                    return (ScenarioStatus::Cancelled, ctx);
                }
                Ok(Err(report)) => {
                    warn!(
                        scenario_id = %ctx.scenario_id(),
                        step = %step.name,
                        error = %report,
                        "step failed"
                    );
                    return (
                        ScenarioStatus::StepFailed {
                            step: step.name.clone(),
                            message: format!("{report:#}"),
                        },
                        ctx,
                    );
                }
                Err(_) => return (ScenarioStatus::Cancelled, ctx),
            }
        }

        (ScenarioStatus::Passed, ctx)
    }
}

fn is_cancellation(report: &eyre::Report) -> bool {
    report
        .downcast_ref::<HarnessError>()
        .is_some_and(HarnessError::is_cancellation)
}
