//! World for scenario state behavioural tests.

use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::ScenarioState;
use scenariopod::state::{self as scenario, ScenarioContext};

/// Value threaded through the context in these scenarios.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Product {
    pub(crate) name: String,
}

pub(crate) fn product() -> scenario::ScenarioState<Product> {
    scenario::ScenarioState::new()
}

pub(crate) fn basket() -> scenario::ScenarioState<u32> {
    scenario::ScenarioState::new().with_key("basket")
}

#[derive(Default, ScenarioState)]
pub(crate) struct StateWorld {
    pub(crate) original: Slot<ScenarioContext>,
    pub(crate) current: Slot<ScenarioContext>,
    pub(crate) basket_total: Slot<u32>,
}

impl StateWorld {
    pub(crate) fn current(&self) -> Result<ScenarioContext, String> {
        self.current
            .get()
            .ok_or_else(|| String::from("context should be created"))
    }
}

#[fixture]
pub(crate) fn state_world() -> StateWorld {
    StateWorld::default()
}
