//! Scenario-scoped state passed between sequential steps.
//!
//! A [`ScenarioContext`] is an immutable value: [`ScenarioState::enrich`]
//! returns a new context and leaves its input untouched. Steps must return the
//! context they were handed (or the enriched copy) for later steps to see
//! their writes. Reading a slot that was never written yields `T::default()`.
//!
//! ```
//! use scenariopod::state::{ScenarioContext, ScenarioState};
//!
//! #[derive(Clone, Default)]
//! struct Product {
//!     name: String,
//! }
//!
//! let state = ScenarioState::<Product>::new();
//! let ctx = ScenarioContext::new("scenario-1");
//! let enriched = state.enrich(&ctx, Product { name: String::from("tea") });
//!
//! assert_eq!(state.retrieve(&enriched).name, "tea");
//! assert_eq!(state.retrieve(&ctx).name, "");
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_STATE_KEY: &str = "default";

static NEXT_SCENARIO: AtomicU64 = AtomicU64::new(1);

/// Identity of one scenario execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScenarioId(String);

impl ScenarioId {
    /// Wrap a caller-supplied identifier (for example, the runner's own
    /// scenario ID).
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a process-unique identifier.
    #[must_use]
    pub fn generate() -> Self {
        let sequence = NEXT_SCENARIO.fetch_add(1, Ordering::Relaxed);
        Self(format!("scenario-{sequence}"))
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScenarioId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScenarioId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    name: String,
    type_id: TypeId,
}

type SlotValue = Arc<dyn Any + Send + Sync>;

/// Immutable per-scenario value chain.
///
/// Cloning is cheap; every clone observes the same values.
#[derive(Clone)]
pub struct ScenarioContext {
    scenario_id: ScenarioId,
    slots: Arc<HashMap<SlotKey, SlotValue>>,
}

impl ScenarioContext {
    /// Create an empty context for `scenario_id`.
    #[must_use]
    pub fn new(scenario_id: impl Into<ScenarioId>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            slots: Arc::new(HashMap::new()),
        }
    }

    /// Return the scenario this context belongs to.
    #[must_use]
    pub const fn scenario_id(&self) -> &ScenarioId {
        &self.scenario_id
    }

    /// Number of populated slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when no slot has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn with_slot(&self, key: SlotKey, value: SlotValue) -> Self {
        let mut slots = HashMap::clone(&self.slots);
        slots.insert(key, value);
        Self {
            scenario_id: self.scenario_id.clone(),
            slots: Arc::new(slots),
        }
    }

    fn slot(&self, key: &SlotKey) -> Option<&SlotValue> {
        self.slots.get(key)
    }
}

impl fmt::Debug for ScenarioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioContext")
            .field("scenario_id", &self.scenario_id)
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Typed accessor for one slot of a [`ScenarioContext`].
///
/// A slot is identified by its key together with `T`, so two states with the
/// same key but different types never alias.
pub struct ScenarioState<T> {
    key: String,
    marker: PhantomData<fn() -> T>,
}

impl<T> ScenarioState<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    /// Create a state accessor using the `"default"` key.
    #[must_use]
    pub fn new() -> Self {
        Self {
            key: String::from(DEFAULT_STATE_KEY),
            marker: PhantomData,
        }
    }

    /// Use `key` instead of `"default"`.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Return the configured key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Return a new context holding `value`; `ctx` is left unchanged.
    #[must_use]
    pub fn enrich(&self, ctx: &ScenarioContext, value: T) -> ScenarioContext {
        ctx.with_slot(self.slot_key(), Arc::new(value))
    }

    /// Return the stored value, or `T::default()` when the slot is empty.
    #[must_use]
    pub fn retrieve(&self, ctx: &ScenarioContext) -> T {
        ctx.slot(&self.slot_key())
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
            .unwrap_or_default()
    }

    /// Read, modify, and write back the slot in one step.
    #[must_use]
    pub fn update(&self, ctx: &ScenarioContext, change: impl FnOnce(&mut T)) -> ScenarioContext {
        let mut current = self.retrieve(ctx);
        change(&mut current);
        self.enrich(ctx, current)
    }

    fn slot_key(&self) -> SlotKey {
        SlotKey {
            name: self.key.clone(),
            type_id: TypeId::of::<T>(),
        }
    }
}

impl<T> Default for ScenarioState<T>
where
    T: Clone + Default + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ScenarioState<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for ScenarioState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioState")
            .field("key", &self.key)
            .finish()
    }
}
