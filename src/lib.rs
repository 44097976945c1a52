//! Ephemeral container fixtures and scenario-scoped state for behavioural
//! test suites.
//!
//! `scenariopod` provisions the short-lived infrastructure an integration
//! scenario needs (databases, queues, custom services) and tears it down
//! again once the scenario ends, whether it passed, failed, or was cancelled.
//!
//! # Architecture
//!
//! A run owns one [`orchestrator::Orchestrator`]. Each scenario's Before hook
//! builds [`network::NetworkDefinition`]s and
//! [`container::ContainerDefinition`]s through it; every live resource is
//! recorded in the [`registry::GroupRegistry`] under the scenario's ID the
//! moment it exists, so the After hook can remove everything even when
//! setup stopped part way. Steps pass data to one another through an
//! immutable [`state::ScenarioContext`].
//!
//! # Modules
//!
//! - [`cancellation`]: Run-wide cancellation observed by engine calls and waits
//! - [`config`]: Layered configuration (CLI > env > file > defaults)
//! - [`container`]: Container definitions, the build flow, and live handles
//! - [`engine`]: Container engine boundary, connection, and tar payloads
//! - [`error`]: Semantic error types
//! - [`network`]: Lazily built, shared networks and address derivation
//! - [`orchestrator`]: Run-scoped owner of the engine and registry
//! - [`readiness`]: Readiness policies and the waiter state machine
//! - [`registry`]: Per-scenario resource records and teardown
//! - [`state`]: Scenario-scoped typed state
//! - [`suite`]: Concurrent scenario runner

pub mod cancellation;
pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod network;
pub mod orchestrator;
pub mod readiness;
pub mod registry;
pub mod state;
pub mod suite;

#[cfg(test)]
mod test_support;
