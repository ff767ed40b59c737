//! StarCraft voice lines, desktop notifications, session digests and
//! telemetry for OpenCode lifecycle events.
//!
//! The host writes one JSON event per line; [`dispatcher::Dispatcher`] turns
//! each into best-effort side effects. Nothing in here is allowed to take the
//! host down: every failure is logged through [`outcome::settle`] and dropped.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod digest;
pub mod dispatcher;
pub mod effect;
pub mod error;
pub mod event;
pub mod intake;
pub mod outcome;
pub mod paths;
pub mod summary;
pub mod telemetry;
