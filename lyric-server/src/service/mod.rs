//! Service Module
//!
//! Job execution core and the supporting services behind the HTTP API.
//! - `event_bus`: ordered fan-out of job events with a replay buffer
//! - `worker`: dedicated thread for blocking backend calls
//! - `batch`: per-job state machine
//! - `registry`: owner of the single active job

pub mod batch;
pub mod config_store;
pub mod event_bus;
pub mod files;
pub mod registry;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;
