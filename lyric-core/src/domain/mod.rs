//! Core domain types
//!
//! This module contains the core domain structures shared between the server
//! (which runs jobs and publishes events) and clients (which observe them).

pub mod config;
pub mod event;
pub mod job;
