//! Lyric Core
//!
//! Core types shared by the Lyric Transcribe server, client and CLI.
//!
//! This crate contains:
//! - Domain types: jobs, file tasks, phases, events, application config
//! - DTOs: request/response bodies of the HTTP API
//! - LRC: lyric timestamp formatting and parsing

pub mod domain;
pub mod dto;
pub mod lrc;
