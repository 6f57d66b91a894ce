//! Alarm workflow: turns fire-alarm dispatch texts into structured
//! operations and runs them through phased jobs.

pub mod addressing;
pub mod clock;
pub mod config;
pub mod emk;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod operation;
pub mod parsing;
pub mod services;
pub mod sources;
