//! Core library for the Sentra security platform.
//!
//! Holds the emergency domain model, the dispatch orchestrator, the
//! Postgres repositories, the Redis cache wrapper and the real-time
//! event contract shared with the server crate.

pub mod cache;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod model;

pub use error::{Result, SentraError};
