//! # Sentra Server
//!
//! Security-monitoring backend for the Sentra platform.
//!
//! ## Overview
//!
//! - **Emergency dispatch**: trigger ingestion, operator assignment
//!   and auto-dispatch via `sentra-core`
//! - **Real-time fan-out**: authenticated WebSocket connections with
//!   per-customer groups and a shared operator console group
//! - **Arm/disarm**: cancellable countdown arming backed by the cache
//!
//! ## Architecture
//!
//! The server is built on Axum and uses:
//! - PostgreSQL for persistent storage
//! - Redis for transient markers and token revocation

pub mod auth;
pub mod handlers;
pub mod infra;
pub mod realtime;
pub mod routes;
