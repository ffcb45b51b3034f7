//! Application layer - repositories and limiters built on the store port.
//!
//! This layer coordinates the domain types and the store:
//! - Store commands, batches and replies
//! - Site repository with geo and capacity queries
//! - Sliding-window rate limiter and its metrics
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod command;
pub mod limiter;
pub mod metrics;
pub mod ports;
pub mod site_geo;
