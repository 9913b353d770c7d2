//! flowwire - resilient live-event channels for the flow orchestration dashboard
//!
//! - `channel`: transport, connection, reconnection lifecycle and typed dispatch
//! - `updates`: general update channel (bounded linear retry)
//! - `telemetry`: debug/health telemetry channel (fixed retry, filtered derived state)
//! - `api`: REST collaborator client
//! - `config`, `logger`, `arguments`, `errors`: ambient stack

pub mod api;
pub mod arguments;
pub mod channel;
pub mod config;
pub mod errors;
pub mod logger;
pub mod telemetry;
pub mod updates;
