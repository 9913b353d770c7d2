//! Typed client for the REST collaborator (devices, flows, secrets, auth, logs)

pub mod client;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{ApiClient, AuthApi, DevicesApi, FlowsApi, LogsApi};
pub use session::SessionStore;
pub use types::*;
