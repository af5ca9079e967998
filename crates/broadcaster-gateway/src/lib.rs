//! Web surface for the Broadcaster.
//!
//! Serves the compose form, starts one broadcast at a time in the
//! background, and streams its progress to every open page over WebSocket.

/// Open WebSocket viewers.
pub mod connection;
/// API key check.
pub mod middleware;
/// Embedded single-page UI.
pub mod page;
/// Background run launcher and progress snapshot.
pub mod runner;
/// Router and handlers.
pub mod server;

pub use middleware::AuthConfig;
pub use runner::{RunLauncher, RunSettings, RunSnapshot, StartError};
pub use server::GatewayServer;
