//! Core types and error definitions for the Broadcaster workspace.
//!
//! This crate provides the foundational types shared across all Broadcaster
//! crates: error handling, the recipient data model, per-row outcomes, run
//! statistics, run events, and layered configuration.
//!
//! # Main types
//!
//! - [`BroadcastError`]: Unified error enum for all Broadcaster subsystems.
//! - [`BroadcastResult`]: Convenience alias for `Result<T, BroadcastError>`.
//! - [`CellValue`] / [`RecipientRow`]: One spreadsheet row to broadcast to.
//! - [`SendOutcome`] / [`RowReport`]: Per-channel result of one row.
//! - [`RunStats`] / [`LogWindow`]: Aggregate counters and bounded scrollback.
//! - [`RunEvent`]: Progress notifications emitted during a run.
//! - [`BroadcasterConfig`]: Startup configuration resolved from providers.

/// Layered configuration providers and the resolved config struct.
pub mod config;
/// Send outcomes, run statistics, log window and run events.
pub mod report;
/// Spreadsheet cells and recipient rows.
pub mod row;

pub use config::{
    BroadcasterConfig, ConfigProvider, ConfigResolver, EnvProvider, GatewaySettings,
    MailSettings, SecretsFileProvider, StaticProvider, TelegramSettings,
};
pub use report::{LogWindow, RowReport, RunEvent, RunState, RunStats, SendOutcome};
pub use row::{CellValue, RecipientRow};

// --- Error types ---

/// Top-level error type for the Broadcaster workspace.
///
/// Each variant corresponds to a subsystem that can produce errors.
/// Per-row send failures never surface as this type; they are folded into a
/// [`SendOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// Missing or invalid configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The recipient dataset is absent, unreadable or malformed.
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// User input rejected before any connection was attempted.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote service could not be reached or logged into.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The chat session is not (or no longer) authorized.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// An error from a delivery channel outside of a row send.
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error from the web gateway layer.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`BroadcastError`].
pub type BroadcastResult<T> = Result<T, BroadcastError>;

impl BroadcastError {
    /// Returns `true` for errors raised before connecting: bad message,
    /// missing or malformed dataset.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Dataset(_))
    }
}
