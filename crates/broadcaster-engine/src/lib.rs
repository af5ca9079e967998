//! The broadcast engine.
//!
//! Reads recipient rows, normalizes phone numbers, sends every row on the
//! chat and mail channels concurrently, and drives the run through its
//! `Connecting → Sending → Completed` state machine with mandatory pacing
//! between rows.
//!
//! # Main types
//!
//! - [`Broadcaster`]: Runs one broadcast over a dataset.
//! - [`RowSender`]: Sends one row on both channels.
//! - [`RecipientSource`] / [`SpreadsheetSource`]: Where rows come from.
//! - [`ClientFactory`]: Builds fresh channel clients for each run.
//! - [`normalize_phone`]: Cell value to `+<cc><10 digits>`.

/// Broadcast state machine and pacing.
pub mod broadcast;
/// Workbook loading and header parsing.
pub mod dataset;
/// Phone number normalization.
pub mod phone;
/// Dual-channel row sender.
pub mod sender;

pub use broadcast::{Broadcaster, ClientFactory, Pacing, RunSummary};
pub use dataset::{recipients_from_rows, RecipientSource, SpreadsheetSource, StaticSource};
pub use phone::{normalize_phone, DEFAULT_COUNTRY_CODE};
pub use sender::{OutgoingMessage, RowSender};
