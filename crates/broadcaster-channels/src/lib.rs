//! Delivery channels for the Broadcaster.
//!
//! Provides the [`ChatClient`] and [`MailClient`] traits the broadcast loop
//! talks to, the closed error kinds they report, and concrete adapters for
//! Telegram user sessions and SMTP relays.
//!
//! # Main types
//!
//! - [`ChatClient`]: Resolve a phone number and deliver a chat message.
//! - [`MailClient`]: Deliver a plain-text email through a relay.
//! - [`ChatError`] / [`MailError`]: Per-send failure kinds.
//! - [`TelegramChatClient`]: MTProto user-session adapter.
//! - [`SmtpMailClient`]: Async SMTP adapter.

/// Chat channel trait and error kinds.
pub mod chat;
/// Mail channel trait and error kinds.
pub mod mail;
/// Async SMTP relay adapter.
pub mod smtp;
/// Telegram user-session adapter.
pub mod telegram;

pub use chat::{ChatClient, ChatError, ChatTarget};
pub use mail::{MailClient, MailError};
pub use smtp::SmtpMailClient;
pub use telegram::TelegramChatClient;
