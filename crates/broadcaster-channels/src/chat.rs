use async_trait::async_trait;
use broadcaster_core::BroadcastResult;
use serde::{Deserialize, Serialize};

/// A resolved, sendable chat recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTarget {
    /// Identifier the target was resolved from, e.g. `+919876543210`.
    pub identifier: String,
    /// Platform user id.
    pub user_id: i64,
    /// Platform access hash, when the platform requires one.
    pub access_hash: Option<i64>,
}

/// Why a single chat send failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// The identifier does not map to a reachable user.
    #[error("recipient not found")]
    NotFound,

    /// The platform throttled the session and asks to wait `seconds`.
    #[error("rate limited, retry after {seconds}s")]
    RateLimited {
        /// Required wait before the next request.
        seconds: u64,
    },

    /// The recipient's privacy settings reject messages from this account.
    #[error("recipient privacy settings block delivery")]
    PrivacyBlocked,

    /// Anything else, carrying the platform's own description.
    #[error("{0}")]
    Other(String),
}

/// A chat platform session.
///
/// Lifecycle calls take `&mut self`; sends take `&self` so a row can send on
/// chat and mail concurrently.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Platform name for logs.
    fn name(&self) -> &str;

    /// Opens the session.
    async fn connect(&mut self) -> BroadcastResult<()>;

    /// Whether the opened session is logged in.
    async fn is_authorized(&self) -> BroadcastResult<bool>;

    /// Maps a phone-number identifier to a sendable target.
    async fn resolve(&self, identifier: &str) -> Result<ChatTarget, ChatError>;

    /// Delivers `text` to `target`.
    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), ChatError>;

    /// Releases the session. Safe to call when not connected.
    async fn disconnect(&mut self) -> BroadcastResult<()>;
}
