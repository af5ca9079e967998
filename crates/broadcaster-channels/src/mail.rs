use async_trait::async_trait;
use broadcaster_core::BroadcastResult;

/// Why a single email send failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    /// Any address, message-building or relay failure, with its description.
    #[error("{0}")]
    Other(String),
}

/// An authenticated mail relay session.
#[async_trait]
pub trait MailClient: Send + Sync {
    /// Relay name for logs.
    fn name(&self) -> &str;

    /// Connects and authenticates against the relay.
    async fn connect(&mut self) -> BroadcastResult<()>;

    /// Sends a plain-text email.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError>;

    /// Closes the relay session. Safe to call when not connected.
    async fn quit(&mut self) -> BroadcastResult<()>;
}
