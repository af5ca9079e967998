use crate::mail::{MailClient, MailError};
use async_trait::async_trait;
use broadcaster_core::{BroadcastError, BroadcastResult, MailSettings};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// SMTP relay adapter over `lettre`'s async transport.
///
/// `connect` negotiates STARTTLS and logs in once to validate the
/// credentials; sends reuse the transport's connection pool.
pub struct SmtpMailClient {
    settings: MailSettings,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpMailClient {
    /// Create a new, unconnected `SmtpMailClient`.
    pub fn new(settings: MailSettings) -> Self {
        Self {
            settings,
            transport: None,
        }
    }

    fn sender(&self) -> Result<Mailbox, MailError> {
        parse_mailbox(&self.settings.username)
    }

    /// Builds the plain-text message sent to `recipient`.
    pub fn build_message(&self, recipient: &str, subject: &str, body: &str) -> Result<Message, MailError> {
        let to = parse_mailbox(recipient)?;

        Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| MailError::Other(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| {
            MailError::Other(format!("Invalid address '{address}': {e}"))
        })
}

#[async_trait]
impl MailClient for SmtpMailClient {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn connect(&mut self) -> BroadcastResult<()> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.settings.host)
            .map_err(|e| BroadcastError::Connection(format!("SMTP relay setup failed: {e}")))?
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build();

        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(BroadcastError::Connection(format!(
                    "SMTP relay {} did not accept the connection",
                    self.settings.host
                )))
            }
            Err(e) => return Err(BroadcastError::Connection(format!("SMTP login failed: {e}"))),
        }

        info!(host = %self.settings.host, port = self.settings.port, "SMTP relay connected");
        self.transport = Some(transport);
        Ok(())
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| MailError::Other("SMTP relay is not connected".to_string()))?;
        let message = self.build_message(recipient, subject, body)?;
        transport
            .send(message)
            .await
            .map_err(|e| MailError::Other(e.to_string()))?;
        Ok(())
    }

    async fn quit(&mut self) -> BroadcastResult<()> {
        // Pooled connections send QUIT when the transport is dropped.
        if self.transport.take().is_some() {
            info!(host = %self.settings.host, "SMTP relay closed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn client() -> SmtpMailClient {
        SmtpMailClient::new(MailSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "sender@example.com".to_string(),
            password: "secret".to_string(),
        })
    }

    #[test]
    fn test_build_message_headers() {
        let message = client()
            .build_message("ada@example.com", "Update", "Hello there")
            .unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("From: sender@example.com"));
        assert!(raw.contains("To: ada@example.com"));
        assert!(raw.contains("Subject: Update"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("Hello there"));
    }

    #[test]
    fn test_invalid_recipient() {
        let err = client().build_message("not-an-address", "s", "b").unwrap_err();
        assert!(
            matches!(&err, MailError::Other(detail) if detail.starts_with("Invalid address 'not-an-address'")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_send_before_connect_fails_softly() {
        let err = client().send("ada@example.com", "s", "b").await.unwrap_err();
        assert!(matches!(err, MailError::Other(_)));
    }
}
