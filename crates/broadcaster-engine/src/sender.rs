use crate::phone::normalize_phone;
use broadcaster_channels::{ChatClient, ChatError, MailClient};
use broadcaster_core::{RecipientRow, RowReport, SendOutcome};
use tracing::{debug, warn};

/// The message every row receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Chat text and plain-text email body.
    pub body: String,
    /// Email subject line.
    pub subject: String,
}

impl OutgoingMessage {
    /// Creates a message.
    pub fn new(body: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: subject.into(),
        }
    }
}

/// Sends one row on both channels.
#[derive(Debug, Clone)]
pub struct RowSender {
    country_code: String,
}

impl RowSender {
    /// Creates a sender normalizing phones with `country_code`.
    pub fn new(country_code: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
        }
    }

    /// Sends `message` to `row` over chat and mail concurrently.
    ///
    /// Never fails: every error is folded into the row's outcomes. A channel
    /// whose address is missing is not attempted and gets its placeholder.
    pub async fn send_row(
        &self,
        chat: &dyn ChatClient,
        mail: &dyn MailClient,
        row: &RecipientRow,
        message: &OutgoingMessage,
    ) -> RowReport {
        let phone = normalize_phone(&row.telegram_id, &self.country_code);
        let email = row.email_address();

        let chat_send = async {
            match phone.as_deref() {
                Some(phone) => deliver_chat(chat, phone, &message.body).await,
                None => SendOutcome::bad_format(),
            }
        };
        let mail_send = async {
            match email.as_deref() {
                Some(address) => deliver_mail(mail, address, message).await,
                None => SendOutcome::no_address(),
            }
        };
        let (chat_outcome, mail_outcome) = tokio::join!(chat_send, mail_send);

        RowReport {
            number: row.number,
            phone,
            email,
            chat: chat_outcome,
            mail: mail_outcome,
        }
    }
}

/// Status text recorded for a failed chat send.
pub fn chat_failure_detail(err: &ChatError) -> String {
    match err {
        ChatError::NotFound => "Invalid/Not found".to_string(),
        ChatError::RateLimited { seconds } => format!("FloodWait {seconds}s"),
        ChatError::PrivacyBlocked => "Privacy Restricted".to_string(),
        ChatError::Other(description) => description.clone(),
    }
}

async fn deliver_chat(chat: &dyn ChatClient, phone: &str, body: &str) -> SendOutcome {
    let result = match chat.resolve(phone).await {
        Ok(target) => chat.send(&target, body).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            debug!(channel = chat.name(), phone, "Chat message sent");
            SendOutcome::sent()
        }
        Err(e) => {
            warn!(channel = chat.name(), phone, error = %e, "Chat send failed");
            SendOutcome::failed(chat_failure_detail(&e))
        }
    }
}

async fn deliver_mail(mail: &dyn MailClient, address: &str, message: &OutgoingMessage) -> SendOutcome {
    match mail.send(address, &message.subject, &message.body).await {
        Ok(()) => {
            debug!(channel = mail.name(), address, "Email sent");
            SendOutcome::sent()
        }
        Err(e) => {
            warn!(channel = mail.name(), address, error = %e, "Email send failed");
            SendOutcome::failed(e.to_string())
        }
    }
}
