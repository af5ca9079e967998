//! Production channel clients.

use broadcaster_channels::{ChatClient, MailClient, SmtpMailClient, TelegramChatClient};
use broadcaster_core::{BroadcasterConfig, MailSettings, TelegramSettings};
use broadcaster_engine::ClientFactory;

/// Builds Telegram and SMTP clients from the resolved config.
pub struct LiveClients {
    telegram: TelegramSettings,
    mail: MailSettings,
}

impl LiveClients {
    pub fn new(config: &BroadcasterConfig) -> Self {
        Self {
            telegram: config.telegram.clone(),
            mail: config.mail.clone(),
        }
    }
}

impl ClientFactory for LiveClients {
    fn chat_client(&self) -> Box<dyn ChatClient> {
        Box::new(TelegramChatClient::new(self.telegram.clone()))
    }

    fn mail_client(&self) -> Box<dyn MailClient> {
        Box::new(SmtpMailClient::new(self.mail.clone()))
    }
}
