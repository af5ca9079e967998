use crate::chat::{ChatClient, ChatError, ChatTarget};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use broadcaster_core::{BroadcastError, BroadcastResult, TelegramSettings};
use grammers_client::grammers_tl_types as tl;
use grammers_client::session::{PackedChat, PackedType, Session};
use grammers_client::{Client, Config, InitParams, InvocationError};
use tracing::{debug, info};

/// Telegram user-session channel adapter.
///
/// Talks MTProto through `grammers`, reusing a session that was authorized
/// out-of-band. Phone numbers are resolved with `contacts.resolvePhone`, so
/// recipients do not need to be in the account's contact list.
pub struct TelegramChatClient {
    settings: TelegramSettings,
    client: Option<Client>,
}

// ── RPC error mapping ───────────────────────────────────────────────────────

const FLOOD_ERRORS: &[&str] = &["FLOOD_WAIT", "FLOOD_PREMIUM_WAIT", "SLOWMODE_WAIT"];
const PRIVACY_ERRORS: &[&str] = &["USER_PRIVACY_RESTRICTED", "PRIVACY_PREMIUM_REQUIRED"];
const NOT_FOUND_ERRORS: &[&str] = &[
    "PHONE_NOT_OCCUPIED",
    "PHONE_NUMBER_INVALID",
    "PEER_ID_INVALID",
    "USER_ID_INVALID",
];

/// Maps an RPC error name (digits already split into `value`) to a kind.
pub(crate) fn classify_rpc(name: &str, value: Option<u32>, description: String) -> ChatError {
    if FLOOD_ERRORS.contains(&name) {
        ChatError::RateLimited {
            seconds: value.map(u64::from).unwrap_or_default(),
        }
    } else if PRIVACY_ERRORS.contains(&name) {
        ChatError::PrivacyBlocked
    } else if NOT_FOUND_ERRORS.contains(&name) {
        ChatError::NotFound
    } else {
        ChatError::Other(description)
    }
}

fn classify(err: InvocationError) -> ChatError {
    match err {
        InvocationError::Rpc(rpc) => {
            let description = rpc.to_string();
            classify_rpc(&rpc.name, rpc.value, description)
        }
        other => ChatError::Other(other.to_string()),
    }
}

/// Connection parameters. Flood waits are surfaced to the caller as
/// [`ChatError::RateLimited`]; the client must never sleep and retry on its own.
fn init_params() -> InitParams {
    InitParams {
        flood_sleep_threshold: 0,
        ..Default::default()
    }
}

// ── Implementation ──────────────────────────────────────────────────────────

impl TelegramChatClient {
    /// Create a new, unconnected `TelegramChatClient`.
    pub fn new(settings: TelegramSettings) -> Self {
        Self {
            settings,
            client: None,
        }
    }

    fn decode_session(&self) -> BroadcastResult<Session> {
        let bytes = BASE64
            .decode(self.settings.session_string.trim())
            .map_err(|e| BroadcastError::Config(format!("TG_SESSION_STRING is not valid base64: {e}")))?;
        Session::load(&bytes)
            .map_err(|e| BroadcastError::Config(format!("TG_SESSION_STRING is unreadable: {e}")))
    }

    fn live(&self) -> Result<&Client, ChatError> {
        self.client
            .as_ref()
            .ok_or_else(|| ChatError::Other("Telegram client is not connected".to_string()))
    }
}

#[async_trait]
impl ChatClient for TelegramChatClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(&mut self) -> BroadcastResult<()> {
        let session = self.decode_session()?;
        let client = Client::connect(Config {
            session,
            api_id: self.settings.api_id,
            api_hash: self.settings.api_hash.clone(),
            params: init_params(),
        })
        .await
        .map_err(|e| BroadcastError::Connection(format!("Telegram connection failed: {e}")))?;

        info!("Telegram session connected");
        self.client = Some(client);
        Ok(())
    }

    async fn is_authorized(&self) -> BroadcastResult<bool> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| BroadcastError::Connection("Telegram client is not connected".to_string()))?;
        client
            .is_authorized()
            .await
            .map_err(|e| BroadcastError::Connection(format!("Telegram authorization check failed: {e}")))
    }

    async fn resolve(&self, identifier: &str) -> Result<ChatTarget, ChatError> {
        let client = self.live()?;
        let request = tl::functions::contacts::ResolvePhone {
            phone: identifier.trim_start_matches('+').to_string(),
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) =
            client.invoke(&request).await.map_err(classify)?;

        let target = resolved
            .users
            .into_iter()
            .find_map(|user| match user {
                tl::enums::User::User(user) => Some(ChatTarget {
                    identifier: identifier.to_string(),
                    user_id: user.id,
                    access_hash: user.access_hash,
                }),
                tl::enums::User::Empty(_) => None,
            })
            .ok_or(ChatError::NotFound)?;

        debug!(identifier, user_id = target.user_id, "Resolved phone number");
        Ok(target)
    }

    async fn send(&self, target: &ChatTarget, text: &str) -> Result<(), ChatError> {
        let client = self.live()?;
        let chat = PackedChat {
            ty: PackedType::User,
            id: target.user_id,
            access_hash: target.access_hash,
        };
        client.send_message(chat, text).await.map_err(classify)?;
        Ok(())
    }

    async fn disconnect(&mut self) -> BroadcastResult<()> {
        // Dropping the client closes the MTProto connection.
        if self.client.take().is_some() {
            info!("Telegram session disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn settings(session: &str) -> TelegramSettings {
        TelegramSettings {
            api_id: 1,
            api_hash: "hash".to_string(),
            session_string: session.to_string(),
        }
    }

    #[test]
    fn test_flood_wait_carries_seconds() {
        let err = classify_rpc("FLOOD_WAIT", Some(42), "rpc error 420".into());
        assert_eq!(err, ChatError::RateLimited { seconds: 42 });
    }

    #[test]
    fn test_client_never_sleeps_through_flood_waits() {
        assert_eq!(init_params().flood_sleep_threshold, 0);
    }

    #[test]
    fn test_privacy_restricted() {
        let err = classify_rpc("USER_PRIVACY_RESTRICTED", None, String::new());
        assert_eq!(err, ChatError::PrivacyBlocked);
    }

    #[test]
    fn test_phone_not_occupied_is_not_found() {
        let err = classify_rpc("PHONE_NOT_OCCUPIED", None, String::new());
        assert_eq!(err, ChatError::NotFound);
    }

    #[test]
    fn test_unknown_rpc_keeps_description() {
        let err = classify_rpc("CHAT_WRITE_FORBIDDEN", None, "rpc error 403: CHAT_WRITE_FORBIDDEN".into());
        assert_eq!(err, ChatError::Other("rpc error 403: CHAT_WRITE_FORBIDDEN".into()));
    }

    #[test]
    fn test_bad_session_string_rejected() {
        let client = TelegramChatClient::new(settings("not base64 !!"));
        assert!(matches!(client.decode_session(), Err(BroadcastError::Config(_))));
    }

    #[tokio::test]
    async fn test_send_before_connect_fails_softly() {
        let client = TelegramChatClient::new(settings(""));
        let err = client.resolve("+919876543210").await.unwrap_err();
        assert!(matches!(err, ChatError::Other(_)));
    }

    #[tokio::test]
    async fn test_disconnect_when_idle() {
        let mut client = TelegramChatClient::new(settings(""));
        assert!(client.disconnect().await.is_ok());
    }
}
