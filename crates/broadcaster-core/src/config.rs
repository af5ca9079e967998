//! Startup configuration.
//!
//! Values are looked up key by key through an ordered list of
//! [`ConfigProvider`]s; the first provider holding a non-empty value wins.
//! [`BroadcasterConfig::resolve`] runs once at startup and reports every
//! missing required key in a single error.

use crate::{BroadcastError, BroadcastResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Telegram API id.
pub const TG_API_ID: &str = "TG_API_ID";
/// Telegram API hash.
pub const TG_API_HASH: &str = "TG_API_HASH";
/// Serialized, base64-encoded user session.
pub const TG_SESSION_STRING: &str = "TG_SESSION_STRING";
/// SMTP login, also used as the `From` address.
pub const GMAIL_USER: &str = "GMAIL_USER";
/// SMTP password (an app password for Gmail).
pub const GMAIL_PASS: &str = "GMAIL_PASS";
/// Subject line of every email.
pub const EMAIL_SUBJECT: &str = "EMAIL_SUBJECT";
/// SMTP relay host.
pub const SMTP_HOST: &str = "SMTP_HOST";
/// SMTP relay port (STARTTLS).
pub const SMTP_PORT: &str = "SMTP_PORT";
/// Prefix prepended to normalized phone numbers.
pub const PHONE_COUNTRY_CODE: &str = "PHONE_COUNTRY_CODE";
/// Path of the recipient workbook.
pub const BROADCAST_DATA_FILE: &str = "BROADCAST_DATA_FILE";
/// Comma-separated gateway API keys.
pub const BROADCAST_API_KEYS: &str = "BROADCAST_API_KEYS";
/// Gateway bind host.
pub const BROADCAST_HOST: &str = "BROADCAST_HOST";
/// Gateway bind port.
pub const BROADCAST_PORT: &str = "BROADCAST_PORT";

/// Keys without which no run can start, in reporting order.
pub const REQUIRED_KEYS: [&str; 5] = [TG_API_ID, TG_API_HASH, TG_SESSION_STRING, GMAIL_USER, GMAIL_PASS];

/// Every key the resolver knows about.
pub const ALL_KEYS: [&str; 13] = [
    TG_API_ID,
    TG_API_HASH,
    TG_SESSION_STRING,
    GMAIL_USER,
    GMAIL_PASS,
    EMAIL_SUBJECT,
    SMTP_HOST,
    SMTP_PORT,
    PHONE_COUNTRY_CODE,
    BROADCAST_DATA_FILE,
    BROADCAST_API_KEYS,
    BROADCAST_HOST,
    BROADCAST_PORT,
];

fn default_subject() -> String {
    "Update".to_string()
}
fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_country_code() -> String {
    "+91".to_string()
}
fn default_data_file() -> PathBuf {
    PathBuf::from("data.xlsx")
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8501
}

// --- Providers ---

/// A source of configuration values.
pub trait ConfigProvider: Send + Sync {
    /// Short label used when reporting where a value came from.
    fn name(&self) -> &str;

    /// The value for `key`, or `None` when this provider does not hold it.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment (including anything loaded from `.env`).
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvProvider;

impl ConfigProvider for EnvProvider {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Flat `KEY = value` TOML file of secrets.
///
/// A missing file yields an empty provider rather than an error.
#[derive(Debug, Default, Clone)]
pub struct SecretsFileProvider {
    values: HashMap<String, String>,
}

impl SecretsFileProvider {
    /// Loads `path`; returns an empty provider when the file does not exist.
    pub fn load(path: &Path) -> BroadcastResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No secrets file, skipping");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|e| {
            BroadcastError::Config(format!("Invalid secrets file '{}': {e}", path.display()))
        })
    }

    /// Parses secrets from TOML text. Top-level scalars only; tables are ignored.
    pub fn from_toml_str(raw: &str) -> BroadcastResult<Self> {
        let table: toml::Table =
            toml::from_str(raw).map_err(|e| BroadcastError::Config(e.to_string()))?;
        let values = table
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s,
                    toml::Value::Integer(n) => n.to_string(),
                    toml::Value::Float(n) => n.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    _ => return None,
                };
                Some((key, value))
            })
            .collect();
        Ok(Self { values })
    }
}

impl ConfigProvider for SecretsFileProvider {
    fn name(&self) -> &str {
        "secrets file"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// In-memory provider, mostly for tests and overrides.
#[derive(Debug, Default, Clone)]
pub struct StaticProvider {
    label: String,
    values: HashMap<String, String>,
}

impl StaticProvider {
    /// Creates a provider from key/value pairs.
    pub fn new<K, V>(label: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            label: label.into(),
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl ConfigProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.label
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Ordered chain of providers; first non-empty value wins.
#[derive(Default)]
pub struct ConfigResolver {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl ConfigResolver {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a provider with lower precedence than those already added.
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    /// Looks `key` up, returning the value and the name of the provider.
    pub fn lookup(&self, key: &str) -> Option<(String, &str)> {
        self.providers.iter().find_map(|provider| {
            provider
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (v, provider.name()))
        })
    }

    /// Looks `key` up, discarding the source.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lookup(key).map(|(value, _)| value)
    }

    /// Number of providers in the chain.
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

// --- Resolved config ---

/// Telegram user-session credentials.
#[derive(Clone)]
pub struct TelegramSettings {
    /// Application id from my.telegram.org.
    pub api_id: i32,
    /// Application hash from my.telegram.org.
    pub api_hash: String,
    /// Pre-authorized session, base64 encoded.
    pub session_string: String,
}

/// SMTP relay credentials and endpoint.
#[derive(Clone)]
pub struct MailSettings {
    /// Relay host.
    pub host: String,
    /// Relay port; STARTTLS is negotiated.
    pub port: u16,
    /// Login, also used as the sender address.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Web gateway settings.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Accepted API keys; empty disables auth.
    pub api_keys: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_keys: Vec::new(),
        }
    }
}

/// Everything a broadcast run needs, resolved once at startup.
#[derive(Clone)]
pub struct BroadcasterConfig {
    /// Chat platform credentials.
    pub telegram: TelegramSettings,
    /// Mail relay credentials.
    pub mail: MailSettings,
    /// Subject line of every email.
    pub email_subject: String,
    /// Prefix for normalized phone numbers.
    pub country_code: String,
    /// Recipient workbook.
    pub data_file: PathBuf,
    /// Web gateway settings.
    pub gateway: GatewaySettings,
}

impl BroadcasterConfig {
    /// Resolves every key through `resolver`.
    ///
    /// All missing required keys are reported together in one
    /// [`BroadcastError::Config`].
    pub fn resolve(resolver: &ConfigResolver) -> BroadcastResult<Self> {
        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| resolver.get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(BroadcastError::Config(format!(
                "Missing configuration: {}",
                missing.join(", ")
            )));
        }

        let required = |key: &str| {
            resolver
                .get(key)
                .ok_or_else(|| BroadcastError::Config(format!("Missing configuration: {key}")))
        };

        let api_id = parse_number::<i32>(TG_API_ID, &required(TG_API_ID)?)?;
        let smtp_port = resolver
            .get(SMTP_PORT)
            .map(|raw| parse_number::<u16>(SMTP_PORT, &raw))
            .transpose()?
            .unwrap_or_else(default_smtp_port);
        let gateway_port = resolver
            .get(BROADCAST_PORT)
            .map(|raw| parse_number::<u16>(BROADCAST_PORT, &raw))
            .transpose()?
            .unwrap_or_else(default_port);

        let api_keys = resolver
            .get(BROADCAST_API_KEYS)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            telegram: TelegramSettings {
                api_id,
                api_hash: required(TG_API_HASH)?,
                session_string: required(TG_SESSION_STRING)?,
            },
            mail: MailSettings {
                host: resolver.get(SMTP_HOST).unwrap_or_else(default_smtp_host),
                port: smtp_port,
                username: required(GMAIL_USER)?,
                password: required(GMAIL_PASS)?,
            },
            email_subject: resolver.get(EMAIL_SUBJECT).unwrap_or_else(default_subject),
            country_code: resolver
                .get(PHONE_COUNTRY_CODE)
                .unwrap_or_else(default_country_code),
            data_file: resolver
                .get(BROADCAST_DATA_FILE)
                .map(PathBuf::from)
                .unwrap_or_else(default_data_file),
            gateway: GatewaySettings {
                host: resolver.get(BROADCAST_HOST).unwrap_or_else(default_host),
                port: gateway_port,
                api_keys,
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> BroadcastResult<T> {
    raw.parse()
        .map_err(|_| BroadcastError::Config(format!("{key} must be a number, got '{raw}'")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn complete() -> StaticProvider {
        StaticProvider::new(
            "test",
            [
                (TG_API_ID, "123456"),
                (TG_API_HASH, "abcdef"),
                (TG_SESSION_STRING, "c2Vzc2lvbg=="),
                (GMAIL_USER, "sender@example.com"),
                (GMAIL_PASS, "app-password"),
            ],
        )
    }

    #[test]
    fn test_first_provider_wins() {
        let resolver = ConfigResolver::new()
            .with_provider(StaticProvider::new("first", [(EMAIL_SUBJECT, "Hello")]))
            .with_provider(StaticProvider::new("second", [(EMAIL_SUBJECT, "Ignored")]));
        assert_eq!(
            resolver.lookup(EMAIL_SUBJECT),
            Some(("Hello".to_string(), "first"))
        );
    }

    #[test]
    fn test_empty_value_falls_through() {
        let resolver = ConfigResolver::new()
            .with_provider(StaticProvider::new("first", [(EMAIL_SUBJECT, "  ")]))
            .with_provider(StaticProvider::new("second", [(EMAIL_SUBJECT, "Fallback")]));
        assert_eq!(resolver.get(EMAIL_SUBJECT).as_deref(), Some("Fallback"));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = BroadcasterConfig::resolve(&ConfigResolver::new().with_provider(complete())).unwrap();
        assert_eq!(config.telegram.api_id, 123_456);
        assert_eq!(config.email_subject, "Update");
        assert_eq!(config.mail.host, "smtp.gmail.com");
        assert_eq!(config.mail.port, 587);
        assert_eq!(config.country_code, "+91");
        assert_eq!(config.data_file, PathBuf::from("data.xlsx"));
        assert!(config.gateway.api_keys.is_empty());
    }

    #[test]
    fn test_missing_keys_reported_together() {
        let resolver = ConfigResolver::new().with_provider(StaticProvider::new(
            "partial",
            [(TG_API_HASH, "abcdef"), (GMAIL_USER, "sender@example.com")],
        ));
        let err = BroadcasterConfig::resolve(&resolver).err().unwrap();
        let msg = err.to_string();
        assert!(msg.contains("TG_API_ID"));
        assert!(msg.contains("TG_SESSION_STRING"));
        assert!(msg.contains("GMAIL_PASS"));
        assert!(!msg.contains("TG_API_HASH"));
    }

    #[test]
    fn test_bad_api_id() {
        let resolver = ConfigResolver::new()
            .with_provider(StaticProvider::new("override", [(TG_API_ID, "abc")]))
            .with_provider(complete());
        let err = BroadcasterConfig::resolve(&resolver).err().unwrap();
        assert!(matches!(err, BroadcastError::Config(_)));
    }

    #[test]
    fn test_api_keys_split() {
        let resolver = ConfigResolver::new()
            .with_provider(StaticProvider::new("keys", [(BROADCAST_API_KEYS, "a, b,,c")]))
            .with_provider(complete());
        let config = BroadcasterConfig::resolve(&resolver).unwrap();
        assert_eq!(config.gateway.api_keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_secrets_toml_scalars() {
        let provider = SecretsFileProvider::from_toml_str(
            "TG_API_ID = 123456\nTG_API_HASH = \"abc\"\n[nested]\nkey = 1\n",
        )
        .unwrap();
        assert_eq!(provider.get(TG_API_ID).as_deref(), Some("123456"));
        assert_eq!(provider.get(TG_API_HASH).as_deref(), Some("abc"));
        assert!(provider.get("nested").is_none());
    }

    #[test]
    fn test_missing_secrets_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = SecretsFileProvider::load(&tmp.path().join("secrets.toml")).unwrap();
        assert!(provider.get(TG_API_ID).is_none());
    }
}
