//! Configuration document types.
//!
//! The on-disk shape is the JSON document shared by the bot and the config
//! editor; field names are part of that contract.

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Placeholder token shipped in the sample document.
pub const PLACEHOLDER_TOKEN: &str = "YOUR_BOT_TOKEN_HERE";

/// Placeholder channel handle shipped in the sample document.
pub const PLACEHOLDER_CHANNEL: &str = "@your_channel_username";

/// Display name given to the channel supplied through `CHANNEL_ID`/`CHANNEL_URL`.
pub const LEGACY_CHANNEL_NAME: &str = "Channel";

/// Default per-query timeout for membership checks, in seconds.
pub const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 10;

/// Root configuration document.
#[derive(Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Bot token from @BotFather.
    #[serde(default = "empty_secret", serialize_with = "serialize_secret")]
    pub bot_token: Secret<String>,

    /// Channels the user must join, in keyboard order.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    #[serde(default)]
    pub messages: MessagesConfig,

    #[serde(default)]
    pub buttons: ButtonsConfig,

    /// Upper bound on a single membership query.
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
}

/// A required channel.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Numeric chat id (`-100…`) or public `@handle`.
    pub id: String,
    /// Join link opened by the channel button.
    pub url: String,
    /// Name shown after the channel button caption.
    #[serde(default)]
    pub name: String,
}

/// User-facing texts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MessagesConfig {
    pub welcome_message: String,
    /// Protected content, sent with HTML parse mode.
    pub app_info_message: String,
    pub not_subscribed_message: String,
    /// Alert shown when a membership query fails.
    pub error_message: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            welcome_message: "Subscribe to the channels below, then press the check button."
                .into(),
            app_info_message: String::new(),
            not_subscribed_message: "You are not subscribed to all channels yet.".into(),
            error_message: "An error occurred while checking your subscription. Please try \
                            again later."
                .into(),
        }
    }
}

/// Inline keyboard captions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ButtonsConfig {
    /// Prefix of every channel button, followed by the channel name.
    pub channel_button_text: String,
    pub check_subscription_text: String,
}

impl Default for ButtonsConfig {
    fn default() -> Self {
        Self {
            channel_button_text: "Subscribe to".into(),
            check_subscription_text: "Check subscription".into(),
        }
    }
}

impl GateConfig {
    #[must_use]
    pub fn token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    #[must_use]
    pub fn check_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_timeout_secs)
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            bot_token: empty_secret(),
            channels: Vec::new(),
            messages: MessagesConfig::default(),
            buttons: ButtonsConfig::default(),
            check_timeout_secs: DEFAULT_CHECK_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("bot_token", &"[REDACTED]")
            .field("channels", &self.channels)
            .field("check_timeout_secs", &self.check_timeout_secs)
            .finish_non_exhaustive()
    }
}

fn empty_secret() -> Secret<String> {
    Secret::new(String::new())
}

fn default_check_timeout_secs() -> u64 {
    DEFAULT_CHECK_TIMEOUT_SECS
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
