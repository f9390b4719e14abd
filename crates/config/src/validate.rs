//! Startup validation of the configuration document.
//!
//! Errors make the bot refuse to start; warnings are logged and ignored.

use crate::schema::{GateConfig, PLACEHOLDER_CHANNEL, PLACEHOLDER_TOKEN};

/// URL schemes Telegram accepts on inline URL buttons.
const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "tg"];

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "credential", "channels", "messages", "buttons"
    pub category: &'static str,
    /// Dotted path, e.g. "channels[1].url"
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}: {}", self.severity, self.category, self.path, self.message)
    }
}

/// Result of validating a configuration document.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Error diagnostics joined into one line.
    #[must_use]
    pub fn summary(&self) -> String {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn error(&mut self, category: &'static str, path: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category,
            path: path.into(),
            message: message.into(),
        });
    }

    fn warning(
        &mut self,
        category: &'static str,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category,
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Check that `cfg` is complete enough to run the gate.
#[must_use]
pub fn validate(cfg: &GateConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let token = cfg.token().trim();
    if token.is_empty() {
        result.error("credential", "bot_token", "bot token is required");
    } else if token == PLACEHOLDER_TOKEN {
        result.error("credential", "bot_token", "bot token is still the placeholder value");
    }

    if cfg.channels.is_empty() {
        result.error("channels", "channels", "at least one channel is required");
    }

    let mut seen = std::collections::HashSet::new();
    for (i, channel) in cfg.channels.iter().enumerate() {
        let id = channel.id.trim();
        if id.is_empty() {
            result.error("channels", format!("channels[{i}].id"), "channel id is empty");
        } else if id == PLACEHOLDER_CHANNEL {
            result.error(
                "channels",
                format!("channels[{i}].id"),
                "channel id is still the placeholder value",
            );
        } else if !seen.insert(id) {
            result.warning(
                "channels",
                format!("channels[{i}].id"),
                format!("duplicate channel id {id}"),
            );
        }

        match url::Url::parse(channel.url.trim()) {
            Ok(u) if ALLOWED_URL_SCHEMES.contains(&u.scheme()) => {},
            Ok(u) => result.error(
                "channels",
                format!("channels[{i}].url"),
                format!("unsupported url scheme '{}'", u.scheme()),
            ),
            Err(e) => result.error(
                "channels",
                format!("channels[{i}].url"),
                format!("invalid url: {e}"),
            ),
        }

        if channel.name.trim().is_empty() {
            result.warning("channels", format!("channels[{i}].name"), "channel name is empty");
        }
    }

    // Telegram rejects empty message text and empty button labels, so these
    // would fail every /start or every reveal.
    for (path, text) in [
        ("messages.welcome_message", &cfg.messages.welcome_message),
        ("messages.app_info_message", &cfg.messages.app_info_message),
    ] {
        if text.trim().is_empty() {
            result.error("messages", path, "message text is required");
        }
    }
    if cfg.buttons.check_subscription_text.trim().is_empty() {
        result.error(
            "buttons",
            "buttons.check_subscription_text",
            "button label is required",
        );
    }

    for (path, text) in [
        ("messages.not_subscribed_message", &cfg.messages.not_subscribed_message),
        ("messages.error_message", &cfg.messages.error_message),
    ] {
        if text.trim().is_empty() {
            result.warning("messages", path, "message text is empty");
        }
    }
    if cfg.buttons.channel_button_text.trim().is_empty() {
        result.warning("buttons", "buttons.channel_button_text", "button label is empty");
    }

    if cfg.check_timeout_secs == 0 {
        result.error("channels", "check_timeout_secs", "check timeout must be positive");
    }

    result
}
