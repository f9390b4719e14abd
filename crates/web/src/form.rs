//! Mapping of the submitted settings form onto a [`GateConfig`].

use std::collections::{BTreeMap, HashMap};

use {
    secrecy::Secret,
    subgate_config::{ChannelConfig, GateConfig},
};

const CHANNEL_ID_PREFIX: &str = "channel_id_";

/// Apply the submitted `fields` to `current`.
///
/// Fields absent from the form keep their current value, so settings the page
/// does not expose (such as `check_timeout_secs`) survive a save. Channel rows
/// are ordered by their numeric suffix and rows with a blank id are dropped.
#[must_use]
pub fn apply_form(mut current: GateConfig, fields: &HashMap<String, String>) -> GateConfig {
    let field = |name: &str| fields.get(name).map(|v| normalize_newlines(v));

    if let Some(token) = field("bot_token") {
        current.bot_token = Secret::new(token.trim().to_string());
    }

    if fields.keys().any(|k| k.starts_with(CHANNEL_ID_PREFIX)) {
        current.channels = channels_from_form(fields);
    }

    let messages = &mut current.messages;
    for (name, slot) in [
        ("welcome_message", &mut messages.welcome_message),
        ("app_info_message", &mut messages.app_info_message),
        ("not_subscribed_message", &mut messages.not_subscribed_message),
        ("error_message", &mut messages.error_message),
    ] {
        if let Some(value) = field(name) {
            *slot = value;
        }
    }

    let buttons = &mut current.buttons;
    for (name, slot) in [
        ("channel_button_text", &mut buttons.channel_button_text),
        ("check_subscription_text", &mut buttons.check_subscription_text),
    ] {
        if let Some(value) = field(name) {
            *slot = value.trim().to_string();
        }
    }

    current
}

fn channels_from_form(fields: &HashMap<String, String>) -> Vec<ChannelConfig> {
    let rows: BTreeMap<usize, &str> = fields
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(CHANNEL_ID_PREFIX)?.parse().ok()?;
            Some((index, value.trim()))
        })
        .collect();

    rows.into_iter()
        .filter(|(_, id)| !id.is_empty())
        .map(|(index, id)| {
            let column = |name: &str| {
                fields
                    .get(&format!("channel_{name}_{index}"))
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            };
            ChannelConfig {
                id: id.to_string(),
                url: column("url"),
                name: column("name"),
            }
        })
        .collect()
}

/// Browsers submit textarea content with CRLF line endings.
fn normalize_newlines(value: &str) -> String {
    value.replace("\r\n", "\n")
}
