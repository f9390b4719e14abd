//! Welcome keyboard rendering.
//!
//! [`render_keyboard`] is a pure function of the configuration; conversion to
//! Telegram's markup happens only when the keyboard is sent.

use {
    subgate_config::GateConfig,
    teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup},
};

use crate::{Error, Result};

/// Callback data carried by the "check subscription" button.
pub const CHECK_SUBSCRIPTION_DATA: &str = "check_subscription";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    /// Open a link (the channel's join URL).
    Url(String),
    /// Send a callback query with this data.
    Callback(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardButton {
    pub text: String,
    pub action: ButtonAction,
}

/// Inline keyboard, one button per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<KeyboardButton>>,
}

impl Keyboard {
    pub fn buttons(&self) -> impl Iterator<Item = &KeyboardButton> {
        self.rows.iter().flatten()
    }
}

/// Build the welcome keyboard: a join button per channel in configured
/// order, then the check button.
#[must_use]
pub fn render_keyboard(config: &GateConfig) -> Keyboard {
    let prefix = config.buttons.channel_button_text.trim();
    let mut rows: Vec<Vec<KeyboardButton>> = config
        .channels
        .iter()
        .map(|channel| {
            let text = format!("{prefix} {}", channel.name.trim()).trim().to_string();
            vec![KeyboardButton {
                text,
                action: ButtonAction::Url(channel.url.trim().to_string()),
            }]
        })
        .collect();

    rows.push(vec![KeyboardButton {
        text: config.buttons.check_subscription_text.clone(),
        action: ButtonAction::Callback(CHECK_SUBSCRIPTION_DATA.into()),
    }]);

    Keyboard { rows }
}

impl TryFrom<&Keyboard> for InlineKeyboardMarkup {
    type Error = Error;

    fn try_from(keyboard: &Keyboard) -> Result<Self> {
        let rows = keyboard
            .rows
            .iter()
            .map(|row| row.iter().map(inline_button).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(InlineKeyboardMarkup::new(rows))
    }
}

fn inline_button(button: &KeyboardButton) -> Result<InlineKeyboardButton> {
    match &button.action {
        ButtonAction::Url(url) => {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| Error::external(format!("invalid join url {url}"), e))?;
            Ok(InlineKeyboardButton::url(button.text.clone(), parsed))
        },
        ButtonAction::Callback(data) => Ok(InlineKeyboardButton::callback(
            button.text.clone(),
            data.clone(),
        )),
    }
}
