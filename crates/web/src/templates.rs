//! Askama template for the settings page.

use {
    askama::Template,
    axum::response::Html,
    subgate_config::{ButtonsConfig, GateConfig, MessagesConfig},
};

use crate::Result;

/// Blank channel rows rendered after the configured ones.
const EMPTY_CHANNEL_ROWS: usize = 1;

#[derive(Template)]
#[template(path = "editor.html", escape = "html")]
pub(crate) struct EditorTemplate<'a> {
    pub config_path: &'a str,
    pub bot_token: &'a str,
    pub channels: Vec<ChannelRow>,
    pub messages: &'a MessagesConfig,
    pub buttons: &'a ButtonsConfig,
    pub notice: Option<Notice>,
    pub diagnostics: Vec<String>,
}

pub(crate) struct ChannelRow {
    pub index: usize,
    pub id: String,
    pub url: String,
    pub name: String,
}

pub(crate) struct Notice {
    /// CSS suffix: "success" or "error".
    pub kind: &'static str,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: "success",
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: "error",
            text: text.into(),
        }
    }
}

pub(crate) fn channel_rows(config: &GateConfig) -> Vec<ChannelRow> {
    let mut rows: Vec<ChannelRow> = config
        .channels
        .iter()
        .enumerate()
        .map(|(index, c)| ChannelRow {
            index,
            id: c.id.clone(),
            url: c.url.clone(),
            name: c.name.clone(),
        })
        .collect();
    let next = rows.len();
    rows.extend((next..next + EMPTY_CHANNEL_ROWS).map(|index| ChannelRow {
        index,
        id: String::new(),
        url: String::new(),
        name: String::new(),
    }));
    rows
}

/// Render the settings page for `config`.
pub(crate) fn render_editor(
    config_path: &str,
    config: &GateConfig,
    notice: Option<Notice>,
    diagnostics: Vec<String>,
) -> Result<Html<String>> {
    let template = EditorTemplate {
        config_path,
        bot_token: config.token(),
        channels: channel_rows(config),
        messages: &config.messages,
        buttons: &config.buttons,
        notice,
        diagnostics,
    };
    Ok(Html(template.render()?))
}
