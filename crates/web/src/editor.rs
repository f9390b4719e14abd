//! Settings page handlers.

use std::collections::HashMap;

use {
    axum::{Form, extract::State, response::Html},
    subgate_config::{load_config_or_default, save_config, validate},
    tracing::{info, warn},
};

use crate::{
    AppState, Result,
    templates::{Notice, render_editor},
};

pub(crate) async fn show_handler(State(state): State<AppState>) -> Result<Html<String>> {
    let path = state.config_path.clone();
    let config = tokio::task::spawn_blocking(move || load_config_or_default(&path)).await?;
    render_editor(&state.display_path(), &config, None, Vec::new())
}

/// Save the submitted form and re-render the page.
///
/// The document is written even when validation reports errors; the
/// diagnostics are shown so the operator can fix them before starting the bot.
pub(crate) async fn save_handler(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Html<String>> {
    let _guard = state.save_lock.lock().await;

    let path = state.config_path.clone();
    let (config, saved) = tokio::task::spawn_blocking(move || {
        let config = crate::form::apply_form(load_config_or_default(&path), &fields);
        let saved = save_config(&path, &config);
        (config, saved)
    })
    .await?;

    let display_path = state.display_path();
    let (notice, diagnostics) = match saved {
        Ok(()) => {
            let report = validate(&config);
            info!(
                path = %display_path,
                channels = config.channels.len(),
                errors = report.has_errors(),
                "configuration saved"
            );
            let diagnostics: Vec<String> =
                report.diagnostics.iter().map(ToString::to_string).collect();
            let notice = if report.has_errors() {
                Notice::error(
                    "Settings saved, but the bot will not start until the errors below are fixed.",
                )
            } else {
                Notice::success("Settings saved. Restart the bot to apply them.")
            };
            (notice, diagnostics)
        },
        Err(e) => {
            warn!(path = %display_path, error = %e, "failed to save configuration");
            (Notice::error(format!("Failed to save settings: {e}")), Vec::new())
        },
    };

    render_editor(&display_path, &config, Some(notice), diagnostics)
}

pub(crate) async fn health_handler() -> &'static str {
    "ok"
}
