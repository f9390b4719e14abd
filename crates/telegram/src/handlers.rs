use {
    teloxide::types::{CallbackQuery, Message, Update, UpdateKind},
    tracing::debug,
};

use crate::{gate::CheckRequest, keyboard::CHECK_SUBSCRIPTION_DATA, state::BotState};

/// Route one update to its handler.
pub async fn handle_update(update: Update, state: &BotState) -> anyhow::Result<()> {
    match update.kind {
        UpdateKind::Message(msg) => handle_message(msg, state).await,
        UpdateKind::CallbackQuery(query) => handle_callback_query(query, state).await,
        other => {
            debug!("ignoring unsupported update: {other:?}");
            Ok(())
        },
    }
}

/// Handle an inbound message. Only the start command is acted on.
pub async fn handle_message(msg: Message, state: &BotState) -> anyhow::Result<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "ignoring non-text message");
        return Ok(());
    };
    if !is_start_command(text, state.bot_username.as_deref()) {
        debug!(chat_id = msg.chat.id.0, "ignoring message that is not /start");
        return Ok(());
    }
    let Some(user) = msg.from.as_ref() else {
        debug!(chat_id = msg.chat.id.0, "ignoring /start without sender");
        return Ok(());
    };

    debug!(user_id = user.id.0, chat_id = msg.chat.id.0, "start command");
    state
        .gate
        .handle_start(user.id, msg.chat.id, state.outbound.as_ref())
        .await?;
    Ok(())
}

/// Handle an inline keyboard button press.
pub async fn handle_callback_query(query: CallbackQuery, state: &BotState) -> anyhow::Result<()> {
    if query.data.as_deref() != Some(CHECK_SUBSCRIPTION_DATA) {
        debug!(callback_data = ?query.data, "ignoring unknown callback data");
        state
            .outbound
            .show_notice(&query.id, None, false)
            .await?;
        return Ok(());
    }

    let request = CheckRequest {
        callback_id: query.id.clone(),
        message: query.message.as_ref().map(|m| (m.chat().id, m.id())),
    };
    let outcome = state
        .gate
        .handle_check(query.from.id, &request, state.outbound.as_ref())
        .await?;
    debug!(user_id = query.from.id.0, ?outcome, "subscription check handled");
    Ok(())
}

/// `/start`, `/start <payload>` and `/start@<bot_username>`.
fn is_start_command(text: &str, bot_username: Option<&str>) -> bool {
    let Some(command) = text.split_whitespace().next() else {
        return false;
    };
    match command.split_once('@') {
        None => command == "/start",
        Some((cmd, target)) => {
            cmd == "/start"
                && bot_username.is_some_and(|name| name.eq_ignore_ascii_case(target))
        },
    }
}
