use std::sync::Arc;

use crate::{gate::Gate, outbound::GateOutbound};

/// Shared runtime state handed to every update handler.
pub type SharedBotState = Arc<BotState>;

pub struct BotState {
    pub bot: teloxide::Bot,
    /// Used to recognise `/start@<username>` in group chats.
    pub bot_username: Option<String>,
    pub gate: Arc<Gate>,
    pub outbound: Arc<dyn GateOutbound>,
}
