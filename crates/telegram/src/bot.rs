use std::{sync::Arc, time::Duration};

use {
    subgate_config::GateConfig,
    teloxide::{
        ApiError, RequestError,
        prelude::*,
        types::{AllowedUpdate, BotCommand},
    },
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, info, warn},
};

use crate::{
    gate::Gate,
    handlers,
    membership::TelegramMembershipOracle,
    outbound::TelegramOutbound,
    state::{BotState, SharedBotState},
};

/// Long-poll timeout passed to `getUpdates`, in seconds.
const POLL_TIMEOUT_SECS: u32 = 30;

/// Delay before retrying after a failed `getUpdates`.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// A running polling loop.
pub struct PollingHandle {
    pub cancel: CancellationToken,
    pub task: JoinHandle<()>,
}

impl PollingHandle {
    /// Stop polling and wait for the loop to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "telegram polling task ended abnormally");
        }
    }
}

/// Connect to Telegram and start polling for updates.
///
/// Verifies the token with `getMe`, clears any webhook, registers the
/// `/start` command, and spawns the polling loop.
pub async fn start_polling(config: GateConfig) -> anyhow::Result<PollingHandle> {
    // Client timeout must outlast the long-poll timeout, or the HTTP client
    // aborts the request before Telegram responds.
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(u64::from(POLL_TIMEOUT_SECS) + 15))
        .build()?;
    let bot = Bot::with_client(config.token(), client);

    let me = bot.get_me().await?;
    let bot_username = me.username.clone();

    bot.delete_webhook().send().await?;

    let commands = vec![BotCommand::new("start", "Show the channels to join")];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("failed to register bot commands: {e}");
    }

    info!(
        username = ?bot_username,
        channels = config.channels.len(),
        "telegram bot connected (webhook cleared)"
    );

    let oracle = Arc::new(TelegramMembershipOracle::new(bot.clone()));
    let gate = Gate::new(config, oracle)?;
    let state: SharedBotState = Arc::new(BotState {
        bot: bot.clone(),
        bot_username,
        gate: Arc::new(gate),
        outbound: Arc::new(TelegramOutbound::new(bot)),
    });

    let cancel = CancellationToken::new();
    let task = tokio::spawn(poll_updates(state, cancel.clone()));

    Ok(PollingHandle { cancel, task })
}

async fn poll_updates(state: SharedBotState, cancel: CancellationToken) {
    info!("starting telegram polling loop");
    let mut offset: i32 = 0;

    loop {
        let request = state
            .bot
            .get_updates()
            .offset(offset)
            .timeout(POLL_TIMEOUT_SECS)
            .allowed_updates(vec![AllowedUpdate::Message, AllowedUpdate::CallbackQuery]);

        let result = tokio::select! {
            () = cancel.cancelled() => {
                info!("telegram polling stopped");
                break;
            },
            result = request.send() => result,
        };

        match result {
            Ok(updates) => {
                debug!(count = updates.len(), "got telegram updates");
                for update in updates {
                    offset = update.id.as_offset();
                    let state = Arc::clone(&state);
                    // Users are independent; a slow membership check must not
                    // hold up anyone else's updates.
                    tokio::spawn(async move {
                        if let Err(e) = handlers::handle_update(update, &state).await {
                            error!(error = %e, "error handling telegram update");
                        }
                    });
                }
            },
            Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                error!(
                    "telegram polling disabled: another instance is already running with this token"
                );
                cancel.cancel();
                break;
            },
            Err(e) => {
                warn!(error = %e, "telegram getUpdates failed");
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(POLL_ERROR_BACKOFF) => {},
                }
            },
        }
    }
}
