use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    teloxide::{
        ApiError, RequestError,
        payloads::{AnswerCallbackQuerySetters, EditMessageTextSetters, SendMessageSetters},
        prelude::*,
        types::{ChatId, InlineKeyboardMarkup, MessageId, ParseMode},
    },
    tracing::{debug, warn},
};

use crate::{Result, keyboard::Keyboard};

const TELEGRAM_RETRY_AFTER_MAX_RETRIES: usize = 4;

/// Actions the gate performs towards the user.
#[async_trait]
pub trait GateOutbound: Send + Sync {
    /// Send a new plain-text message, optionally with an inline keyboard.
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()>;

    /// Replace a message's text (rendered as HTML), dropping its keyboard.
    async fn edit_message(&self, chat_id: ChatId, message_id: MessageId, text: &str)
    -> Result<()>;

    /// Answer a button press. `alert` shows a modal instead of a toast; no
    /// text just clears the client's loading indicator.
    async fn show_notice(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<()>;
}

/// [`GateOutbound`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramOutbound {
    bot: Bot,
}

impl TelegramOutbound {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut request: F,
    ) -> std::result::Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, RequestError>>,
    {
        let mut retries = 0usize;

        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    let Some(wait) = retry_after_duration(&err) else {
                        return Err(err);
                    };

                    if retries >= TELEGRAM_RETRY_AFTER_MAX_RETRIES {
                        warn!(
                            operation,
                            retries,
                            retry_after_secs = wait.as_secs(),
                            "telegram rate limit persisted after retries"
                        );
                        return Err(err);
                    }

                    retries += 1;
                    warn!(
                        operation,
                        retries,
                        max_retries = TELEGRAM_RETRY_AFTER_MAX_RETRIES,
                        retry_after_secs = wait.as_secs(),
                        "telegram rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                },
            }
        }
    }
}

#[async_trait]
impl GateOutbound for TelegramOutbound {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<()> {
        let markup = keyboard.map(InlineKeyboardMarkup::try_from).transpose()?;
        self.run_with_retry("send message", || {
            let mut req = self.bot.send_message(chat_id, text);
            if let Some(ref markup) = markup {
                req = req.reply_markup(markup.clone());
            }
            async move { req.await }
        })
        .await?;
        debug!(chat_id = chat_id.0, "sent message");
        Ok(())
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
    ) -> Result<()> {
        let result = self
            .run_with_retry("edit message", || {
                let req = self
                    .bot
                    .edit_message_text(chat_id, message_id, text)
                    .parse_mode(ParseMode::Html);
                async move { req.await }
            })
            .await;
        match result {
            Ok(_) => Ok(()),
            // Pressing the button twice on an already revealed message.
            Err(e) if is_message_not_modified_error(&e) => {
                debug!(chat_id = chat_id.0, "message already shows the content");
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn show_notice(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<()> {
        self.run_with_retry("answer callback", || {
            let mut req = self.bot.answer_callback_query(callback_id);
            if let Some(text) = text {
                req = req.text(text).show_alert(alert);
            }
            async move { req.await }
        })
        .await?;
        Ok(())
    }
}

fn retry_after_duration(error: &RequestError) -> Option<Duration> {
    match error {
        RequestError::RetryAfter(wait) => Some(wait.duration()),
        _ => None,
    }
}

fn is_message_not_modified_error(error: &RequestError) -> bool {
    matches!(error, RequestError::Api(ApiError::MessageNotModified))
}
