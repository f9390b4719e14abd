//! Channel membership queries.

use {
    async_trait::async_trait,
    teloxide::{
        prelude::*,
        types::{ChatMemberStatus, Recipient},
    },
};

use crate::Result;

/// A user's relationship to a channel, as reported by Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MembershipStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
}

impl MembershipStatus {
    /// Whether this status satisfies the gate.
    #[must_use]
    pub fn is_subscribed(self) -> bool {
        matches!(self, Self::Creator | Self::Administrator | Self::Member)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Kicked => "kicked",
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ChatMemberStatus> for MembershipStatus {
    fn from(status: ChatMemberStatus) -> Self {
        match status {
            ChatMemberStatus::Owner => Self::Creator,
            ChatMemberStatus::Administrator => Self::Administrator,
            ChatMemberStatus::Member => Self::Member,
            ChatMemberStatus::Restricted => Self::Restricted,
            ChatMemberStatus::Left => Self::Left,
            ChatMemberStatus::Banned => Self::Kicked,
        }
    }
}

/// Source of truth for channel membership.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    /// Look up `user_id` in `channel_id` (a numeric chat id or `@handle`).
    async fn get_membership(&self, channel_id: &str, user_id: UserId)
    -> Result<MembershipStatus>;
}

/// [`MembershipOracle`] backed by the Bot API `getChatMember` method.
///
/// The bot must be an administrator of every private channel it checks.
#[derive(Clone)]
pub struct TelegramMembershipOracle {
    bot: Bot,
}

impl TelegramMembershipOracle {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl MembershipOracle for TelegramMembershipOracle {
    async fn get_membership(
        &self,
        channel_id: &str,
        user_id: UserId,
    ) -> Result<MembershipStatus> {
        let member = self
            .bot
            .get_chat_member(channel_recipient(channel_id), user_id)
            .await?;
        Ok(member.status().into())
    }
}

/// Map a configured channel identifier to a Bot API chat reference.
///
/// Numeric ids (`-1001234567890`) address the chat directly; anything else is
/// treated as a public username, with the leading `@` added when missing.
pub fn channel_recipient(channel_id: &str) -> Recipient {
    let id = channel_id.trim();
    match id.parse::<i64>() {
        Ok(n) => Recipient::Id(ChatId(n)),
        Err(_) if id.starts_with('@') => Recipient::ChannelUsername(id.to_string()),
        Err(_) => Recipient::ChannelUsername(format!("@{id}")),
    }
}
