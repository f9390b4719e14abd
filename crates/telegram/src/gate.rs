//! The subscription gate.
//!
//! Owns the per-user conversation state and runs the membership check that
//! decides whether the protected content is revealed. Conversations move
//! `Unstarted -> AwaitingVerification -> Verified`; `/start` re-arms from any
//! state, and only a check in which every channel passes moves a user to
//! `Verified`. Conversations do not survive a restart, so a check pressed on a
//! keyboard sent by an earlier run is evaluated like any other.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    subgate_config::GateConfig,
    teloxide::types::{ChatId, MessageId, UserId},
    tracing::{debug, info, warn},
};

use crate::{
    Error, Result,
    keyboard::{Keyboard, render_keyboard},
    membership::{MembershipOracle, MembershipStatus},
    outbound::GateOutbound,
};

/// Where a user is in the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConversationState {
    /// No `/start` seen since the process started.
    #[default]
    Unstarted,
    /// Welcome keyboard sent; waiting for a successful check.
    AwaitingVerification,
    /// Content revealed.
    Verified,
}

/// In-memory conversation states keyed by user.
///
/// An absent entry reads as [`ConversationState::Unstarted`]. Nothing is
/// persisted across restarts.
#[derive(Debug, Default)]
pub struct ConversationStore {
    inner: RwLock<HashMap<UserId, ConversationState>>,
}

impl ConversationStore {
    pub fn get(&self, user_id: UserId) -> ConversationState {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&user_id).copied().unwrap_or_default()
    }

    pub fn set(&self, user_id: UserId, state: ConversationState) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        match state {
            ConversationState::Unstarted => {
                map.remove(&user_id);
            },
            state => {
                map.insert(user_id, state);
            },
        }
    }

    /// Move `user_id` from `from` to `to`, returning `false` (and leaving the
    /// entry untouched) if the current state is not `from`.
    pub fn transition(
        &self,
        user_id: UserId,
        from: ConversationState,
        to: ConversationState,
    ) -> bool {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = map.get(&user_id).copied().unwrap_or_default();
        if current != from {
            return false;
        }
        match to {
            ConversationState::Unstarted => {
                map.remove(&user_id);
            },
            to => {
                map.insert(user_id, to);
            },
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of querying every channel for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every channel reported member, administrator or creator.
    Subscribed,
    /// The first channel that did not pass.
    NotSubscribed {
        channel_id: String,
        status: MembershipStatus,
    },
    /// A membership query failed or timed out; later channels were skipped.
    Unavailable { channel_id: String },
}

/// What the user saw after pressing the check button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Revealed,
    NotSubscribed,
    Failed,
}

/// A press of the check button.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub callback_id: String,
    /// Message carrying the keyboard, replaced by the content on success.
    pub message: Option<(ChatId, MessageId)>,
}

pub struct Gate {
    config: Arc<GateConfig>,
    keyboard: Keyboard,
    oracle: Arc<dyn MembershipOracle>,
    conversations: ConversationStore,
    check_timeout: Duration,
}

impl Gate {
    /// Build a gate over `config`.
    ///
    /// Fails with [`Error::NoChannels`] when no channel is configured, since
    /// such a gate would pass every check.
    pub fn new(config: GateConfig, oracle: Arc<dyn MembershipOracle>) -> Result<Self> {
        if config.channels.is_empty() {
            return Err(Error::NoChannels);
        }
        let keyboard = render_keyboard(&config);
        let check_timeout = config.check_timeout();
        Ok(Self {
            config: Arc::new(config),
            keyboard,
            oracle,
            conversations: ConversationStore::default(),
            check_timeout,
        })
    }

    #[must_use]
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    pub fn state(&self, user_id: UserId) -> ConversationState {
        self.conversations.get(user_id)
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Arm the gate for `user_id`, returning the welcome text and keyboard.
    pub fn start(&self, user_id: UserId) -> (&str, &Keyboard) {
        let previous = self.conversations.get(user_id);
        self.conversations
            .set(user_id, ConversationState::AwaitingVerification);
        debug!(user_id = user_id.0, ?previous, "conversation armed");
        (&self.config.messages.welcome_message, &self.keyboard)
    }

    /// Query every channel in configured order, stopping at the first one
    /// that does not pass. Does not change the conversation state.
    pub async fn verify(&self, user_id: UserId) -> Verdict {
        for channel in &self.config.channels {
            let query = self.oracle.get_membership(&channel.id, user_id);
            let status = match tokio::time::timeout(self.check_timeout, query).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    warn!(
                        user_id = user_id.0,
                        channel_id = %channel.id,
                        error = %e,
                        "membership query failed"
                    );
                    return Verdict::Unavailable {
                        channel_id: channel.id.clone(),
                    };
                },
                Err(_) => {
                    let e = Error::Timeout {
                        channel_id: channel.id.clone(),
                        after: self.check_timeout,
                    };
                    warn!(user_id = user_id.0, error = %e, "membership query failed");
                    return Verdict::Unavailable {
                        channel_id: channel.id.clone(),
                    };
                },
            };

            debug!(
                user_id = user_id.0,
                channel_id = %channel.id,
                %status,
                "membership status"
            );
            if !status.is_subscribed() {
                return Verdict::NotSubscribed {
                    channel_id: channel.id.clone(),
                    status,
                };
            }
        }

        Verdict::Subscribed
    }

    /// Handle the start command: arm the conversation and send the welcome
    /// message with the channel keyboard.
    pub async fn handle_start(
        &self,
        user_id: UserId,
        chat_id: ChatId,
        outbound: &dyn GateOutbound,
    ) -> Result<()> {
        let (text, keyboard) = self.start(user_id);
        outbound.send_message(chat_id, text, Some(keyboard)).await
    }

    /// Handle a press of the check button.
    ///
    /// On success the keyboard message is replaced by the content and the
    /// conversation becomes verified; every other verdict answers the press
    /// with an alert and leaves the state alone. A `/start` that lands while
    /// the check is running takes precedence over the verification.
    pub async fn handle_check(
        &self,
        user_id: UserId,
        request: &CheckRequest,
        outbound: &dyn GateOutbound,
    ) -> Result<CheckOutcome> {
        let messages = &self.config.messages;
        let checked_from = self.conversations.get(user_id);
        let verdict = self.verify(user_id).await;

        let (outcome, notice) = match (&verdict, request.message) {
            (Verdict::Subscribed, Some((chat_id, message_id))) => {
                match outbound
                    .edit_message(chat_id, message_id, &messages.app_info_message)
                    .await
                {
                    Ok(()) => {
                        let verified = self.conversations.transition(
                            user_id,
                            checked_from,
                            ConversationState::Verified,
                        );
                        info!(
                            user_id = user_id.0,
                            ?checked_from,
                            verified,
                            "subscription confirmed, content revealed"
                        );
                        (CheckOutcome::Revealed, None)
                    },
                    Err(e) => {
                        warn!(user_id = user_id.0, error = %e, "failed to reveal content");
                        (CheckOutcome::Failed, Some(messages.error_message.as_str()))
                    },
                }
            },
            (Verdict::Subscribed, None) => {
                warn!(user_id = user_id.0, "check pressed without an editable message");
                (CheckOutcome::Failed, Some(messages.error_message.as_str()))
            },
            (Verdict::NotSubscribed { channel_id, status }, _) => {
                info!(user_id = user_id.0, channel_id = %channel_id, %status, "user not subscribed");
                (
                    CheckOutcome::NotSubscribed,
                    Some(messages.not_subscribed_message.as_str()),
                )
            },
            (Verdict::Unavailable { .. }, _) => {
                (CheckOutcome::Failed, Some(messages.error_message.as_str()))
            },
        };

        match notice {
            Some(text) => {
                outbound
                    .show_notice(&request.callback_id, Some(text), true)
                    .await?;
            },
            // Only dismisses the client's loading indicator.
            None => {
                if let Err(e) = outbound.show_notice(&request.callback_id, None, false).await {
                    debug!(user_id = user_id.0, error = %e, "failed to answer callback query");
                }
            },
        }

        Ok(outcome)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        async_trait::async_trait,
        rstest::rstest,
        secrecy::Secret,
        subgate_config::{ChannelConfig, MessagesConfig},
        teloxide::{ApiError, RequestError},
    };

    use super::*;

    const USER: UserId = UserId(1001);
    const CHAT: ChatId = ChatId(1001);
    const MESSAGE: MessageId = MessageId(7);

    #[derive(Clone, Copy)]
    enum Reply {
        Status(MembershipStatus),
        Fail,
        Hang,
    }

    struct ScriptedOracle {
        replies: HashMap<String, Reply>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedOracle {
        fn new(replies: &[(&str, Reply)]) -> Arc<Self> {
            Arc::new(Self {
                replies: replies
                    .iter()
                    .map(|(id, r)| ((*id).to_string(), *r))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MembershipOracle for ScriptedOracle {
        async fn get_membership(
            &self,
            channel_id: &str,
            _user_id: UserId,
        ) -> Result<MembershipStatus> {
            self.calls.lock().unwrap().push(channel_id.to_string());
            match self.replies.get(channel_id).copied() {
                Some(Reply::Status(s)) => Ok(s),
                Some(Reply::Fail) | None => Err(RequestError::Api(ApiError::ChatNotFound).into()),
                Some(Reply::Hang) => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Member)
                },
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Action {
        Send {
            chat_id: ChatId,
            text: String,
            keyboard: Option<Keyboard>,
        },
        Edit {
            chat_id: ChatId,
            message_id: MessageId,
            text: String,
        },
        Notice {
            callback_id: String,
            text: Option<String>,
            alert: bool,
        },
    }

    #[derive(Default)]
    struct RecordingOutbound {
        actions: Mutex<Vec<Action>>,
        fail_edits: bool,
    }

    impl RecordingOutbound {
        fn actions(&self) -> Vec<Action> {
            self.actions.lock().unwrap().clone()
        }

        fn notices(&self) -> Vec<Option<String>> {
            self.actions()
                .into_iter()
                .filter_map(|a| match a {
                    Action::Notice { text, .. } => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn edits(&self) -> usize {
            self.actions()
                .iter()
                .filter(|a| matches!(a, Action::Edit { .. }))
                .count()
        }
    }

    #[async_trait]
    impl GateOutbound for RecordingOutbound {
        async fn send_message(
            &self,
            chat_id: ChatId,
            text: &str,
            keyboard: Option<&Keyboard>,
        ) -> Result<()> {
            self.actions.lock().unwrap().push(Action::Send {
                chat_id,
                text: text.to_string(),
                keyboard: keyboard.cloned(),
            });
            Ok(())
        }

        async fn edit_message(
            &self,
            chat_id: ChatId,
            message_id: MessageId,
            text: &str,
        ) -> Result<()> {
            if self.fail_edits {
                return Err(RequestError::Api(ApiError::MessageToEditNotFound).into());
            }
            self.actions.lock().unwrap().push(Action::Edit {
                chat_id,
                message_id,
                text: text.to_string(),
            });
            Ok(())
        }

        async fn show_notice(&self, callback_id: &str, text: Option<&str>, alert: bool) -> Result<()> {
            self.actions.lock().unwrap().push(Action::Notice {
                callback_id: callback_id.to_string(),
                text: text.map(str::to_string),
                alert,
            });
            Ok(())
        }
    }

    fn config(channel_ids: &[&str]) -> GateConfig {
        GateConfig {
            bot_token: Secret::new("123:ABC".into()),
            channels: channel_ids
                .iter()
                .map(|id| ChannelConfig {
                    id: (*id).into(),
                    url: format!("https://t.me/{}", id.trim_start_matches('@')),
                    name: id.trim_start_matches('@').into(),
                })
                .collect(),
            messages: MessagesConfig {
                welcome_message: "welcome".into(),
                app_info_message: "<b>app info</b>".into(),
                not_subscribed_message: "not subscribed".into(),
                error_message: "try later".into(),
            },
            ..Default::default()
        }
    }

    fn gate(channel_ids: &[&str], oracle: Arc<ScriptedOracle>) -> Gate {
        Gate::new(config(channel_ids), oracle).unwrap()
    }

    fn press() -> CheckRequest {
        CheckRequest {
            callback_id: "cb-1".into(),
            message: Some((CHAT, MESSAGE)),
        }
    }

    use MembershipStatus::*;

    #[test]
    fn empty_channel_list_is_rejected() {
        let err = Gate::new(config(&[]), ScriptedOracle::new(&[]))
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoChannels));
    }

    #[tokio::test]
    async fn start_arms_conversation_and_sends_keyboard() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[]));
        let out = RecordingOutbound::default();
        assert_eq!(gate.state(USER), ConversationState::Unstarted);

        gate.handle_start(USER, CHAT, &out).await.unwrap();

        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert_eq!(out.actions(), vec![Action::Send {
            chat_id: CHAT,
            text: "welcome".into(),
            keyboard: Some(gate.keyboard().clone()),
        }]);
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let oracle = ScriptedOracle::new(&[]);
        let gate = gate(&["@chan1", "@chan2"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();

        gate.handle_start(USER, CHAT, &out).await.unwrap();
        gate.handle_start(USER, CHAT, &out).await.unwrap();

        let actions = out.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0], actions[1]);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn start_re_arms_a_verified_user() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]));
        let out = RecordingOutbound::default();
        gate.handle_start(USER, CHAT, &out).await.unwrap();
        gate.handle_check(USER, &press(), &out).await.unwrap();
        assert_eq!(gate.state(USER), ConversationState::Verified);

        gate.handle_start(USER, CHAT, &out).await.unwrap();
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
    }

    #[tokio::test]
    async fn left_user_sees_not_subscribed_notice() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Left))]));
        let out = RecordingOutbound::default();
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::NotSubscribed);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert_eq!(out.actions(), vec![Action::Notice {
            callback_id: "cb-1".into(),
            text: Some("not subscribed".into()),
            alert: true,
        }]);
    }

    #[tokio::test]
    async fn member_sees_app_info() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]));
        let out = RecordingOutbound::default();
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Revealed);
        assert_eq!(gate.state(USER), ConversationState::Verified);
        assert_eq!(out.actions(), vec![
            Action::Edit {
                chat_id: CHAT,
                message_id: MESSAGE,
                text: "<b>app info</b>".into(),
            },
            Action::Notice {
                callback_id: "cb-1".into(),
                text: None,
                alert: false,
            },
        ]);
    }

    #[tokio::test]
    async fn member_and_creator_of_two_channels_passes() {
        let oracle = ScriptedOracle::new(&[
            ("@chan1", Reply::Status(Member)),
            ("@chan2", Reply::Status(Creator)),
        ]);
        let gate = gate(&["@chan1", "@chan2"], Arc::clone(&oracle));
        gate.start(USER);

        assert_eq!(gate.verify(USER).await, Verdict::Subscribed);
        assert_eq!(oracle.calls(), vec!["@chan1", "@chan2"]);
    }

    #[tokio::test]
    async fn oracle_error_is_transient_and_skips_later_channels() {
        let oracle = ScriptedOracle::new(&[
            ("@chan1", Reply::Fail),
            ("@chan2", Reply::Status(Member)),
        ]);
        let gate = gate(&["@chan1", "@chan2"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert_eq!(oracle.calls(), vec!["@chan1"]);
        assert_eq!(out.notices(), vec![Some("try later".to_string())]);
        assert_eq!(out.edits(), 0);
    }

    #[tokio::test]
    async fn short_circuits_on_first_failing_channel() {
        let oracle = ScriptedOracle::new(&[
            ("@a", Reply::Status(Member)),
            ("@b", Reply::Status(Left)),
            ("@c", Reply::Status(Member)),
        ]);
        let gate = gate(&["@a", "@b", "@c"], Arc::clone(&oracle));
        gate.start(USER);

        assert_eq!(gate.verify(USER).await, Verdict::NotSubscribed {
            channel_id: "@b".into(),
            status: Left,
        });
        assert_eq!(oracle.calls(), vec!["@a", "@b"]);
    }

    #[tokio::test]
    async fn slow_oracle_takes_the_error_path() {
        let oracle = ScriptedOracle::new(&[("@chan1", Reply::Hang)]);
        let gate = gate(&["@chan1"], oracle).with_check_timeout(Duration::from_millis(20));
        let out = RecordingOutbound::default();
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(out.notices(), vec![Some("try later".to_string())]);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
    }

    #[tokio::test]
    async fn check_without_start_reveals_to_a_member() {
        let oracle = ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]);
        let gate = gate(&["@chan1"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Revealed);
        assert_eq!(gate.state(USER), ConversationState::Verified);
        assert_eq!(oracle.calls(), vec!["@chan1"]);
        assert_eq!(out.edits(), 1);
    }

    #[tokio::test]
    async fn check_without_start_rejects_a_non_member() {
        let oracle = ScriptedOracle::new(&[("@chan1", Reply::Status(Left))]);
        let gate = gate(&["@chan1"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::NotSubscribed);
        assert_eq!(gate.state(USER), ConversationState::Unstarted);
        assert_eq!(out.notices(), vec![Some("not subscribed".to_string())]);
    }

    #[tokio::test]
    async fn check_after_verification_runs_again() {
        let oracle = ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]);
        let gate = gate(&["@chan1"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();
        gate.start(USER);
        gate.handle_check(USER, &press(), &out).await.unwrap();

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Revealed);
        assert_eq!(gate.state(USER), ConversationState::Verified);
        assert_eq!(oracle.calls().len(), 2);
    }

    #[tokio::test]
    async fn check_without_editable_message_is_an_error() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]));
        let out = RecordingOutbound::default();
        gate.start(USER);
        let request = CheckRequest {
            callback_id: "cb-1".into(),
            message: None,
        };

        let outcome = gate.handle_check(USER, &request, &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert_eq!(out.notices(), vec![Some("try later".to_string())]);
    }

    #[tokio::test]
    async fn error_after_a_passing_channel_never_verifies() {
        let oracle = ScriptedOracle::new(&[
            ("@a", Reply::Status(Member)),
            ("@b", Reply::Fail),
            ("@c", Reply::Status(Member)),
        ]);
        let gate = gate(&["@a", "@b", "@c"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(oracle.calls(), vec!["@a", "@b"]);
        assert_eq!(out.notices(), vec![Some("try later".to_string())]);
        assert_eq!(out.edits(), 0);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
    }

    #[tokio::test]
    async fn failed_reveal_keeps_gate_armed() {
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]));
        let out = RecordingOutbound {
            fail_edits: true,
            ..Default::default()
        };
        gate.start(USER);

        let outcome = gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(outcome, CheckOutcome::Failed);
        assert_eq!(gate.state(USER), ConversationState::AwaitingVerification);
        assert_eq!(out.notices(), vec![Some("try later".to_string())]);
    }

    #[tokio::test]
    async fn not_subscribed_is_never_remembered() {
        let oracle = ScriptedOracle::new(&[("@chan1", Reply::Status(Left))]);
        let gate = gate(&["@chan1"], Arc::clone(&oracle));
        let out = RecordingOutbound::default();
        gate.start(USER);

        gate.handle_check(USER, &press(), &out).await.unwrap();
        gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(oracle.calls().len(), 2);
    }

    #[tokio::test]
    async fn users_are_independent() {
        let other = UserId(2002);
        let gate = gate(&["@chan1"], ScriptedOracle::new(&[("@chan1", Reply::Status(Member))]));
        let out = RecordingOutbound::default();
        gate.start(USER);

        gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(gate.state(USER), ConversationState::Verified);
        assert_eq!(gate.state(other), ConversationState::Unstarted);
        assert_eq!(gate.conversations().len(), 1);
    }

    #[rstest]
    #[case(&[Member, Administrator, Creator], true)]
    #[case(&[Member, Member, Member], true)]
    #[case(&[Member, Member, Restricted], false)]
    #[case(&[Kicked, Member, Member], false)]
    #[case(&[Creator, Left, Administrator], false)]
    #[tokio::test]
    async fn verified_iff_every_channel_passes(
        #[case] statuses: &[MembershipStatus],
        #[case] expected: bool,
    ) {
        let ids = ["@a", "@b", "@c"];
        let replies: Vec<(&str, Reply)> = ids
            .iter()
            .zip(statuses)
            .map(|(id, s)| (*id, Reply::Status(*s)))
            .collect();
        let gate = gate(&ids, ScriptedOracle::new(&replies));
        let out = RecordingOutbound::default();
        gate.start(USER);

        gate.handle_check(USER, &press(), &out).await.unwrap();

        assert_eq!(gate.state(USER) == ConversationState::Verified, expected);
        assert_eq!(out.edits() == 1, expected);
    }

    #[test]
    fn transition_requires_expected_state() {
        let store = ConversationStore::default();
        assert!(!store.transition(
            USER,
            ConversationState::AwaitingVerification,
            ConversationState::Verified
        ));
        assert!(store.is_empty());

        store.set(USER, ConversationState::AwaitingVerification);
        assert!(store.transition(
            USER,
            ConversationState::AwaitingVerification,
            ConversationState::Verified
        ));
        assert_eq!(store.get(USER), ConversationState::Verified);
    }
}
