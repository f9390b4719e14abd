//! Subscription gate for Telegram.
//!
//! A user who sends `/start` gets a keyboard with a join button per
//! configured channel plus a "check subscription" button. Pressing it queries
//! `getChatMember` for every channel in order; once the user is a member of
//! all of them the keyboard message is replaced with the protected content.

pub mod bot;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod keyboard;
pub mod membership;
pub mod outbound;
pub mod state;

pub use {
    bot::{PollingHandle, start_polling},
    error::{Error, Result},
    gate::{CheckOutcome, ConversationState, Gate, Verdict},
    membership::{MembershipOracle, MembershipStatus, TelegramMembershipOracle},
    outbound::{GateOutbound, TelegramOutbound},
};
