//! Error plumbing shared by the subgate crates: each crate defines its own
//! `Error`, implements [`FromMessage`] for it, and calls [`impl_context!`].

pub mod error;

pub use error::FromMessage;
