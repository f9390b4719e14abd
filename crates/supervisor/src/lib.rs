//! Keeps a set of named child processes alive.
//!
//! Children that exit on their own are restarted; when the shutdown future
//! resolves every child gets SIGTERM and a bounded grace period before it is
//! killed.

pub mod process;
pub mod supervisor;

pub use {
    process::ProcessSpec,
    supervisor::{Supervisor, SupervisorConfig, SupervisorReport},
};
