//! Configuration document for the subscription gate: schema, loading with
//! environment overrides, and startup validation.
//!
//! The document is a JSON file (`config.json` by default) shared by the bot
//! and the config editor.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        DEFAULT_CONFIG_FILE, apply_env_overrides, apply_env_overrides_with, load_and_validate,
        load_config, load_config_or_default, save_config,
    },
    schema::{ButtonsConfig, ChannelConfig, GateConfig, MessagesConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
