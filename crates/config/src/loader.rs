use std::path::Path;

use {
    secrecy::Secret,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Context, Error, Result},
    schema::{ChannelConfig, GateConfig, LEGACY_CHANNEL_NAME},
    validate::{ValidationResult, validate},
};

/// Config file used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Load and parse the JSON document at `path`.
pub fn load_config(path: &Path) -> Result<GateConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the document for editing.
///
/// A missing or malformed file yields the default document so the editor can
/// still be used to create one.
pub fn load_config_or_default(path: &Path) -> GateConfig {
    match load_config(path) {
        Ok(cfg) => cfg,
        Err(Error::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file found, using defaults");
            GateConfig::default()
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            GateConfig::default()
        },
    }
}

/// Write `config` to `path` as pretty-printed JSON.
///
/// The document is written to a sibling temp file and renamed into place so
/// a concurrently starting bot never reads a half-written file.
pub fn save_config(path: &Path, config: &GateConfig) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Apply `BOT_TOKEN` and the legacy `CHANNEL_ID`/`CHANNEL_URL` pair from the
/// process environment.
pub fn apply_env_overrides(config: &mut GateConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

/// Override implementation behind [`apply_env_overrides`], with an injectable
/// lookup so it can be tested without touching the process environment.
///
/// `CHANNEL_ID` and `CHANNEL_URL` take effect only together, and then replace
/// the whole configured channel list.
pub fn apply_env_overrides_with(
    config: &mut GateConfig,
    lookup: impl Fn(&str) -> Option<String>,
) {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = non_empty("BOT_TOKEN") {
        debug!("bot token taken from BOT_TOKEN");
        config.bot_token = Secret::new(token);
    }

    if let (Some(id), Some(url)) = (non_empty("CHANNEL_ID"), non_empty("CHANNEL_URL")) {
        if config.channels.is_empty() {
            info!(channel_id = %id, "using single channel from CHANNEL_ID/CHANNEL_URL");
        } else {
            warn!(
                channel_id = %id,
                replaced = config.channels.len(),
                "CHANNEL_ID/CHANNEL_URL override the configured channel list"
            );
        }
        config.channels = vec![ChannelConfig {
            id,
            url,
            name: LEGACY_CHANNEL_NAME.into(),
        }];
    }
}

/// Load `path`, apply environment overrides, and validate.
///
/// Fails when the document cannot be read or has error diagnostics; the
/// returned [`ValidationResult`] carries any remaining warnings.
pub fn load_and_validate(path: &Path) -> Result<(GateConfig, ValidationResult)> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config);
    let result = validate(&config);
    if result.has_errors() {
        return Err(Error::Invalid(result));
    }
    Ok((config, result))
}
