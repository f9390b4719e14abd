use std::path::Path;

use {
    anyhow::Result,
    subgate_config::{Error as ConfigError, Severity, ValidationResult, load_and_validate},
};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Validate the document at `path` with env overrides applied and print the
/// diagnostics. Returns whether the bot would start with it.
pub fn check(path: &Path) -> Result<bool> {
    eprintln!("Checking {}\n", path.display());

    let (channels, result) = match load_and_validate(path) {
        Ok((config, result)) => (Some(config.channels.len()), result),
        Err(ConfigError::Invalid(result)) => (None, result),
        Err(e) => return Err(e.into()),
    };

    eprint!("{}", render_report(&result));
    if let Some(channels) = channels {
        eprintln!("Ready to gate {channels} channel(s).");
    }
    Ok(!result.has_errors())
}

fn render_report(result: &ValidationResult) -> String {
    let mut out = String::new();
    for d in &result.diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        out.push_str(&format!(
            "  {BOLD}{color}{label}{RESET} {}: {}\n",
            d.path, d.message
        ));
    }

    if !result.diagnostics.is_empty() {
        out.push('\n');
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);
    if errors == 0 && warnings == 0 {
        out.push_str("No issues found.\n");
    } else {
        out.push_str(&format!("{errors} error(s), {warnings} warning(s)\n"));
    }
    out
}
