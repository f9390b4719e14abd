use std::{
    ffi::OsString,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result, bail},
    subgate_config::{Error as ConfigError, GateConfig, load_and_validate},
    subgate_supervisor::{ProcessSpec, Supervisor, SupervisorConfig},
    tracing::{error, info, warn},
};

/// Flags forwarded to supervised children.
pub struct ChildFlags<'a> {
    pub config: &'a Path,
    pub log_level: &'a str,
    pub json_logs: bool,
}

impl ChildFlags<'_> {
    fn global_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--config".into(),
            self.config.as_os_str().to_owned(),
            "--log-level".into(),
            self.log_level.into(),
        ];
        if self.json_logs {
            args.push("--json-logs".into());
        }
        args
    }
}

/// Load and validate the document, logging every diagnostic. Fails when the
/// bot could not start with it.
fn load_startable(config_path: &Path) -> Result<GateConfig> {
    let (config, report) = match load_and_validate(config_path) {
        Ok(loaded) => loaded,
        Err(ConfigError::Invalid(result)) => {
            for d in &result.diagnostics {
                error!(path = %d.path, "{}", d.message);
            }
            bail!("refusing to start: {}", result.summary());
        },
        Err(e) => {
            return Err(e).with_context(|| format!("loading {}", config_path.display()));
        },
    };
    for d in &report.diagnostics {
        warn!(path = %d.path, "{}", d.message);
    }
    Ok(config)
}

/// Run the gate until a shutdown signal arrives.
pub async fn bot(config_path: &Path) -> Result<()> {
    let config = load_startable(config_path)?;
    let mut handle = subgate_telegram::start_polling(config).await?;

    let signalled = tokio::select! {
        () = shutdown_signal() => true,
        _ = &mut handle.task => false,
    };
    if !signalled {
        bail!("telegram polling stopped unexpectedly");
    }

    info!("shutdown signal received, stopping bot");
    handle.shutdown().await;
    Ok(())
}

/// Serve the config editor until a shutdown signal arrives.
pub async fn editor(config_path: PathBuf, bind: SocketAddr) -> Result<()> {
    subgate_web::serve(bind, config_path, shutdown_signal()).await
}

/// Supervise `subgate bot` and `subgate editor` child processes.
///
/// The document is validated up front so an unusable configuration fails
/// once instead of crash-looping the bot child.
pub async fn run(flags: &ChildFlags<'_>, bind: SocketAddr) -> Result<()> {
    load_startable(flags.config)?;

    let exe = std::env::current_exe().context("cannot locate the subgate executable")?;

    let report = Supervisor::new(SupervisorConfig::default())
        .with_process(bot_spec(&exe, flags))
        .with_process(editor_spec(&exe, flags, bind))
        .run(shutdown_signal())
        .await?;

    info!(restarts = ?report.restarts, "all processes stopped");
    Ok(())
}

fn bot_spec(exe: &Path, flags: &ChildFlags<'_>) -> ProcessSpec {
    ProcessSpec::new("bot", exe)
        .args(flags.global_args())
        .arg("bot")
}

fn editor_spec(exe: &Path, flags: &ChildFlags<'_>, bind: SocketAddr) -> ProcessSpec {
    ProcessSpec::new("editor", exe)
        .args(flags.global_args())
        .args(["editor", "--bind"])
        .arg(bind.to_string())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
