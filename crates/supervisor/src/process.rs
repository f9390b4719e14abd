//! Spawning and stopping a single child process.

use std::{ffi::OsString, path::PathBuf, process::Stdio, time::Duration};

use {
    anyhow::{Context, Result},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

/// What to run for one supervised child.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    /// Name used in logs.
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Vec<(String, String)>,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Start `spec` with piped output forwarded to tracing.
pub(crate) fn spawn(spec: &ProcessSpec) -> Result<Child> {
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(spec.env.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // Own process group, so a terminal Ctrl+C reaches only the supervisor,
    // which then relays SIGTERM.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {} ({})", spec.name, spec.program.display()))?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(spec.name.clone(), stdout, false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(spec.name.clone(), stderr, true));
    }

    info!(child = %spec.name, pid = child.id(), "process started");
    Ok(child)
}

/// Re-emit a child's output lines through our own subscriber.
///
/// Children running with `--json-logs` write one JSON object per line; those
/// keep their level. Anything else is logged at `info` (stdout) or `warn`
/// (stderr).
async fn forward_lines(name: String, stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.starts_with('{')
            && let Ok(log) = serde_json::from_str::<serde_json::Value>(&line)
        {
            let level = log.get("level").and_then(|v| v.as_str()).unwrap_or("INFO");
            let msg = log
                .pointer("/fields/message")
                .and_then(|v| v.as_str())
                .unwrap_or(&line);
            match level {
                "TRACE" | "DEBUG" => debug!(target: "subgate_child", child = %name, "{msg}"),
                "INFO" => info!(target: "subgate_child", child = %name, "{msg}"),
                "WARN" => warn!(target: "subgate_child", child = %name, "{msg}"),
                _ => error!(target: "subgate_child", child = %name, "{msg}"),
            }
            continue;
        }
        if is_stderr {
            warn!(target: "subgate_child", child = %name, "{line}");
        } else {
            info!(target: "subgate_child", child = %name, "{line}");
        }
    }
}

/// Ask the child to exit. On non-unix targets this kills it outright.
pub(crate) async fn terminate(name: &str, child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::{
            sys::signal::{Signal, kill},
            unistd::Pid,
        };

        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                warn!(child = %name, pid, error = %e, "failed to send SIGTERM");
            } else {
                debug!(child = %name, pid, "sent SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = child.kill().await {
            warn!(child = %name, error = %e, "failed to kill process");
        }
    }
}

/// Wait for an already signalled child, killing it once `grace` elapses.
pub(crate) async fn reap(name: &str, child: &mut Child, grace: Duration) {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => info!(child = %name, %status, "process stopped"),
        Ok(Err(e)) => warn!(child = %name, error = %e, "error waiting for process"),
        Err(_) => {
            warn!(child = %name, "process did not exit gracefully, killing");
            if let Err(e) = child.kill().await {
                warn!(child = %name, error = %e, "failed to kill process");
            }
        },
    }
}
