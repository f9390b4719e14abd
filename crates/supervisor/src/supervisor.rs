use std::{
    collections::BTreeMap,
    future::Future,
    time::{Duration, Instant},
};

use {
    anyhow::Result,
    tokio::{process::Child, time::MissedTickBehavior},
    tracing::{error, info, warn},
};

use crate::process::{self, ProcessSpec};

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often children are checked for liveness.
    pub poll_interval: Duration,
    /// Delay between an unexpected exit and the restart.
    pub restart_delay: Duration,
    /// A child that ran at least this long before exiting resets its
    /// failure count.
    pub stable_uptime: Duration,
    /// Consecutive rapid failures after which each further failure is logged
    /// at `error`.
    pub max_consecutive_failures: u32,
    /// Time a child gets to exit after SIGTERM before it is killed.
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            restart_delay: Duration::from_secs(2),
            stable_uptime: Duration::from_secs(30),
            max_consecutive_failures: 5,
            grace_period: Duration::from_secs(5),
        }
    }
}

/// Restart counts per child, returned when supervision ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    pub restarts: BTreeMap<String, u32>,
}

struct Managed {
    spec: ProcessSpec,
    child: Option<Child>,
    started_at: Instant,
    restart_at: Option<Instant>,
    failures: u32,
    restarts: u32,
}

impl Managed {
    /// Record an exit or a failed spawn and schedule the restart.
    fn schedule_restart(&mut self, config: &SupervisorConfig, now: Instant) {
        if now.duration_since(self.started_at) >= config.stable_uptime {
            self.failures = 1;
        } else {
            self.failures += 1;
        }
        if self.failures >= config.max_consecutive_failures {
            error!(
                child = %self.spec.name,
                failures = self.failures,
                "process keeps failing, still restarting"
            );
        }
        self.restart_at = Some(now + config.restart_delay);
    }

    fn start(&mut self, config: &SupervisorConfig, now: Instant) {
        self.started_at = now;
        self.restart_at = None;
        match process::spawn(&self.spec) {
            Ok(child) => self.child = Some(child),
            Err(e) => {
                warn!(child = %self.spec.name, error = %e, "restart failed");
                self.schedule_restart(config, now);
            },
        }
    }

    fn poll(&mut self, config: &SupervisorConfig) {
        let now = Instant::now();
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return,
                Ok(Some(status)) => {
                    warn!(child = %self.spec.name, %status, "process exited unexpectedly");
                },
                Err(e) => {
                    warn!(child = %self.spec.name, error = %e, "failed to query process status");
                },
            }
            self.child = None;
            self.schedule_restart(config, now);
            return;
        }

        if self.restart_at.is_some_and(|at| now >= at) {
            info!(child = %self.spec.name, "restarting process");
            self.restarts += 1;
            self.start(config, now);
        }
    }
}

/// Watches a fixed set of named processes.
pub struct Supervisor {
    config: SupervisorConfig,
    specs: Vec<ProcessSpec>,
}

impl Supervisor {
    #[must_use]
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            specs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_process(mut self, spec: ProcessSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Start every child and keep them running until `shutdown` resolves.
    ///
    /// Fails without supervising anything if a child cannot be started the
    /// first time; children already started are stopped first.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<SupervisorReport> {
        let config = self.config;
        let now = Instant::now();
        let mut managed: Vec<Managed> = Vec::with_capacity(self.specs.len());
        for spec in self.specs {
            match process::spawn(&spec) {
                Ok(child) => managed.push(Managed {
                    spec,
                    child: Some(child),
                    started_at: now,
                    restart_at: None,
                    failures: 0,
                    restarts: 0,
                }),
                Err(e) => {
                    stop_all(&mut managed, config.grace_period).await;
                    return Err(e);
                },
            }
        }
        info!(children = managed.len(), "supervisor started");

        let mut ticker = tokio::time::interval(config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    for m in &mut managed {
                        m.poll(&config);
                    }
                },
            }
        }

        info!("shutdown requested, stopping children");
        stop_all(&mut managed, config.grace_period).await;

        Ok(SupervisorReport {
            restarts: managed
                .into_iter()
                .map(|m| (m.spec.name, m.restarts))
                .collect(),
        })
    }
}

/// Signal every running child, then reap them against one shared deadline.
async fn stop_all(managed: &mut [Managed], grace: Duration) {
    for m in managed.iter_mut() {
        if let Some(child) = m.child.as_mut() {
            process::terminate(&m.spec.name, child).await;
        }
    }
    let deadline = Instant::now() + grace;
    for m in managed.iter_mut() {
        if let Some(mut child) = m.child.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            process::reap(&m.spec.name, &mut child, remaining).await;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(all(test, unix))]
mod tests {
    use rstest::rstest;

    use super::*;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            poll_interval: Duration::from_millis(20),
            restart_delay: Duration::from_millis(20),
            stable_uptime: Duration::from_secs(30),
            max_consecutive_failures: 3,
            grace_period: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn restarts_a_child_that_exits() {
        let supervisor = Supervisor::new(fast_config())
            .with_process(ProcessSpec::new("crasher", "sh").args(["-c", "exit 1"]));
        let report = supervisor
            .run(tokio::time::sleep(Duration::from_millis(600)))
            .await
            .unwrap();
        assert!(report.restarts["crasher"] >= 2, "{report:?}");
    }

    #[tokio::test]
    async fn does_not_restart_after_shutdown() {
        let supervisor = Supervisor::new(fast_config())
            .with_process(ProcessSpec::new("bot", "sleep").arg("30"))
            .with_process(ProcessSpec::new("editor", "sleep").arg("30"));
        let started = Instant::now();
        let report = supervisor
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.restarts["bot"], 0);
        assert_eq!(report.restarts["editor"], 0);
    }

    #[tokio::test]
    async fn kills_children_that_outlive_the_grace_period() {
        let config = SupervisorConfig {
            grace_period: Duration::from_millis(300),
            ..fast_config()
        };
        let supervisor = Supervisor::new(config).with_process(
            ProcessSpec::new("stubborn", "sh")
                .args(["-c", "trap '' TERM; while true; do sleep 1; done"]),
        );
        let started = Instant::now();
        let report = supervisor
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(report.restarts["stubborn"], 0);
    }

    #[tokio::test]
    async fn fails_when_a_child_cannot_start() {
        let supervisor = Supervisor::new(fast_config())
            .with_process(ProcessSpec::new("ok", "sleep").arg("30"))
            .with_process(ProcessSpec::new("missing", "/nonexistent/subgate-child"));
        let err = supervisor
            .run(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[rstest]
    #[case::rapid(Duration::from_secs(1), 3)]
    #[case::after_stable_run(Duration::from_secs(60), 1)]
    fn failure_count_resets_after_stable_uptime(
        #[case] uptime: Duration,
        #[case] expected: u32,
    ) {
        let config = fast_config();
        let now = Instant::now();
        let mut m = Managed {
            spec: ProcessSpec::new("x", "true"),
            child: None,
            started_at: now.checked_sub(uptime).unwrap_or(now),
            restart_at: None,
            failures: 2,
            restarts: 0,
        };
        m.schedule_restart(&config, now);
        assert_eq!(m.failures, expected);
        assert_eq!(m.restart_at, Some(now + config.restart_delay));
    }
}
