/*!
Process Lifecycle Manager: at most one local network process per project path.

State machine per path: Stopped -> Starting -> Running -> Stopping -> Stopped,
plus Crashed when the process dies without a stop request.

- start/stop for one path are serialized by a per-path guard; different paths and
  one-shot commands never contend on it.
- status is a pure read of recorded state; it does not re-verify liveness.
- A crash is never retried; the next start replaces the dead record.
*/
mod buffer;
mod process;

pub use buffer::OutputBuffer;
pub use process::{ManagedProcess, ProcessState, ProcessSummary};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use url::Url;

use crate::config::{ProbeMode, Settings};
use crate::errors::{PanelError, PanelResult};
use crate::lock::{acquire_network_lock, LockError};
use crate::probe::probe_network;
use crate::toolchain::Toolchain;
use crate::util::process::GroupSignal;
use crate::util::tail_lines;
pub(crate) use process::lock_or_recover;

/// Lines of output included in summaries returned by start/stop.
pub const SUMMARY_TAIL_LINES: usize = 20;

const READINESS_POLL: Duration = Duration::from_millis(100);
const READINESS_PROBE_TIMEOUT: Duration = Duration::from_millis(200);
const KILL_WAIT: Duration = Duration::from_secs(5);
/// A process that exits this soon after readiness never really started.
const STARTUP_SETTLE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub endpoint: Url,
    pub probe_mode: ProbeMode,
    pub grace: Duration,
    pub stop_timeout: Duration,
    pub buffer_lines: usize,
    /// Hold a cross-process lock per project while its network runs.
    pub use_network_lock: bool,
}

impl LifecycleConfig {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: settings.network.endpoint()?,
            probe_mode: settings.network.probe_mode,
            grace: settings.timeouts.network_grace,
            stop_timeout: settings.timeouts.stop,
            buffer_lines: settings.network.output_buffer_lines,
            use_network_lock: true,
        })
    }
}

#[derive(Debug)]
pub struct LifecycleManager {
    config: LifecycleConfig,
    toolchain: Toolchain,
    processes: Mutex<HashMap<PathBuf, Arc<ManagedProcess>>>,
    guards: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl LifecycleManager {
    pub fn new(config: LifecycleConfig, toolchain: Toolchain) -> Self {
        Self {
            config,
            toolchain,
            processes: Mutex::new(HashMap::new()),
            guards: Mutex::new(HashMap::new()),
        }
    }

    fn path_guard(&self, path: &Path) -> Arc<Mutex<()>> {
        lock_or_recover(&self.guards)
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the guard for `path` unless another caller holds or awaits it.
    fn prune_guard(&self, path: &Path, guard: &Arc<Mutex<()>>) {
        let mut guards = lock_or_recover(&self.guards);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(guard) == 2 && self.get(path).is_none() {
            guards.remove(path);
        }
    }

    fn get(&self, path: &Path) -> Option<Arc<ManagedProcess>> {
        lock_or_recover(&self.processes).get(path).cloned()
    }

    fn forget(&self, path: &Path) {
        lock_or_recover(&self.processes).remove(path);
    }

    /// Start the network for `path`, or return the live record unchanged.
    #[tracing::instrument(level = "info", skip(self), fields(project = %path.display()))]
    pub fn start(&self, path: &Path) -> PanelResult<ProcessSummary> {
        let guard = self.path_guard(path);
        let _serialized = lock_or_recover(&guard);

        if let Some(existing) = self.get(path) {
            if existing.state().is_live() {
                tracing::debug!(pid = existing.pid(), "network already tracked; not spawning");
                return Ok(existing.summary(SUMMARY_TAIL_LINES));
            }
            // Dead record (crashed or exited): replaced by this start.
            self.forget(path);
        }

        if !path.is_dir() {
            return Err(PanelError::project_not_found(format!(
                "project directory {} does not exist",
                path.display()
            )));
        }
        if probe_network(&self.config.endpoint, ProbeMode::Tcp, READINESS_PROBE_TIMEOUT).reachable {
            return Err(PanelError::already_running(format!(
                "{} is already answering; a network not managed by this panel is running",
                self.config.endpoint
            )));
        }
        let lock = if self.config.use_network_lock {
            match acquire_network_lock(path) {
                Ok(l) => Some(l),
                Err(LockError::Held(p)) => {
                    return Err(PanelError::already_running(format!(
                        "another panel instance runs the network for {} (lock {})",
                        path.display(),
                        p.display()
                    )))
                }
                Err(LockError::Io(e)) => {
                    return Err(PanelError::io(format!("cannot create network lock: {e}")))
                }
            }
        } else {
            None
        };

        let invocation = self.toolchain.node(path);
        let proc = ManagedProcess::spawn(&invocation, path, self.config.buffer_lines, lock)?;
        lock_or_recover(&self.processes).insert(path.to_path_buf(), Arc::clone(&proc));

        self.wait_ready(&proc);

        if proc.wait_exit(STARTUP_SETTLE) {
            self.forget(path);
            let summary = proc.summary(SUMMARY_TAIL_LINES);
            let tail = tail_lines(&summary.recent_output.join("\n"), 5);
            return Err(PanelError::spawn_failed(format!(
                "network process exited during startup: {tail}"
            )));
        }
        Ok(proc.summary(SUMMARY_TAIL_LINES))
    }

    /// Readiness: first stdout line, a reachable endpoint, or the grace period.
    fn wait_ready(&self, proc: &ManagedProcess) {
        let deadline = Instant::now() + self.config.grace;
        loop {
            if proc.state() != ProcessState::Starting {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                proc.mark_running_if_starting("grace period elapsed");
                return;
            }
            if probe_network(&self.config.endpoint, self.config.probe_mode, READINESS_PROBE_TIMEOUT)
                .reachable
            {
                proc.mark_running_if_starting("endpoint reachable");
                return;
            }
            proc.wait_change(ProcessState::Starting, READINESS_POLL.min(deadline - now));
        }
    }

    /// Stop the network for `path`; untracked paths are a no-op returning `Stopped`.
    #[tracing::instrument(level = "info", skip(self), fields(project = %path.display()))]
    pub fn stop(&self, path: &Path) -> PanelResult<ProcessSummary> {
        let guard = self.path_guard(path);
        let summary = {
            let _serialized = lock_or_recover(&guard);
            self.stop_locked(path)
        };
        self.prune_guard(path, &guard);
        Ok(summary)
    }

    fn stop_locked(&self, path: &Path) -> ProcessSummary {
        let Some(proc) = self.get(path) else {
            return ProcessSummary::untracked(path);
        };
        if !proc.has_exited() {
            proc.begin_stop();
            proc.signal(GroupSignal::Terminate);
            if !proc.wait_exit(self.config.stop_timeout) {
                tracing::warn!(
                    pid = proc.pid(),
                    timeout = ?self.config.stop_timeout,
                    "network did not exit after SIGTERM; escalating to SIGKILL"
                );
                proc.signal(GroupSignal::Kill);
                if !proc.wait_exit(KILL_WAIT) {
                    tracing::error!(pid = proc.pid(), "network process survived SIGKILL");
                }
            }
        }
        proc.mark_stopped();
        self.forget(path);
        proc.summary(SUMMARY_TAIL_LINES)
    }

    /// Recorded state only; untracked paths are `Stopped`.
    pub fn status(&self, path: &Path) -> ProcessState {
        self.get(path)
            .map(|p| p.state())
            .unwrap_or(ProcessState::Stopped)
    }

    pub fn summary(&self, path: &Path, lines: usize) -> ProcessSummary {
        match self.get(path) {
            Some(p) => p.summary(lines),
            None => ProcessSummary::untracked(path),
        }
    }

    pub fn tracked(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = lock_or_recover(&self.processes).keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Stop every tracked network (process shutdown).
    pub fn shutdown(&self) {
        for path in self.tracked() {
            if let Err(e) = self.stop(&path) {
                tracing::warn!(project = %path.display(), error = %e, "failed to stop network on shutdown");
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ToolchainSettings;
    use std::net::TcpListener;

    fn manager(script: &str, endpoint: &str) -> LifecycleManager {
        let toolchain = Toolchain::new(ToolchainSettings {
            program: "/bin/sh".to_string(),
            base_args: vec!["-c".to_string(), script.to_string()],
            node_args: Vec::new(),
            ..ToolchainSettings::default()
        });
        LifecycleManager::new(
            LifecycleConfig {
                endpoint: Url::parse(endpoint).unwrap(),
                probe_mode: ProbeMode::Tcp,
                grace: Duration::from_secs(2),
                stop_timeout: Duration::from_secs(2),
                buffer_lines: 50,
                use_network_lock: false,
            },
            toolchain,
        )
    }

    fn unused_endpoint() -> String {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = l.local_addr().unwrap().port();
        format!("http://127.0.0.1:{port}")
    }

    #[test]
    fn stop_untracked_is_noop() {
        let m = manager("true", &unused_endpoint());
        let s = m.stop(Path::new("/nonexistent/panel-proj")).unwrap();
        assert_eq!(s.state, ProcessState::Stopped);
        assert!(s.pid.is_none());
    }

    #[test]
    fn start_is_idempotent_and_stop_discards_record() {
        let td = tempfile::tempdir().unwrap();
        let m = manager("echo listening; exec sleep 30", &unused_endpoint());
        let first = m.start(td.path()).unwrap();
        assert_eq!(first.state, ProcessState::Running);
        let second = m.start(td.path()).unwrap();
        assert_eq!(second.state, first.state);
        assert_eq!(second.pid, first.pid);
        assert_eq!(m.tracked().len(), 1);

        let stopped = m.stop(td.path()).unwrap();
        assert_eq!(stopped.state, ProcessState::Stopped);
        assert_eq!(m.status(td.path()), ProcessState::Stopped);
        assert!(m.tracked().is_empty());
    }

    #[test]
    fn silent_process_becomes_running_after_grace() {
        let td = tempfile::tempdir().unwrap();
        let m = manager("exec sleep 30", &unused_endpoint());
        let started = Instant::now();
        let s = m.start(td.path()).unwrap();
        assert_eq!(s.state, ProcessState::Running);
        assert!(started.elapsed() >= Duration::from_secs(2));
        m.shutdown();
        assert!(m.tracked().is_empty());
    }

    #[test]
    fn early_exit_is_spawn_failure_and_leaves_stopped() {
        let td = tempfile::tempdir().unwrap();
        let m = manager("echo 'Error: listen EADDRINUSE' >&2; exit 1", &unused_endpoint());
        for _ in 0..5 {
            let err = m.start(td.path()).unwrap_err();
            assert_eq!(err.kind, crate::errors::ErrorKind::SpawnFailed);
            assert_eq!(m.status(td.path()), ProcessState::Stopped);
            assert!(m.tracked().is_empty());
        }
    }

    #[test]
    fn exit_right_after_ready_line_is_spawn_failure() {
        let td = tempfile::tempdir().unwrap();
        let m = manager("echo 'Compiling...'; exit 1", &unused_endpoint());
        let err = m.start(td.path()).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::SpawnFailed);
        assert_eq!(m.status(td.path()), ProcessState::Stopped);
    }

    #[test]
    fn stop_releases_path_guard() {
        let td = tempfile::tempdir().unwrap();
        let m = manager("echo listening; exec sleep 30", &unused_endpoint());
        m.start(td.path()).unwrap();
        assert_eq!(lock_or_recover(&m.guards).len(), 1);
        m.stop(td.path()).unwrap();
        m.stop(Path::new("/nonexistent/panel-proj")).unwrap();
        assert!(lock_or_recover(&m.guards).is_empty());
    }

    #[test]
    fn occupied_endpoint_is_already_running() {
        let td = tempfile::tempdir().unwrap();
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://127.0.0.1:{}", l.local_addr().unwrap().port());
        let m = manager("exec sleep 30", &endpoint);
        let err = m.start(td.path()).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::AlreadyRunning);
        assert!(m.tracked().is_empty());
    }
}
