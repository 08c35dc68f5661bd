use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::buffer::OutputBuffer;
use crate::errors::{PanelError, PanelResult};
use crate::lock::NetworkLock;
use crate::toolchain::CommandInvocation;
use crate::util::process::{describe_exit, isolate_process_group, signal_group, GroupSignal};

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
}

impl ProcessState {
    pub fn is_live(&self) -> bool {
        matches!(self, ProcessState::Starting | ProcessState::Running)
    }
}

/// Snapshot of a managed process handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub project_path: PathBuf,
    pub pid: Option<u32>,
    pub started_at: Option<DateTime<Utc>>,
    pub state: ProcessState,
    pub exit_code: Option<i32>,
    pub recent_output: Vec<String>,
}

impl ProcessSummary {
    pub fn untracked(project_path: &Path) -> Self {
        Self {
            project_path: project_path.to_path_buf(),
            pid: None,
            started_at: None,
            state: ProcessState::Stopped,
            exit_code: None,
            recent_output: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: ProcessState,
    exited: bool,
    exit_code: Option<i32>,
    stop_requested: bool,
    output: OutputBuffer,
}

/// The long-running network child for one project path.
#[derive(Debug)]
pub struct ManagedProcess {
    project_path: PathBuf,
    pid: u32,
    started_at: DateTime<Utc>,
    inner: Mutex<Inner>,
    changed: Condvar,
    child: Mutex<Child>,
    lock: Mutex<Option<NetworkLock>>,
}

pub(crate) fn lock_or_recover<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ManagedProcess {
    /// Spawn `invocation` in its own process group and start the drain and watcher threads.
    pub(crate) fn spawn(
        invocation: &CommandInvocation,
        project_path: &Path,
        buffer_lines: usize,
        lock: Option<NetworkLock>,
    ) -> PanelResult<Arc<Self>> {
        let program = which::which(&invocation.program).map_err(|_| {
            PanelError::spawn_failed(format!(
                "cannot start network: program {:?} was not found in PATH",
                invocation.program
            ))
        })?;
        let mut cmd = Command::new(program);
        cmd.args(&invocation.arguments)
            .current_dir(project_path)
            .env("FORCE_COLOR", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| {
            PanelError::spawn_failed(format!(
                "cannot start network `{}`: {e}",
                invocation.preview()
            ))
        })?;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let proc = Arc::new(Self {
            project_path: project_path.to_path_buf(),
            pid: child.id(),
            started_at: Utc::now(),
            inner: Mutex::new(Inner {
                state: ProcessState::Starting,
                exited: false,
                exit_code: None,
                stop_requested: false,
                output: OutputBuffer::new(buffer_lines),
            }),
            changed: Condvar::new(),
            child: Mutex::new(child),
            lock: Mutex::new(lock),
        });
        tracing::info!(
            pid = proc.pid,
            project = %project_path.display(),
            command = %invocation.preview(),
            "network process spawned"
        );

        if let Some(out) = stdout {
            proc.attach_drain(out, true);
        }
        if let Some(err) = stderr {
            proc.attach_drain(err, false);
        }
        proc.attach_watcher();
        Ok(proc)
    }

    /// Only lines from a `signals_ready` pipe count as the readiness line.
    fn attach_drain<R: Read + Send + 'static>(self: &Arc<Self>, pipe: R, signals_ready: bool) {
        let me = Arc::clone(self);
        std::thread::spawn(move || {
            let mut reader = BufReader::new(pipe);
            let mut raw = Vec::new();
            loop {
                raw.clear();
                match reader.read_until(b'\n', &mut raw) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&raw);
                        me.push_line(line.trim_end_matches(['\n', '\r']), signals_ready);
                    }
                    Err(_) => break,
                }
            }
        });
    }

    fn attach_watcher(self: &Arc<Self>) {
        let me = Arc::clone(self);
        std::thread::spawn(move || loop {
            let polled = lock_or_recover(&me.child).try_wait();
            match polled {
                Ok(Some(status)) => {
                    me.on_exit(status);
                    break;
                }
                Ok(None) => std::thread::sleep(WATCH_INTERVAL),
                Err(e) => {
                    tracing::warn!(pid = me.pid, error = %e, "failed to poll network process");
                    std::thread::sleep(WATCH_INTERVAL);
                }
            }
        });
    }

    fn push_line(&self, line: &str, signals_ready: bool) {
        let mut inner = lock_or_recover(&self.inner);
        inner.output.push(line);
        if signals_ready && inner.state == ProcessState::Starting {
            inner.state = ProcessState::Running;
            tracing::info!(pid = self.pid, "network process ready (first stdout line)");
            self.changed.notify_all();
        }
    }

    fn on_exit(&self, status: ExitStatus) {
        // Reap anything the launcher left behind in the group.
        let _ = signal_group(self.pid, GroupSignal::Kill);
        {
            let mut inner = lock_or_recover(&self.inner);
            inner.exited = true;
            inner.exit_code = status.code();
            inner.output.push(format!(
                "[hardhat-panel] network process exited ({})",
                describe_exit(&status)
            ));
            inner.state = if inner.stop_requested || status.success() {
                ProcessState::Stopped
            } else {
                ProcessState::Crashed
            };
            if inner.state == ProcessState::Crashed {
                tracing::warn!(pid = self.pid, status = %describe_exit(&status), "network process crashed");
            } else {
                tracing::info!(pid = self.pid, status = %describe_exit(&status), "network process exited");
            }
            self.changed.notify_all();
        }
        lock_or_recover(&self.lock).take();
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        lock_or_recover(&self.inner).state
    }

    pub fn has_exited(&self) -> bool {
        lock_or_recover(&self.inner).exited
    }

    pub fn summary(&self, lines: usize) -> ProcessSummary {
        let inner = lock_or_recover(&self.inner);
        ProcessSummary {
            project_path: self.project_path.clone(),
            pid: Some(self.pid),
            started_at: Some(self.started_at),
            state: inner.state,
            exit_code: inner.exit_code,
            recent_output: inner.output.tail(lines),
        }
    }

    pub(crate) fn mark_running_if_starting(&self, reason: &str) {
        let mut inner = lock_or_recover(&self.inner);
        if inner.state == ProcessState::Starting {
            inner.state = ProcessState::Running;
            tracing::info!(pid = self.pid, reason, "network process ready");
            self.changed.notify_all();
        }
    }

    /// Block until the state changes or `timeout` elapses.
    pub(crate) fn wait_change(&self, from: ProcessState, timeout: Duration) {
        let inner = lock_or_recover(&self.inner);
        let _ = self
            .changed
            .wait_timeout_while(inner, timeout, |i| i.state == from)
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub(crate) fn begin_stop(&self) {
        let mut inner = lock_or_recover(&self.inner);
        inner.stop_requested = true;
        if !inner.exited {
            inner.state = ProcessState::Stopping;
        }
        self.changed.notify_all();
    }

    /// Wait up to `timeout` for the watcher to observe exit.
    pub(crate) fn wait_exit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = lock_or_recover(&self.inner);
        while !inner.exited {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            inner = self
                .changed
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub(crate) fn signal(&self, sig: GroupSignal) {
        if !signal_group(self.pid, sig) {
            // No process groups here (or the group is gone): fall back to the direct child.
            let _ = lock_or_recover(&self.child).kill();
        }
    }

    /// Force the record into `Stopped` after a requested stop.
    pub(crate) fn mark_stopped(&self) {
        let mut inner = lock_or_recover(&self.inner);
        inner.state = ProcessState::Stopped;
        self.changed.notify_all();
    }
}
