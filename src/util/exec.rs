use std::ffi::OsString;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Context;
use wait_timeout::ChildExt;

use super::process::{isolate_process_group, signal_group, GroupSignal};

/// How long to wait for pipe readers after the child has exited or was killed.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Structured command execution with timeouts and concurrent output capture.
#[derive(Debug, Clone)]
pub struct ExecService {
    default_timeout: Duration,
}

/// Invocation-level failure; a non-zero exit is not one of these.
#[derive(Debug)]
pub enum ExecError {
    ProgramNotFound(OsString),
    MissingWorkingDir(PathBuf),
    Spawn(io::Error),
    Timeout { program: OsString, after: Duration },
    Io(anyhow::Error),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::ProgramNotFound(p) => write!(f, "program {:?} was not found in PATH", p),
            ExecError::MissingWorkingDir(d) => {
                write!(f, "working directory {} does not exist", d.display())
            }
            ExecError::Spawn(e) => write!(f, "failed to spawn process: {e}"),
            ExecError::Timeout { program, after } => write!(
                f,
                "command {:?} timed out after {}",
                program,
                humantime::format_duration(*after)
            ),
            ExecError::Io(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for ExecError {}

impl ExecService {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn run(&self, request: ExecRequest) -> Result<ExecOutput, ExecError> {
        let program = which::which(&request.program)
            .map_err(|_| ExecError::ProgramNotFound(request.program.clone()))?;

        let mut cmd = Command::new(&program);
        cmd.args(&request.args);
        if let Some(ref cwd) = request.cwd {
            if !cwd.is_dir() {
                return Err(ExecError::MissingWorkingDir(cwd.clone()));
            }
            cmd.current_dir(cwd);
        }
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        cmd.stdin(if request.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        isolate_process_group(&mut cmd);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(ExecError::Spawn)?;
        tracing::debug!(pid = child.id(), program = ?request.program, "spawned one-shot command");

        if let Some(input) = request.stdin {
            feed_stdin(&mut child, input);
        }
        let stdout = OutputDrain::spawn(child.stdout.take());
        let stderr = OutputDrain::spawn(child.stderr.take());

        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let status = if timeout.is_zero() {
            child
                .wait()
                .context("failed to wait for process")
                .map_err(ExecError::Io)?
        } else {
            match child
                .wait_timeout(timeout)
                .context("failed to wait with timeout")
                .map_err(ExecError::Io)?
            {
                Some(status) => status,
                None => {
                    kill_tree(&mut child);
                    let _ = stdout.finish();
                    let _ = stderr.finish();
                    tracing::warn!(program = ?request.program, ?timeout, "one-shot command timed out; killed");
                    return Err(ExecError::Timeout {
                        program: request.program,
                        after: timeout,
                    });
                }
            }
        };

        // The direct child is gone; reap anything it left behind in its group.
        let _ = signal_group(child.id(), GroupSignal::Kill);

        Ok(ExecOutput {
            status,
            duration: started.elapsed(),
            stdout: stdout.finish(),
            stderr: stderr.finish(),
        })
    }
}

impl Default for ExecService {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn kill_tree(child: &mut Child) {
    if !signal_group(child.id(), GroupSignal::Kill) {
        let _ = child.kill();
    }
    let _ = child.wait();
}

fn feed_stdin(child: &mut Child, input: String) {
    if let Some(mut pipe) = child.stdin.take() {
        // Writer thread: a child that never reads must not block the caller.
        std::thread::spawn(move || {
            let _ = pipe.write_all(input.as_bytes());
            let _ = pipe.flush();
        });
    }
}

/// Background reader that accumulates one pipe into a shared buffer.
struct OutputDrain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl OutputDrain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        if let Some(mut reader) = pipe {
            let buf_cl = buf.clone();
            std::thread::spawn(move || {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut w) = buf_cl.lock() {
                                w.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
                let _ = tx.send(());
            });
        } else {
            let _ = tx.send(());
        }
        Self { buf, done }
    }

    /// Wait briefly for EOF, then return whatever was captured.
    fn finish(self) -> String {
        let _ = self.done.recv_timeout(DRAIN_GRACE);
        let bytes = self
            .buf
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[derive(Debug, Default)]
pub struct ExecRequest {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    timeout: Option<Duration>,
    stdin: Option<String>,
}

impl ExecRequest {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }
}

#[derive(Debug)]
pub struct ExecOutput {
    pub status: std::process::ExitStatus,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}
