//! Command Executor: bounded one-shot subprocess runs with captured output.
//!
//! Invariants:
//! - Every invocation is independent; nothing here touches the lifecycle manager's state.
//! - A non-zero exit is returned as `CommandResult { success: false, .. }`, never as an error.
//! - Only invocation-level failures (missing program, missing working directory,
//!   spawn failure, timeout, pipe I/O) become a `PanelError`.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, PanelError, PanelResult};
use crate::toolchain::CommandInvocation;
use crate::util::process::describe_exit;
use crate::util::{ExecError, ExecRequest, ExecService};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct CommandExecutor {
    exec: ExecService,
}

impl CommandExecutor {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            exec: ExecService::new(default_timeout),
        }
    }

    #[tracing::instrument(level = "info", skip_all, fields(command = %invocation.command_name))]
    pub fn execute(&self, invocation: &CommandInvocation) -> PanelResult<CommandResult> {
        tracing::info!(preview = %invocation.preview(), cwd = ?invocation.project_path, "running one-shot command");

        let mut request = ExecRequest::new(&invocation.program)
            .args(&invocation.arguments)
            .env("FORCE_COLOR", "0");
        if let Some(ref dir) = invocation.project_path {
            request = request.cwd(dir);
        }
        if let Some(ref input) = invocation.stdin {
            request = request.stdin(input.clone());
        }
        if let Some(t) = invocation.timeout {
            request = request.timeout(t);
        }

        let out = self
            .exec
            .run(request)
            .map_err(|e| classify(invocation, e))?;

        let success = out.status.success();
        if !success {
            tracing::info!(
                command = %invocation.command_name,
                status = %describe_exit(&out.status),
                "one-shot command failed"
            );
        }
        Ok(CommandResult {
            success,
            exit_code: out.status.code(),
            error_kind: (!success).then_some(ErrorKind::NonZeroExit),
            stdout: out.stdout,
            stderr: out.stderr,
            duration_ms: u64::try_from(out.duration.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

fn classify(invocation: &CommandInvocation, e: ExecError) -> PanelError {
    let msg = format!("{}: {}", invocation.command_name, e);
    tracing::warn!(error = %msg, "one-shot command could not complete");
    match e {
        ExecError::ProgramNotFound(_) => PanelError::not_installed(msg),
        ExecError::MissingWorkingDir(_) => PanelError::project_not_found(msg),
        ExecError::Spawn(_) => PanelError::spawn_failed(msg),
        ExecError::Timeout { .. } => PanelError::timeout(msg),
        ExecError::Io(_) => PanelError::io(msg),
    }
}
