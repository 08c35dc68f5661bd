//! Error taxonomy shared by every component.
//!
//! Error mapping guide:
//! - Probes never produce a `PanelError`; absence of a toolchain or network is a status value.
//! - A one-shot command that exits non-zero is data (`CommandResult`), tagged `NonZeroExit`.
//! - Map `NotInstalled` to exit code 127 in the binary; all other kinds to 1.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotInstalled,
    ProjectNotFound,
    AlreadyRunning,
    SpawnFailed,
    Timeout,
    NonZeroExit,
    IoFailure,
    InvalidRequest,
    /// A dispatched component panicked; the bridge converted it to an envelope.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotInstalled => "not_installed",
            ErrorKind::ProjectNotFound => "project_not_found",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::SpawnFailed => "spawn_failed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invocation-level failure carrying its taxonomy kind and a user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PanelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_installed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotInstalled, message)
    }

    pub fn project_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ProjectNotFound, message)
    }

    pub fn already_running(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyRunning, message)
    }

    pub fn spawn_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SpawnFailed, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::IoFailure, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PanelError {}

impl From<io::Error> for PanelError {
    fn from(e: io::Error) -> Self {
        PanelError::io(e.to_string())
    }
}

/// Map an error kind to a process exit code:
/// - 127 when the toolchain is not installed (command not found)
/// - 1 for all other errors
pub fn exit_code_for_kind(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotInstalled => 127,
        _ => 1,
    }
}

pub type PanelResult<T> = Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_snake_case() {
        let s = serde_json::to_string(&ErrorKind::ProjectNotFound).unwrap();
        assert_eq!(s, "\"project_not_found\"");
        let back: ErrorKind = serde_json::from_str("\"non_zero_exit\"").unwrap();
        assert_eq!(back, ErrorKind::NonZeroExit);
    }

    #[test]
    fn io_errors_map_to_io_failure() {
        let e: PanelError = io::Error::new(io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(e.kind, ErrorKind::IoFailure);
        assert!(e.message.contains("nope"));
    }

    #[test]
    fn exit_codes_follow_command_not_found_convention() {
        assert_eq!(exit_code_for_kind(ErrorKind::NotInstalled), 127);
        assert_eq!(exit_code_for_kind(ErrorKind::Timeout), 1);
    }
}
