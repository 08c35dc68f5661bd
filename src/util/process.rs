//! Process-group helpers shared by one-shot commands and the managed network.
//!
//! Toolchain launchers such as `npx` fork the real program as a grandchild, so
//! signals target the whole group on unix. Other platforms fall back to
//! `Child::kill` at the call sites.
use std::process::{Command, ExitStatus};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupSignal {
    Terminate,
    Kill,
}

/// Start the child as the leader of a fresh process group.
pub fn isolate_process_group(cmd: &mut Command) {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    #[cfg(not(unix))]
    {
        let _ = cmd;
    }
}

/// Signal the process group led by `pid`. Returns false when nothing was signalled.
pub fn signal_group(pid: u32, sig: GroupSignal) -> bool {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        let signal = match sig {
            GroupSignal::Terminate => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        killpg(Pid::from_raw(raw), signal).is_ok()
    }
    #[cfg(not(unix))]
    {
        let _ = (pid, sig);
        false
    }
}

/// Signal number that terminated the process, if any.
pub fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        None
    }
}

/// Short human description of an exit status ("exit code 2", "signal 9").
pub fn describe_exit(status: &ExitStatus) -> String {
    match (status.code(), terminating_signal(status)) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(sig)) => format!("signal {sig}"),
        (None, None) => "unknown exit status".to_string(),
    }
}
