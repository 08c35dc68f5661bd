mod cli;
mod doctor;

use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;
use hardhat_panel::bridge::{Bridge, Envelope};
use hardhat_panel::config::Settings;
use hardhat_panel::errors::exit_code_for_kind;

use crate::cli::{Cli, Command};

fn read_stdin_source() -> io::Result<String> {
    let mut s = String::new();
    io::stdin().read_to_string(&mut s)?;
    Ok(s)
}

/// 0 on success, 1 for a command that ran and failed, the kind's code for error envelopes.
fn exit_code_for(envelope: &Envelope) -> u8 {
    if !envelope.ok {
        return envelope.error_kind.map(exit_code_for_kind).unwrap_or(1);
    }
    let failed = envelope
        .data
        .as_ref()
        .and_then(|d| d.get("success"))
        .and_then(|v| v.as_bool())
        == Some(false);
    u8::from(failed)
}

fn print_envelope(envelope: &Envelope, pretty: bool) -> ExitCode {
    let rendered = if pretty {
        serde_json::to_string_pretty(envelope)
    } else {
        serde_json::to_string(envelope)
    };
    match rendered {
        Ok(s) => {
            println!("{s}");
            ExitCode::from(exit_code_for(envelope))
        }
        Err(e) => {
            let use_err = hardhat_panel::color_enabled_stderr();
            hardhat_panel::log_error_stderr(use_err, &format!("hardhat-panel: cannot encode response: {e}"));
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        hardhat_panel::set_color_mode(mode);
    }
    hardhat_panel::logging::init(cli.verbose);
    let use_err = hardhat_panel::color_enabled_stderr();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            hardhat_panel::log_error_stderr(use_err, &format!("hardhat-panel: invalid settings: {e:#}"));
            return ExitCode::from(1);
        }
    };

    if let Command::Doctor = cli.command {
        let usable = doctor::run_doctor(&settings, cli.verbose);
        return ExitCode::from(u8::from(!usable));
    }

    let bridge = match Bridge::new(settings) {
        Ok(b) => b,
        Err(e) => {
            hardhat_panel::log_error_stderr(use_err, &format!("hardhat-panel: {e:#}"));
            return ExitCode::from(1);
        }
    };

    if let Command::Serve = cli.command {
        let stdin = io::stdin();
        return match hardhat_panel::serve::serve(&bridge, stdin.lock(), io::stdout()) {
            Ok(stats) => {
                tracing::info!(requests = stats.requests, rejected = stats.rejected, "serve finished");
                ExitCode::from(0)
            }
            Err(e) => {
                hardhat_panel::log_error_stderr(use_err, &format!("hardhat-panel: serve: {e}"));
                ExitCode::from(1)
            }
        };
    }

    let request = match cli.command.to_request(read_stdin_source) {
        Ok(Some(r)) => r,
        Ok(None) => return ExitCode::from(0),
        Err(e) => {
            hardhat_panel::log_error_stderr(use_err, &format!("hardhat-panel: cannot read stdin: {e}"));
            return ExitCode::from(1);
        }
    };
    let envelope = bridge.handle(request);
    if let Some(msg) = &envelope.message {
        hardhat_panel::log_warn_stderr(use_err, &format!("hardhat-panel: {msg}"));
    }
    print_envelope(&envelope, cli.pretty)
}
