#![allow(clippy::module_name_repetitions)]
//! Environment Probe: read-only checks for toolchain, project and network.
//!
//! None of these return an error. A missing binary, an unrecognised directory or a
//! refused connection are status values; every check is bounded by a timeout.
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::{ProbeMode, ProjectLayout};
use crate::executor::CommandExecutor;
use crate::toolchain::Toolchain;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationProbe {
    pub installed: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectProbe {
    pub detected: bool,
    pub resolved_path: Option<PathBuf>,
    /// Which recognised configuration file matched.
    pub config_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkProbe {
    pub reachable: bool,
}

/// Run `<toolchain> --version` under `timeout`; any failure means "not installed".
pub fn probe_installation(toolchain: &Toolchain, timeout: Duration) -> InstallationProbe {
    if which::which(toolchain.program()).is_err() {
        tracing::debug!(program = toolchain.program(), "toolchain program not resolvable");
        return InstallationProbe {
            installed: false,
            version: None,
        };
    }
    let mut inv = toolchain.version_query();
    inv.timeout = Some(timeout);
    match CommandExecutor::new(timeout).execute(&inv) {
        Ok(r) if r.success => InstallationProbe {
            installed: true,
            version: first_line(&r.stdout),
        },
        Ok(r) => {
            tracing::debug!(exit_code = ?r.exit_code, "version query failed");
            InstallationProbe {
                installed: false,
                version: None,
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "version query could not run");
            InstallationProbe {
                installed: false,
                version: None,
            }
        }
    }
}

fn first_line(s: &str) -> Option<String> {
    s.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Look for the recognised configuration files at `path` (or `.`), in order.
pub fn probe_project(layout: &ProjectLayout, path: Option<&Path>) -> ProjectProbe {
    let base = path.unwrap_or_else(|| Path::new("."));
    for name in &layout.config_files {
        if base.join(name).is_file() {
            return ProjectProbe {
                detected: true,
                resolved_path: Some(base.to_path_buf()),
                config_file: Some(name.clone()),
            };
        }
    }
    ProjectProbe {
        detected: false,
        resolved_path: None,
        config_file: None,
    }
}

/// Short-timeout reachability check of the RPC endpoint.
pub fn probe_network(endpoint: &Url, mode: ProbeMode, timeout: Duration) -> NetworkProbe {
    let reachable = match mode {
        ProbeMode::Tcp => tcp_reachable(endpoint, timeout),
        ProbeMode::JsonRpc => tcp_reachable(endpoint, timeout) && json_rpc_answers(endpoint, timeout),
    };
    NetworkProbe { reachable }
}

fn tcp_reachable(endpoint: &Url, timeout: Duration) -> bool {
    let Some(host) = endpoint.host_str() else {
        return false;
    };
    let Some(port) = endpoint.port_or_known_default() else {
        return false;
    };
    // Bracketed IPv6 literals come back from host_str() with brackets.
    let host = host.trim_start_matches('[').trim_end_matches(']');
    match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs
            .into_iter()
            .any(|addr| TcpStream::connect_timeout(&addr, timeout).is_ok()),
        Err(_) => false,
    }
}

fn json_rpc_answers(endpoint: &Url, timeout: Duration) -> bool {
    let client = match reqwest::blocking::Client::builder().timeout(timeout).build() {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "failed to build HTTP client for JSON-RPC probe");
            return false;
        }
    };
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "web3_clientVersion",
        "params": [],
    });
    // Any HTTP answer means a server is speaking on the endpoint.
    client.post(endpoint.clone()).json(&body).send().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolchainSettings;
    use std::net::TcpListener;
    use std::time::Instant;

    #[test]
    fn project_first_config_match_wins() {
        let td = tempfile::tempdir().unwrap();
        let layout = ProjectLayout::default();
        assert!(!probe_project(&layout, Some(td.path())).detected);

        std::fs::write(td.path().join("hardhat.config.ts"), "export default {};\n").unwrap();
        let p = probe_project(&layout, Some(td.path()));
        assert!(p.detected);
        assert_eq!(p.config_file.as_deref(), Some("hardhat.config.ts"));

        std::fs::write(td.path().join("hardhat.config.js"), "module.exports = {};\n").unwrap();
        let p = probe_project(&layout, Some(td.path()));
        assert_eq!(p.config_file.as_deref(), Some("hardhat.config.js"));
        assert_eq!(p.resolved_path.as_deref(), Some(td.path()));
    }

    #[test]
    fn network_probe_sees_listener_and_refusal() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}")).unwrap();
        assert!(probe_network(&url, ProbeMode::Tcp, Duration::from_millis(500)).reachable);

        drop(listener);
        let started = Instant::now();
        let probe = probe_network(&url, ProbeMode::Tcp, Duration::from_millis(500));
        assert!(!probe.reachable);
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_toolchain_is_not_installed() {
        let tc = Toolchain::new(ToolchainSettings {
            program: "hardhat-panel-no-such-program".to_string(),
            ..ToolchainSettings::default()
        });
        let p = probe_installation(&tc, Duration::from_secs(1));
        assert!(!p.installed);
        assert!(p.version.is_none());
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  2.22.1 \nextra"), Some("2.22.1".to_string()));
        assert_eq!(first_line("  \n"), None);
    }
}
