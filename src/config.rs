#![allow(clippy::module_name_repetitions)]
//! Settings: defaults, optional YAML file, `.env` and `HARDHAT_PANEL_*` overrides.
//!
//! Load order (later wins):
//! 1) built-in defaults (Hardhat conventions)
//! 2) YAML file from `--config` or HARDHAT_PANEL_CONFIG
//! 3) `.env` in the working directory (dotenvy; never overrides variables already set)
//! 4) HARDHAT_PANEL_* environment variables
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::util::shell_like_split_args;

pub const ENV_PREFIX: &str = "HARDHAT_PANEL_";
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// How the network probe decides reachability.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// TCP connect to the endpoint's host:port.
    Tcp,
    /// TCP connect followed by a JSON-RPC round trip over HTTP.
    JsonRpc,
}

impl ProbeMode {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Some(ProbeMode::Tcp),
            "json_rpc" | "json-rpc" | "jsonrpc" | "http" => Some(ProbeMode::JsonRpc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub toolchain: ToolchainSettings,
    pub project: ProjectLayout,
    pub network: NetworkSettings,
    pub timeouts: Timeouts,
}

/// Programs and argument vectors for every toolchain operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub program: String,
    pub base_args: Vec<String>,
    pub version_args: Vec<String>,
    pub init_args: Vec<String>,
    pub node_args: Vec<String>,
    pub installer_program: String,
    pub installer_args: Vec<String>,
    pub deploy_network: String,
    pub deploy_script: String,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            base_args: vec!["hardhat".to_string()],
            version_args: vec!["--version".to_string()],
            init_args: vec!["init".to_string(), "--yes".to_string()],
            node_args: vec!["node".to_string()],
            installer_program: "npm".to_string(),
            installer_args: vec![
                "install".to_string(),
                "-g".to_string(),
                "hardhat".to_string(),
            ],
            deploy_network: "localhost".to_string(),
            deploy_script: "scripts/deploy.js".to_string(),
        }
    }
}

/// Fixed file-system conventions of the wrapped toolchain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectLayout {
    /// Checked in order; first match wins.
    pub config_files: Vec<String>,
    pub source_dir: String,
    pub build_dir: String,
    pub source_extension: String,
}

impl Default for ProjectLayout {
    fn default() -> Self {
        Self {
            config_files: vec![
                "hardhat.config.js".to_string(),
                "hardhat.config.ts".to_string(),
            ],
            source_dir: "contracts".to_string(),
            build_dir: "artifacts".to_string(),
            source_extension: "sol".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub rpc_url: String,
    pub probe_mode: ProbeMode,
    /// Capacity of the per-process output ring buffer, in lines.
    pub output_buffer_lines: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            probe_mode: ProbeMode::Tcp,
            output_buffer_lines: 1000,
        }
    }
}

impl NetworkSettings {
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&self.rpc_url).with_context(|| format!("invalid rpc_url {:?}", self.rpc_url))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_str")]
    pub probe: Duration,
    #[serde(with = "humantime_str")]
    pub version_query: Duration,
    #[serde(with = "humantime_str")]
    pub command: Duration,
    #[serde(with = "humantime_str")]
    pub install: Duration,
    /// Upper bound `start` waits for a readiness signal.
    #[serde(with = "humantime_str")]
    pub network_grace: Duration,
    /// How long `stop` waits after SIGTERM before escalating to SIGKILL.
    #[serde(with = "humantime_str")]
    pub stop: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(2),
            version_query: Duration::from_secs(10),
            command: Duration::from_secs(300),
            install: Duration::from_secs(600),
            network_grace: Duration::from_secs(5),
            stop: Duration::from_secs(5),
        }
    }
}

mod humantime_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

impl Settings {
    /// Load settings from the optional YAML file, `.env` and the process environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = config_path.map(Path::to_path_buf).or_else(|| {
            std::env::var(format!("{ENV_PREFIX}CONFIG"))
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        });
        let mut settings = match path {
            Some(p) => Self::from_yaml_file(&p)?,
            None => Self::default(),
        };
        settings.apply_env_overrides_from(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&raw).with_context(|| format!("in config file {}", path.display()))
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let settings: Settings = serde_yaml::from_str(raw).context("failed to parse YAML")?;
        Ok(settings)
    }

    /// Apply HARDHAT_PANEL_* overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let duration = |name: &str| -> Result<Option<Duration>> {
            match get(name) {
                Some(v) => humantime::parse_duration(&v)
                    .map(Some)
                    .with_context(|| format!("{ENV_PREFIX}{name}: invalid duration {v:?}")),
                None => Ok(None),
            }
        };

        if let Some(v) = get("TOOLCHAIN_PROGRAM") {
            self.toolchain.program = v;
        }
        if let Some(v) = get("TOOLCHAIN_ARGS") {
            self.toolchain.base_args = shell_like_split_args(&v);
        }
        if let Some(v) = get("INSTALLER_PROGRAM") {
            self.toolchain.installer_program = v;
        }
        if let Some(v) = get("INSTALLER_ARGS") {
            self.toolchain.installer_args = shell_like_split_args(&v);
        }
        if let Some(v) = get("DEPLOY_NETWORK") {
            self.toolchain.deploy_network = v;
        }
        if let Some(v) = get("RPC_URL") {
            self.network.rpc_url = v;
        }
        if let Some(v) = get("PROBE_MODE") {
            self.network.probe_mode = ProbeMode::parse(&v)
                .ok_or_else(|| anyhow!("{ENV_PREFIX}PROBE_MODE: expected tcp or json_rpc, got {v:?}"))?;
        }
        if let Some(v) = get("OUTPUT_LINES") {
            self.network.output_buffer_lines = v
                .parse()
                .with_context(|| format!("{ENV_PREFIX}OUTPUT_LINES: invalid number {v:?}"))?;
        }
        if let Some(d) = duration("PROBE_TIMEOUT")? {
            self.timeouts.probe = d;
        }
        if let Some(d) = duration("COMMAND_TIMEOUT")? {
            self.timeouts.command = d;
        }
        if let Some(d) = duration("INSTALL_TIMEOUT")? {
            self.timeouts.install = d;
        }
        if let Some(d) = duration("NETWORK_GRACE")? {
            self.timeouts.network_grace = d;
        }
        if let Some(d) = duration("STOP_TIMEOUT")? {
            self.timeouts.stop = d;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.toolchain.program.trim().is_empty() {
            return Err(anyhow!("toolchain.program must not be empty"));
        }
        if self.project.config_files.is_empty() {
            return Err(anyhow!("project.config_files must name at least one file"));
        }
        if self.network.output_buffer_lines == 0 {
            return Err(anyhow!("network.output_buffer_lines must be at least 1"));
        }
        let url = self.network.endpoint()?;
        if url.host_str().is_none() {
            return Err(anyhow!("rpc_url {:?} has no host", self.network.rpc_url));
        }
        Ok(())
    }
}
