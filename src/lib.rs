/*!
Hardhat panel core: probes, project registry, local network supervision, one-shot
toolchain commands, artifact inventory and the request bridge in front of them.

Architecture
- Binary glue (src/main.rs) parses the CLI, loads `Settings`, then either prints one
  bridge envelope, serves JSON lines over stdio, or runs `doctor`.
- `bridge::Bridge` is the single entry point; everything below it takes explicit
  project paths and never touches presentation concerns.

Key modules
- probe: installation / project / network checks; never error, always bounded.
- project: path normalization and the remembered active project.
- lifecycle: one supervised network process per project path, with a ring buffer
  of its output and crash detection.
- executor + toolchain: named operations mapped to argument vectors and run with
  timeouts, captured output and structured results.
- scanner: contract sources vs. build artifacts.
- util::{exec, process}: subprocess runner and process-group signalling.
- lock: cross-process advisory lock per project network.
- config, errors, logging, color: ambient plumbing.

Environment
- HARDHAT_PANEL_CONFIG: YAML settings file (same as `--config`).
- HARDHAT_PANEL_*: per-field overrides, see `config::Settings::apply_env_overrides_from`.
- HARDHAT_PANEL_LOG / RUST_LOG: tracing filter for stderr diagnostics.
- HARDHAT_PANEL_COLOR / NO_COLOR: stderr color control.
*/

pub mod bridge;
pub mod color;
pub mod config;
pub mod errors;
pub mod executor;
pub mod lifecycle;
pub mod lock;
pub mod logging;
pub mod probe;
pub mod project;
pub mod scanner;
pub mod serve;
pub mod toolchain;
pub mod util;

pub use bridge::{Bridge, Envelope, Request, ToolchainStatus};
pub use color::*;
pub use config::Settings;
pub use errors::{ErrorKind, PanelError, PanelResult};
pub use executor::CommandResult;
pub use lifecycle::{ProcessState, ProcessSummary};
pub use scanner::ArtifactInfo;
pub use toolchain::CommandInvocation;
