use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hardhat_panel::bridge::Request;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nbuilt:   ",
    env!("HARDHAT_PANEL_BUILD_DATE"),
    "\ntarget:  ",
    env!("HARDHAT_PANEL_BUILD_TARGET"),
    "\nprofile: ",
    env!("HARDHAT_PANEL_BUILD_PROFILE"),
    "\n",
    env!("HARDHAT_PANEL_BUILD_RUSTC"),
);

#[derive(Parser, Debug)]
#[command(
    name = "hardhat-panel",
    version,
    long_version = LONG_VERSION,
    about = "Drive a local Hardhat toolchain: probe status, run one-shot commands and supervise a local network.",
    after_long_help = "Examples:\n  hardhat-panel status --project ./my-dapp\n  hardhat-panel compile --project ./my-dapp\n  hardhat-panel console --project ./my-dapp 'await ethers.provider.getBlockNumber()'\n  hardhat-panel serve < requests.jsonl\n\n"
)]
pub(crate) struct Cli {
    /// YAML settings file (overrides HARDHAT_PANEL_CONFIG)
    #[arg(long, global = true)]
    pub(crate) config: Option<PathBuf>,

    /// Debug-level diagnostics on stderr (HARDHAT_PANEL_LOG still wins)
    #[arg(long, short = 'v', global = true)]
    pub(crate) verbose: bool,

    /// Colorize stderr: auto|always|never
    #[arg(long = "color", value_enum, global = true)]
    pub(crate) color: Option<hardhat_panel::ColorMode>,

    /// Pretty-print the JSON envelope
    #[arg(long, global = true)]
    pub(crate) pretty: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Probe toolchain installation, project detection and network reachability
    Status {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Install the toolchain globally through the package manager
    Install,
    /// Create the directory if needed and scaffold a project in it
    Create {
        #[arg(long)]
        project: PathBuf,
    },
    /// List contract sources and whether each has a compiled artifact
    Artifacts {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Compile the project's contracts
    Compile {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Run the project's test suite
    Test {
        #[arg(long)]
        project: Option<PathBuf>,
    },
    /// Run a deployment script against the local network
    Deploy {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Script path relative to the project (default: scripts/deploy.js)
        #[arg(long)]
        script: Option<String>,
    },
    /// Evaluate a snippet in the console attached to the local network
    Console {
        #[arg(long)]
        project: Option<PathBuf>,
        /// Source to evaluate; read from stdin when omitted
        source: Option<String>,
    },
    /// Run a named task with pass-through arguments
    Task {
        #[arg(long)]
        project: Option<PathBuf>,
        task: String,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Serve JSON-line requests on stdin, one envelope per line on stdout
    Serve,
    /// Print build info, effective settings and probe results
    Doctor,
}

impl Command {
    /// The bridge request for one-shot subcommands; `None` for serve/doctor.
    pub(crate) fn to_request(
        &self,
        stdin_source: impl FnOnce() -> std::io::Result<String>,
    ) -> std::io::Result<Option<Request>> {
        let req = match self.clone() {
            Command::Status { project } => Request::CheckStatus {
                project_path: project,
            },
            Command::Install => Request::InstallToolchain {},
            Command::Create { project } => Request::CreateProject {
                project_path: project,
            },
            Command::Artifacts { project } => Request::ListArtifacts {
                project_path: project,
            },
            Command::Compile { project } => Request::Compile {
                project_path: project,
            },
            Command::Test { project } => Request::RunTests {
                project_path: project,
            },
            Command::Deploy { project, script } => Request::Deploy {
                project_path: project,
                script,
            },
            Command::Console { project, source } => Request::ConsoleEval {
                project_path: project,
                source: match source {
                    Some(s) => s,
                    None => stdin_source()?,
                },
            },
            Command::Task {
                project,
                task,
                args,
            } => Request::RunTask {
                project_path: project,
                task,
                args,
            },
            Command::Serve | Command::Doctor => return Ok(None),
        };
        Ok(Some(req))
    }
}
