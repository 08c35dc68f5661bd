/*!
Command Bridge: the single request/response entry point for presentation code.

Every request yields exactly one `Envelope`:
- `{ok: true, data}` on success (a failed one-shot command is still `ok`, with
  `data.success == false`);
- `{ok: false, error_kind, message}` for invocation-level failures, unknown
  commands, malformed arguments and caught panics.

`Bridge` is `Send + Sync`; callers may issue requests from many threads at once.
*/
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::Settings;
use crate::errors::{ErrorKind, PanelError, PanelResult};
use crate::executor::{CommandExecutor, CommandResult};
use crate::lifecycle::{
    LifecycleConfig, LifecycleManager, ProcessState, ProcessSummary, SUMMARY_TAIL_LINES,
};
use crate::probe::{probe_installation, probe_network, probe_project, ProjectProbe};
use crate::project::{normalize_project_path, ProjectRegistry};
use crate::scanner::{scan, ArtifactInfo};
use crate::toolchain::{CommandInvocation, Toolchain};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub project_detected: bool,
    pub project_path: Option<PathBuf>,
    pub network_running: bool,
    /// Lifecycle state recorded for the probed project path.
    pub network_state: Option<ProcessState>,
}

/// Named bridge request; `command` selects the variant, `args` carries its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case")]
pub enum Request {
    CheckStatus {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    InstallToolchain {},
    CreateProject {
        project_path: PathBuf,
    },
    StartNetwork {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    StopNetwork {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    NetworkStatus {
        #[serde(default)]
        project_path: Option<PathBuf>,
        #[serde(default)]
        lines: Option<usize>,
    },
    SelectProject {
        project_path: PathBuf,
    },
    ListArtifacts {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    Compile {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    RunTests {
        #[serde(default)]
        project_path: Option<PathBuf>,
    },
    Deploy {
        #[serde(default)]
        project_path: Option<PathBuf>,
        #[serde(default)]
        script: Option<String>,
    },
    ConsoleEval {
        #[serde(default)]
        project_path: Option<PathBuf>,
        source: String,
    },
    RunTask {
        #[serde(default)]
        project_path: Option<PathBuf>,
        task: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl Request {
    pub const COMMANDS: &'static [&'static str] = &[
        "check_status",
        "install_toolchain",
        "create_project",
        "start_network",
        "stop_network",
        "network_status",
        "select_project",
        "list_artifacts",
        "compile",
        "run_tests",
        "deploy",
        "console_eval",
        "run_task",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Request::CheckStatus { .. } => "check_status",
            Request::InstallToolchain {} => "install_toolchain",
            Request::CreateProject { .. } => "create_project",
            Request::StartNetwork { .. } => "start_network",
            Request::StopNetwork { .. } => "stop_network",
            Request::NetworkStatus { .. } => "network_status",
            Request::SelectProject { .. } => "select_project",
            Request::ListArtifacts { .. } => "list_artifacts",
            Request::Compile { .. } => "compile",
            Request::RunTests { .. } => "run_tests",
            Request::Deploy { .. } => "deploy",
            Request::ConsoleEval { .. } => "console_eval",
            Request::RunTask { .. } => "run_task",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn success(data: Value) -> Self {
        Self {
            id: None,
            ok: true,
            data: Some(data),
            error_kind: None,
            message: None,
        }
    }

    pub fn failure(e: &PanelError) -> Self {
        Self {
            id: None,
            ok: false,
            data: None,
            error_kind: Some(e.kind),
            message: Some(e.message.clone()),
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}

#[derive(Debug)]
pub struct Bridge {
    settings: Settings,
    endpoint: Url,
    toolchain: Toolchain,
    registry: ProjectRegistry,
    lifecycle: LifecycleManager,
    executor: CommandExecutor,
}

impl Bridge {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let lifecycle_config = LifecycleConfig::from_settings(&settings)?;
        Self::with_lifecycle_config(settings, lifecycle_config)
    }

    pub fn with_lifecycle_config(
        settings: Settings,
        lifecycle_config: LifecycleConfig,
    ) -> anyhow::Result<Self> {
        settings.validate()?;
        let endpoint = settings.network.endpoint()?;
        let toolchain = Toolchain::new(settings.toolchain.clone());
        Ok(Self {
            endpoint,
            registry: ProjectRegistry::new(),
            lifecycle: LifecycleManager::new(lifecycle_config, toolchain.clone()),
            executor: CommandExecutor::new(settings.timeouts.command),
            toolchain,
            settings,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    /// Handle a typed request; never panics, always one envelope.
    pub fn handle(&self, request: Request) -> Envelope {
        let name = request.name();
        let outcome = catch_unwind(AssertUnwindSafe(|| self.dispatch(request)));
        match outcome {
            Ok(Ok(data)) => Envelope::success(data),
            Ok(Err(e)) => {
                tracing::info!(command = name, kind = %e.kind, message = %e.message, "request failed");
                Envelope::failure(&e)
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                tracing::error!(command = name, panic = %detail, "request handler panicked");
                Envelope::failure(&PanelError::new(
                    ErrorKind::Internal,
                    format!("internal fault while handling {name}: {detail}"),
                ))
            }
        }
    }

    /// Handle a raw JSON request `{"command": ..., "args": {...}, "id": ...}`.
    pub fn handle_json(&self, raw: Value) -> Envelope {
        let id = raw.get("id").cloned();
        match parse_request(raw) {
            Ok(request) => self.handle(request).with_id(id),
            Err(e) => {
                tracing::info!(message = %e.message, "rejected malformed request");
                Envelope::failure(&e).with_id(id)
            }
        }
    }

    fn dispatch(&self, request: Request) -> PanelResult<Value> {
        tracing::debug!(command = request.name(), "dispatching request");
        match request {
            Request::CheckStatus { project_path } => to_value(self.check_status(project_path.as_deref())?),
            Request::InstallToolchain {} => to_value(self.install_toolchain()?),
            Request::CreateProject { project_path } => to_value(self.create_project(&project_path)?),
            Request::StartNetwork { project_path } => to_value(self.start_network(project_path.as_deref())?),
            Request::StopNetwork { project_path } => to_value(self.stop_network(project_path.as_deref())?),
            Request::NetworkStatus { project_path, lines } => {
                to_value(self.network_status(project_path.as_deref(), lines)?)
            }
            Request::SelectProject { project_path } => to_value(self.select_project(&project_path)?),
            Request::ListArtifacts { project_path } => to_value(self.list_artifacts(project_path.as_deref())?),
            Request::Compile { project_path } => to_value(self.compile(project_path.as_deref())?),
            Request::RunTests { project_path } => to_value(self.run_tests(project_path.as_deref())?),
            Request::Deploy {
                project_path,
                script,
            } => to_value(self.deploy(project_path.as_deref(), script.as_deref())?),
            Request::ConsoleEval {
                project_path,
                source,
            } => to_value(self.console_eval(project_path.as_deref(), &source)?),
            Request::RunTask {
                project_path,
                task,
                args,
            } => to_value(self.run_task(project_path.as_deref(), &task, &args)?),
        }
    }

    /// Fresh status: the three probes run concurrently; nothing is cached.
    pub fn check_status(&self, project_path: Option<&Path>) -> PanelResult<ToolchainStatus> {
        let path = match project_path {
            Some(p) => normalize_project_path(p)?,
            None => match self.registry.active() {
                Some(p) => p,
                None => normalize_project_path(Path::new("."))?,
            },
        };
        let timeouts = &self.settings.timeouts;
        let (install, project, network) = std::thread::scope(|s| {
            let install = s.spawn(|| probe_installation(&self.toolchain, timeouts.version_query));
            let network = s.spawn(|| {
                probe_network(&self.endpoint, self.settings.network.probe_mode, timeouts.probe)
            });
            let project = probe_project(&self.settings.project, Some(&path));
            (install.join(), project, network.join())
        });
        let install = install.map_err(|_| PanelError::new(ErrorKind::Internal, "installation probe panicked"))?;
        let network = network.map_err(|_| PanelError::new(ErrorKind::Internal, "network probe panicked"))?;

        if project.detected {
            self.registry.remember(&path);
        }
        Ok(ToolchainStatus {
            installed: install.installed,
            version: install.version,
            project_detected: project.detected,
            project_path: project.resolved_path,
            network_running: network.reachable,
            network_state: Some(self.lifecycle.status(&path)),
        })
    }

    pub fn install_toolchain(&self) -> PanelResult<CommandResult> {
        let mut inv = self.toolchain.install();
        inv.timeout = Some(self.settings.timeouts.install);
        self.executor.execute(&inv)
    }

    pub fn create_project(&self, project_path: &Path) -> PanelResult<CommandResult> {
        let path = normalize_project_path(project_path)?;
        std::fs::create_dir_all(&path).map_err(|e| {
            PanelError::io(format!("failed to create directory {}: {e}", path.display()))
        })?;
        let result = self.executor.execute(&self.toolchain.init(&path))?;
        if result.success {
            self.registry.remember(&path);
        }
        Ok(result)
    }

    pub fn select_project(&self, project_path: &Path) -> PanelResult<ProjectProbe> {
        let path = normalize_project_path(project_path)?;
        let probe = probe_project(&self.settings.project, Some(&path));
        if !probe.detected {
            return Err(self.not_a_project(&path));
        }
        self.registry.remember(&path);
        Ok(probe)
    }

    pub fn start_network(&self, project_path: Option<&Path>) -> PanelResult<ProcessSummary> {
        let path = self.require_project(project_path)?;
        self.lifecycle.start(&path)
    }

    pub fn stop_network(&self, project_path: Option<&Path>) -> PanelResult<ProcessSummary> {
        let path = self.registry.resolve(project_path)?;
        self.lifecycle.stop(&path)
    }

    pub fn network_status(
        &self,
        project_path: Option<&Path>,
        lines: Option<usize>,
    ) -> PanelResult<ProcessSummary> {
        let path = self.registry.resolve(project_path)?;
        Ok(self
            .lifecycle
            .summary(&path, lines.unwrap_or(SUMMARY_TAIL_LINES)))
    }

    pub fn list_artifacts(&self, project_path: Option<&Path>) -> PanelResult<Vec<ArtifactInfo>> {
        let path = self.require_project(project_path)?;
        scan(&path, &self.settings.project)
    }

    pub fn compile(&self, project_path: Option<&Path>) -> PanelResult<CommandResult> {
        let path = self.require_project(project_path)?;
        self.run(self.toolchain.compile(&path))
    }

    pub fn run_tests(&self, project_path: Option<&Path>) -> PanelResult<CommandResult> {
        let path = self.require_project(project_path)?;
        self.run(self.toolchain.test(&path))
    }

    pub fn deploy(
        &self,
        project_path: Option<&Path>,
        script: Option<&str>,
    ) -> PanelResult<CommandResult> {
        let path = self.require_project(project_path)?;
        self.run(self.toolchain.deploy(&path, script))
    }

    pub fn console_eval(&self, project_path: Option<&Path>, source: &str) -> PanelResult<CommandResult> {
        if source.trim().is_empty() {
            return Err(PanelError::invalid("console_eval requires non-empty source"));
        }
        let path = self.require_project(project_path)?;
        self.run(self.toolchain.console_eval(&path, source))
    }

    pub fn run_task(
        &self,
        project_path: Option<&Path>,
        task: &str,
        args: &[String],
    ) -> PanelResult<CommandResult> {
        let path = self.require_project(project_path)?;
        let inv = self.toolchain.run_task(&path, task, args)?;
        self.run(inv)
    }

    fn run(&self, invocation: CommandInvocation) -> PanelResult<CommandResult> {
        self.executor.execute(&invocation)
    }

    /// Resolve and require a recognised project; remembers it as active.
    fn require_project(&self, project_path: Option<&Path>) -> PanelResult<PathBuf> {
        let path = self.registry.resolve(project_path)?;
        if !probe_project(&self.settings.project, Some(&path)).detected {
            return Err(self.not_a_project(&path));
        }
        self.registry.remember(&path);
        Ok(path)
    }

    fn not_a_project(&self, path: &Path) -> PanelError {
        PanelError::project_not_found(format!(
            "no project at {} (looked for {})",
            path.display(),
            self.settings.project.config_files.join(", ")
        ))
    }

    /// Stop every managed network; call before the host process exits.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}

fn to_value<T: Serialize>(v: T) -> PanelResult<Value> {
    serde_json::to_value(v)
        .map_err(|e| PanelError::new(ErrorKind::Internal, format!("failed to encode result: {e}")))
}

fn parse_request(mut raw: Value) -> PanelResult<Request> {
    let obj = raw
        .as_object_mut()
        .ok_or_else(|| PanelError::invalid("request must be a JSON object"))?;
    let command = match obj.get("command") {
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(PanelError::invalid("\"command\" must be a string")),
        None => return Err(PanelError::invalid("request is missing \"command\"")),
    };
    if !Request::COMMANDS.contains(&command.as_str()) {
        return Err(PanelError::invalid(format!("unknown command {command:?}")));
    }
    obj.remove("id");
    match obj.get("args") {
        None | Some(Value::Null) => {
            obj.insert("args".to_string(), Value::Object(Default::default()));
        }
        Some(Value::Object(_)) => {}
        Some(_) => return Err(PanelError::invalid("\"args\" must be an object")),
    }
    serde_json::from_value(raw)
        .map_err(|e| PanelError::invalid(format!("malformed arguments for {command}: {e}")))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
