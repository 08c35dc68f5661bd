//! Toolchain definition: the program and argument vector behind each named operation.
//!
//! Operations carry no behavior of their own; compile, test, deploy and console-eval
//! differ only in the argv built here.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::config::ToolchainSettings;
use crate::errors::{PanelError, PanelResult};
use crate::util::shell_join;

/// One one-shot command, fully resolved against the toolchain settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInvocation {
    /// Working directory; `None` for global operations such as install.
    pub project_path: Option<PathBuf>,
    pub command_name: String,
    pub program: String,
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl CommandInvocation {
    pub fn preview(&self) -> String {
        let mut words = vec![self.program.clone()];
        words.extend(self.arguments.iter().cloned());
        shell_join(&words)
    }
}

#[derive(Debug, Clone)]
pub struct Toolchain {
    settings: ToolchainSettings,
}

impl Toolchain {
    pub fn new(settings: ToolchainSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ToolchainSettings {
        &self.settings
    }

    pub fn program(&self) -> &str {
        &self.settings.program
    }

    fn invocation<I, S>(&self, name: &str, project: Option<&Path>, extra: I) -> CommandInvocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut arguments = self.settings.base_args.clone();
        arguments.extend(extra.into_iter().map(Into::into));
        CommandInvocation {
            project_path: project.map(Path::to_path_buf),
            command_name: name.to_string(),
            program: self.settings.program.clone(),
            arguments,
            stdin: None,
            timeout: None,
        }
    }

    pub fn version_query(&self) -> CommandInvocation {
        self.invocation("version", None, self.settings.version_args.clone())
    }

    pub fn install(&self) -> CommandInvocation {
        CommandInvocation {
            project_path: None,
            command_name: "install_toolchain".to_string(),
            program: self.settings.installer_program.clone(),
            arguments: self.settings.installer_args.clone(),
            stdin: None,
            timeout: None,
        }
    }

    pub fn init(&self, project: &Path) -> CommandInvocation {
        self.invocation("create_project", Some(project), self.settings.init_args.clone())
    }

    pub fn compile(&self, project: &Path) -> CommandInvocation {
        self.invocation("compile", Some(project), ["compile"])
    }

    pub fn test(&self, project: &Path) -> CommandInvocation {
        self.invocation("run_tests", Some(project), ["test"])
    }

    pub fn deploy(&self, project: &Path, script: Option<&str>) -> CommandInvocation {
        let script = script
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.settings.deploy_script.as_str());
        self.invocation(
            "deploy",
            Some(project),
            [
                "run".to_string(),
                script.to_string(),
                "--network".to_string(),
                self.settings.deploy_network.clone(),
            ],
        )
    }

    /// Console evaluation: the REPL reads `source` from stdin and exits at EOF.
    pub fn console_eval(&self, project: &Path, source: &str) -> CommandInvocation {
        let mut inv = self.invocation(
            "console_eval",
            Some(project),
            [
                "console".to_string(),
                "--network".to_string(),
                self.settings.deploy_network.clone(),
            ],
        );
        let mut input = source.to_string();
        if !input.ends_with('\n') {
            input.push('\n');
        }
        inv.stdin = Some(input);
        inv
    }

    pub fn run_task(
        &self,
        project: &Path,
        task: &str,
        args: &[String],
    ) -> PanelResult<CommandInvocation> {
        let task = task.trim();
        if task.is_empty() {
            return Err(PanelError::invalid("task name must not be empty"));
        }
        if task.starts_with('-') {
            return Err(PanelError::invalid(format!(
                "task name {task:?} must not start with '-'"
            )));
        }
        if task.chars().any(char::is_whitespace) {
            return Err(PanelError::invalid(format!(
                "task name {task:?} must not contain whitespace"
            )));
        }
        let mut extra = vec![task.to_string()];
        extra.extend(args.iter().cloned());
        Ok(self.invocation("run_task", Some(project), extra))
    }

    /// The long-running local network command.
    pub fn node(&self, project: &Path) -> CommandInvocation {
        self.invocation("node", Some(project), self.settings.node_args.clone())
    }
}
