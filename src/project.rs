//! Project Registry: path normalization and the remembered active project.
//!
//! Every other component takes the project path explicitly; the active path is only
//! a default for requests that omit one.
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use crate::errors::{PanelError, PanelResult};

#[derive(Debug, Default)]
pub struct ProjectRegistry {
    active: RwLock<Option<PathBuf>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<PathBuf> {
        self.active.read().ok().and_then(|g| g.clone())
    }

    pub fn remember(&self, path: &Path) {
        if let Ok(mut g) = self.active.write() {
            if g.as_deref() != Some(path) {
                tracing::info!(project = %path.display(), "active project changed");
            }
            *g = Some(path.to_path_buf());
        }
    }

    /// Explicit path wins; otherwise fall back to the active project.
    pub fn resolve(&self, explicit: Option<&Path>) -> PanelResult<PathBuf> {
        match explicit {
            Some(p) => normalize_project_path(p),
            None => self.active().ok_or_else(|| {
                PanelError::project_not_found("no project path given and no active project selected")
            }),
        }
    }
}

/// Expand `~`, absolutize against the working directory and canonicalize when the
/// path exists, so different spellings of one project share one key.
pub fn normalize_project_path(p: &Path) -> PanelResult<PathBuf> {
    if p.as_os_str().is_empty() {
        return Err(PanelError::invalid("project path must not be empty"));
    }
    let expanded = expand_home(p);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map_err(|e| PanelError::io(format!("cannot read current directory: {e}")))?
            .join(expanded)
    };
    match std::fs::canonicalize(&absolute) {
        Ok(c) => Ok(c),
        Err(_) => Ok(lexical_clean(&absolute)),
    }
}

fn expand_home(p: &Path) -> PathBuf {
    let mut comps = p.components();
    if let Some(Component::Normal(first)) = comps.next() {
        if first == "~" {
            if let Some(home) = home::home_dir() {
                return home.join(comps.as_path());
            }
        }
    }
    p.to_path_buf()
}

/// Drop `.` and resolve `..` without touching the filesystem.
fn lexical_clean(p: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in p.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
