//! Artifact Inventory Scanner: source units vs. build outputs, recomputed per call.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::config::ProjectLayout;
use crate::errors::{PanelError, PanelResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub source_path: PathBuf,
    pub compiled: bool,
    pub size_bytes: Option<u64>,
}

/// Debug companions the compiler writes next to each artifact.
const DEBUG_SUFFIX: &str = ".dbg.json";

pub fn scan(project: &Path, layout: &ProjectLayout) -> PanelResult<Vec<ArtifactInfo>> {
    let sources = collect_sources(&project.join(&layout.source_dir), &layout.source_extension)?;
    let outputs = collect_outputs(&project.join(&layout.build_dir))?;

    let mut items: Vec<ArtifactInfo> = sources
        .into_iter()
        .map(|source_path| {
            let name = source_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let size_bytes = outputs.get(&name).copied();
            ArtifactInfo {
                compiled: size_bytes.is_some(),
                size_bytes,
                name,
                source_path,
            }
        })
        .collect();
    items.sort_by(|a, b| a.source_path.cmp(&b.source_path));
    tracing::debug!(project = %project.display(), units = items.len(), "artifact scan complete");
    Ok(items)
}

fn collect_sources(dir: &Path, extension: &str) -> PanelResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .map(|x| x.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Map artifact base name -> size of the JSON artifact.
fn collect_outputs(dir: &Path) -> PanelResult<HashMap<String, u64>> {
    let mut out = HashMap::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| walk_error(dir, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if !file_name.ends_with(".json") || file_name.ends_with(DEBUG_SUFFIX) {
            continue;
        }
        let stem = file_name.trim_end_matches(".json").to_string();
        let size = entry
            .metadata()
            .map_err(|e| walk_error(dir, e))?
            .len();
        out.insert(stem, size);
    }
    Ok(out)
}

fn walk_error(dir: &Path, e: walkdir::Error) -> PanelError {
    PanelError::io(format!("failed to scan {}: {e}", dir.display()))
}
