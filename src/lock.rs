use fs2::FileExt;
use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Project-scoped network lock guard; removes the lock file on drop.
///
/// Held for as long as a managed network process runs, so a second panel instance
/// cannot start another network for the same project.
#[derive(Debug)]
pub struct NetworkLock {
    file: File,
    path: PathBuf,
}

impl NetworkLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for NetworkLock {
    fn drop(&mut self) {
        // Best-effort unlock; ignore errors
        let _ = self.file.unlock();
        let _ = fs::remove_file(&self.path);
    }
}

#[derive(Debug)]
pub enum LockError {
    /// Another process holds the lock.
    Held(PathBuf),
    Io(io::Error),
}

/// Acquire the non-blocking exclusive network lock for `project`.
pub fn acquire_network_lock(project: &Path) -> Result<NetworkLock, LockError> {
    acquire_lock_at(&network_lock_path(project))
}

/// Acquire a lock at a specific path (helper for tests).
pub fn acquire_lock_at(p: &Path) -> Result<NetworkLock, LockError> {
    if let Some(parent) = p.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let f = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(p)
        .map_err(LockError::Io)?;
    match f.try_lock_exclusive() {
        Ok(()) => Ok(NetworkLock {
            file: f,
            path: p.to_path_buf(),
        }),
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
            Err(LockError::Held(p.to_path_buf()))
        }
        Err(e) => Err(LockError::Io(e)),
    }
}

/// Lock file location: <XDG_RUNTIME_DIR or tmp>/hardhat-panel.<hash(project)>.lock
///
/// Kept outside the project so the toolchain never sees it.
pub fn network_lock_path(project: &Path) -> PathBuf {
    let base = env::var("XDG_RUNTIME_DIR")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir);
    let key = normalized_project_key_for_hash(project);
    base.join(format!("hardhat-panel.{}.lock", hash_key_hex(&key)))
}

/// Normalize a project path string for hashing to a stable key.
pub fn normalized_project_key_for_hash(p: &Path) -> String {
    let abs = fs::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    let s = abs.to_string_lossy().to_string();
    #[cfg(windows)]
    {
        s.replace('/', "\\").to_ascii_lowercase()
    }
    #[cfg(not(windows))]
    {
        s
    }
}

/// Simple stable 64-bit FNV-1a hash for strings; returns 16-hex lowercase id.
pub fn hash_key_hex(s: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 1099511628211;
    let mut h: u64 = FNV_OFFSET;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    format!("{:016x}", h)
}
