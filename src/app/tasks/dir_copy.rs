use crate::config::dist_template::ResolvedLayout;
use crate::domain::model::{CopyReport, CopyTarget};
use crate::domain::ports::CopyTask;
use crate::utils::error::{Result, WsError};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Mirrors a source tree into the staging area, skipping files already up
/// to date. Symlinked files and directories are copied as their targets.
#[derive(Debug, Clone)]
pub struct DirCopyTask {
    target: CopyTarget,
    source: PathBuf,
    destination: PathBuf,
    executable: bool,
    include: Vec<String>,
    exclude_suffixes: Vec<String>,
    exclude_dirs: Vec<String>,
}

impl DirCopyTask {
    pub fn new(target: CopyTarget, source: PathBuf, destination: PathBuf) -> Self {
        Self {
            target,
            source,
            destination,
            executable: false,
            include: Vec::new(),
            exclude_suffixes: Vec::new(),
            exclude_dirs: Vec::new(),
        }
    }

    /// Task for `layout`, with its paths resolved against the module
    /// directory and the staging directory.
    pub fn from_layout(layout: &ResolvedLayout, module_dir: &Path, staging_dir: &Path) -> Self {
        Self {
            target: layout.target,
            source: module_dir.join(&layout.source),
            destination: staging_dir.join(&layout.destination),
            executable: layout.executable,
            include: layout.include.clone(),
            exclude_suffixes: layout.exclude_suffixes.clone(),
            exclude_dirs: layout.exclude_dirs.clone(),
        }
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    pub fn with_include(mut self, include: Vec<String>) -> Self {
        self.include = include;
        self
    }

    pub fn with_excludes(mut self, suffixes: Vec<String>, dirs: Vec<String>) -> Self {
        self.exclude_suffixes = suffixes;
        self.exclude_dirs = dirs;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map(|name| self.exclude_dirs.iter().any(|d| d == name))
                .unwrap_or(false)
    }

    fn is_selected(&self, relative: &Path) -> bool {
        let name = relative.to_string_lossy();
        if self.exclude_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            return false;
        }
        // include entries name top-level files or directories
        if self.include.is_empty() {
            return true;
        }
        relative
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .map(|first| self.include.iter().any(|i| i == first))
            .unwrap_or(false)
    }

    fn copy_tree(&self, cancel_token: &AtomicBool) -> Result<CopyReport> {
        if !self.source.is_dir() {
            return Err(WsError::MissingSource {
                target: self.target.to_string(),
                path: self.source.clone(),
            });
        }

        let mut copied = 0;
        let mut skipped = 0;

        let walker = WalkDir::new(&self.source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_excluded_dir(e));

        for entry in walker {
            if cancel_token.load(Ordering::SeqCst) {
                return Err(WsError::Cancelled {
                    target: self.target.to_string(),
                });
            }
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.source)
                .map_err(|e| WsError::ConfigError {
                    message: format!("{} escapes {}: {}", entry.path().display(), self.source.display(), e),
                })?;
            if !self.is_selected(relative) {
                tracing::debug!("excluded {}", relative.display());
                continue;
            }

            let dest = self.destination.join(relative);
            if is_up_to_date(entry.path(), &dest)? {
                if self.executable {
                    make_executable(&dest)?;
                }
                skipped += 1;
                continue;
            }

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            if self.executable {
                make_executable(&dest)?;
            }
            tracing::debug!("{} -> {}", entry.path().display(), dest.display());
            copied += 1;
        }

        Ok(CopyReport {
            target: self.target,
            destination: self.destination.clone(),
            copied,
            skipped,
        })
    }
}

#[async_trait]
impl CopyTask for DirCopyTask {
    fn target(&self) -> CopyTarget {
        self.target
    }

    async fn run(&self, cancel_token: Arc<AtomicBool>) -> Result<CopyReport> {
        let task = self.clone();
        tokio::task::spawn_blocking(move || task.copy_tree(&cancel_token))
            .await
            .map_err(|e| WsError::ServerError {
                message: format!("{} copy aborted: {}", self.target, e),
            })?
    }
}

/// Same size and not older than the source.
fn is_up_to_date(source: &Path, dest: &Path) -> Result<bool> {
    let dest_meta = match fs::metadata(dest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    let source_meta = fs::metadata(source)?;

    if dest_meta.len() != source_meta.len() {
        return Ok(false);
    }
    Ok(dest_meta.modified()? >= source_meta.modified()?)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    if perms.mode() & 0o755 == 0o755 {
        return Ok(());
    }
    perms.set_mode(perms.mode() | 0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
