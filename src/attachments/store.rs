//! Managed copies on disk.
//!
//! Writes go through a temp file in the destination directory and are renamed
//! into place, so a failed copy never leaves a partial file at a managed path.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::config::ArchiveConfig;

use super::naming::{is_valid_segment, AttachmentNamer};
use super::AttachmentError;

/// Prefix of in-flight temp files; anything left with it is debris from a crash.
pub const TEMP_FILE_PREFIX: &str = ".healthlog-tmp-";

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
    namer: AttachmentNamer,
}

impl AttachmentStore {
    pub fn new(config: &ArchiveConfig) -> Self {
        Self {
            root: config.archive_root.clone(),
            namer: AttachmentNamer::new(config.max_name_len),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namer(&self) -> &AttachmentNamer {
        &self.namer
    }

    /// Directory holding one user's managed files.
    pub fn user_dir(&self, user: &str) -> Result<PathBuf, AttachmentError> {
        if !is_valid_segment(user) {
            return Err(AttachmentError::InvalidPath(format!("user segment '{user}'")));
        }
        Ok(self.root.join(user))
    }

    /// Absolute location of a managed relative path.
    ///
    /// Only plain `/`-separated segments are accepted: no absolute paths,
    /// no `.`/`..`, no empty segments.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, AttachmentError> {
        if relative.is_empty() {
            return Err(AttachmentError::InvalidPath("empty path".into()));
        }
        let mut resolved = self.root.clone();
        for segment in relative.split('/') {
            let mut components = Path::new(segment).components();
            let is_normal = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !is_valid_segment(segment) || !is_normal {
                return Err(AttachmentError::InvalidPath(relative.to_string()));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }

    pub fn exists(&self, relative: &str) -> Result<bool, AttachmentError> {
        Ok(self.resolve(relative)?.is_file())
    }

    /// Whether two managed paths name the same file on disk.
    ///
    /// Differently spelled paths can alias one file on case-insensitive
    /// filesystems. Missing files never match.
    pub fn same_file(&self, a: &str, b: &str) -> Result<bool, AttachmentError> {
        let (a, b) = (self.resolve(a)?, self.resolve(b)?);
        Ok(same_inode(&a, &b))
    }

    /// Copy `source` into the archive as attachment `attachment_id` of
    /// `visit_record_id`. Returns the managed relative path.
    ///
    /// Overwrites atomically if the path already exists.
    pub fn store(
        &self,
        user: &str,
        visit_record_id: i64,
        attachment_id: i64,
        source: &Path,
    ) -> Result<String, AttachmentError> {
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| AttachmentError::SourceNotFound(source.to_path_buf()))?;
        let relative =
            self.namer
                .managed_path(user, visit_record_id, attachment_id, &original_name)?;

        let mut input = open_source(source)?;
        let destination = self.resolve(&relative)?;
        let dir = self.user_dir(user)?;
        fs::create_dir_all(&dir).map_err(|e| AttachmentError::store_io(&dir, e))?;

        let bytes = copy_atomically(&mut input, &dir, &destination)?;
        tracing::info!(
            visit_record_id,
            attachment_id,
            path = %relative,
            bytes,
            "Attachment stored"
        );
        Ok(relative)
    }

    /// Delete a managed file. `Ok(false)` when it was already gone.
    pub fn remove(&self, relative: &str) -> Result<bool, AttachmentError> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!(path = %relative, "Attachment file removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AttachmentError::store_io(path, e)),
        }
    }

    /// Copy a managed file out of the archive.
    ///
    /// If `destination` is an existing directory the managed file name is kept.
    /// The managed copy is left untouched.
    pub fn export(&self, relative: &str, destination: &Path) -> Result<PathBuf, AttachmentError> {
        let source = self.resolve(relative)?;
        let mut input = open_source(&source)?;

        let target = if destination.is_dir() {
            let name = source
                .file_name()
                .ok_or_else(|| AttachmentError::InvalidPath(relative.to_string()))?;
            destination.join(name)
        } else {
            destination.to_path_buf()
        };
        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| AttachmentError::store_io(&dir, e))?;

        let bytes = copy_atomically(&mut input, &dir, &target)?;
        tracing::debug!(path = %relative, target = %target.display(), bytes, "Attachment exported");
        Ok(target)
    }

    /// Delete temp files left by copies interrupted in a previous session.
    /// Best-effort: unreadable directories are skipped. Returns the count removed.
    pub fn sweep_temp_files(&self) -> usize {
        let users = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(_) => return 0, // archive may not exist yet
        };

        let mut cleaned = 0usize;
        for user_dir in users.flatten().map(|e| e.path()).filter(|p| p.is_dir()) {
            let Ok(entries) = fs::read_dir(&user_dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let is_temp = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with(TEMP_FILE_PREFIX));
                if !is_temp {
                    continue;
                }
                match fs::remove_file(entry.path()) {
                    Ok(()) => cleaned += 1,
                    Err(e) => tracing::warn!(
                        path = %entry.path().display(),
                        error = %e,
                        "Failed to remove stale temp file"
                    ),
                }
            }
        }

        if cleaned > 0 {
            tracing::info!(files_cleaned = cleaned, "Cleaned stale temp files from previous session");
        }
        cleaned
    }
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

// Canonical paths carry the on-disk spelling here.
#[cfg(not(unix))]
fn same_inode(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn open_source(path: &Path) -> Result<File, AttachmentError> {
    let not_found = || AttachmentError::SourceNotFound(path.to_path_buf());
    let metadata = fs::metadata(path).map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }
    File::open(path).map_err(|_| not_found())
}

/// Copy to a temp file in `dir`, fsync, then rename over `destination`.
/// The temp file is deleted on every error path.
fn copy_atomically(
    input: &mut File,
    dir: &Path,
    destination: &Path,
) -> Result<u64, AttachmentError> {
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| AttachmentError::store_io(dir, e))?;

    let bytes = io::copy(input, temp.as_file_mut())
        .map_err(|e| AttachmentError::store_io(destination, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| AttachmentError::store_io(destination, e))?;
    temp.persist(destination)
        .map_err(|e| AttachmentError::store_io(destination, e.error))?;
    Ok(bytes)
}
