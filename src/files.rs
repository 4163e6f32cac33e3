//! Directory listing and mutation inside the sandbox.
//!
//! Operates only on paths that already passed [`crate::sandbox::resolve`].
//! Listings use link-aware stat so symlinks report as links instead of
//! being followed, and a single unreadable child never fails the whole
//! listing. Creation verifies the parent is writable up front instead of
//! inferring it from the outcome of the write.

use chrono::{DateTime, Utc};
use nix::unistd::{access, AccessFlags};
use serde::Serialize;
use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Filesystem operation failure.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("path not found")]
    NotFound,

    #[error("not a directory")]
    NotADirectory,

    #[error("entry already exists")]
    Conflict,

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
    Link,
    Unknown,
}

/// Kind of entry that can be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreateKind {
    File,
    Folder,
}

/// A single directory entry as reported to the client.
///
/// Ephemeral: recomputed on every listing, never persisted or cached.
#[derive(Debug, Clone, Serialize)]
pub struct FsEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
    pub permissions: String,
    #[serde(rename = "octalPermissions")]
    pub octal_permissions: String,
}

/// Fallback permission string when a child cannot be stat'ed.
const UNKNOWN_PERMISSIONS: &str = "----------";

/// Render the 10-character POSIX permission string for a mode.
pub fn render_permissions(is_dir: bool, mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// Render a mode as a zero-padded 4-digit octal string (12 permission bits).
pub fn render_octal(mode: u32) -> String {
    format!("{:04o}", mode & 0o7777)
}

fn entry_from_metadata(name: String, metadata: &fs::Metadata) -> FsEntry {
    let file_type = metadata.file_type();
    let kind = if file_type.is_symlink() {
        FileKind::Link
    } else if file_type.is_dir() {
        FileKind::Folder
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Unknown
    };

    let mode = metadata.mode();
    FsEntry {
        name,
        kind,
        size: Some(metadata.len()),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        permissions: render_permissions(file_type.is_dir(), mode),
        octal_permissions: render_octal(mode),
    }
}

/// List the immediate children of `path`.
///
/// `path` must exist and be a directory. A child whose stat fails is still
/// returned, with null size/modified and an all-dashes permission string.
pub fn list_directory(path: &Path) -> Result<Vec<FsEntry>, FsError> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(FsError::NotFound),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(FsError::PermissionDenied)
        }
        Err(e) => return Err(FsError::Io(e)),
    };
    if !metadata.is_dir() {
        return Err(FsError::NotADirectory);
    }

    let mut entries = Vec::new();
    for dirent in fs::read_dir(path)? {
        let dirent = dirent?;
        let name = dirent.file_name().to_string_lossy().to_string();

        // Link-aware stat: symlinks describe themselves, not their target.
        match fs::symlink_metadata(dirent.path()) {
            Ok(metadata) => entries.push(entry_from_metadata(name, &metadata)),
            Err(e) => {
                debug!("Failed to stat {}: {}", dirent.path().display(), e);
                entries.push(FsEntry {
                    name,
                    kind: FileKind::Unknown,
                    size: None,
                    modified: None,
                    permissions: UNKNOWN_PERMISSIONS.to_string(),
                    octal_permissions: render_octal(0),
                });
            }
        }
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Validate a new entry name: non-empty, no path separators, not `.`/`..`.
fn validate_name(name: &str) -> Result<(), FsError> {
    if name.is_empty() {
        return Err(FsError::InvalidInput("name must not be empty".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(FsError::InvalidInput(
            "name must not contain path separators".into(),
        ));
    }
    if name == "." || name == ".." {
        return Err(FsError::InvalidInput("invalid name".into()));
    }
    Ok(())
}

/// Create a zero-length file or an empty directory named `name` under `dir`.
///
/// The parent must exist, be a directory, and be writable; an existing
/// target is a conflict and is never overwritten.
pub fn create_entry(dir: &Path, name: &str, kind: CreateKind) -> Result<(), FsError> {
    validate_name(name)?;

    let parent = match fs::metadata(dir) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(FsError::NotFound),
        Err(e) => return Err(FsError::Io(e)),
    };
    if !parent.is_dir() {
        return Err(FsError::NotADirectory);
    }

    // Explicit writability check; not inferred from the create failing.
    if access(dir, AccessFlags::W_OK).is_err() {
        return Err(FsError::PermissionDenied);
    }

    let target = dir.join(name);
    if fs::symlink_metadata(&target).is_ok() {
        return Err(FsError::Conflict);
    }

    let result = match kind {
        CreateKind::File => fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map(|_| ()),
        CreateKind::Folder => fs::create_dir(&target),
    };

    match result {
        Ok(()) => Ok(()),
        // The existence check above races the create; map the loser to Conflict.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(FsError::Conflict),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(FsError::PermissionDenied)
        }
        Err(e) => Err(FsError::Io(e)),
    }
}

/// Parse and validate an octal mode string: 3 or 4 octal digits.
///
/// 3 digits carry no special bits; the 4th allows setuid/setgid/sticky.
pub fn parse_mode(mode: &str) -> Result<u32, FsError> {
    if !(3..=4).contains(&mode.len()) || !mode.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
        return Err(FsError::InvalidInput(format!(
            "mode must be 3 or 4 octal digits, got {mode:?}"
        )));
    }
    u32::from_str_radix(mode, 8)
        .map_err(|_| FsError::InvalidInput(format!("invalid octal mode {mode:?}")))
}

/// Change the permission bits of an existing entry.
pub fn change_mode(path: &Path, mode: &str) -> Result<(), FsError> {
    let parsed = parse_mode(mode)?;

    if fs::symlink_metadata(path).is_err() {
        return Err(FsError::NotFound);
    }

    fs::set_permissions(path, fs::Permissions::from_mode(parsed)).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FsError::NotFound,
        std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied,
        _ => FsError::Io(e),
    })
}
