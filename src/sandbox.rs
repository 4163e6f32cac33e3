//! Path sandbox resolution.
//!
//! Turns a client-supplied path into an absolute path provably inside a
//! configured base directory. Resolution is purely lexical: targets of
//! `create` do not exist yet, so canonicalization cannot be the gate.
//! Every file operation must resolve its input independently: the input
//! string is untrusted on each call and resolutions are never cached.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Sandbox resolution failure.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The requested path escapes the sandbox base directory.
    ///
    /// The message deliberately carries no path; the rejected candidate is
    /// written to the server log only.
    #[error("access denied")]
    AccessDenied,
}

/// Lexically normalize a path: collapse `.` and resolve `..` against
/// preceding components. `..` that would climb above the start of a
/// relative path (or above the root of an absolute one) is dropped.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push(Component::RootDir),
            Component::CurDir => {}
            Component::ParentDir => {
                // Pop a real component if there is one; a leading ".." run
                // has nothing to pop and is stripped. Popping at "/" or at
                // the start of a relative path is a no-op.
                out.pop();
            }
            Component::Normal(name) => out.push(name),
            Component::Prefix(_) => {}
        }
    }
    out
}

/// Make a path relative by dropping any leading root component.
fn demote_to_relative(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

/// Resolve `requested` against the sandbox `base`.
///
/// Returns an absolute path that is `base` itself or strictly inside it.
/// When `base` is the filesystem root, any normalized absolute path is
/// accepted as-is and relative paths are joined under `/`. When `base` is a
/// strict subdirectory, absolute-looking input is demoted to relative before
/// joining so it can never shadow-override the base.
///
/// The containment check at the end is the security boundary; the
/// normalization steps before it only reduce spurious accepts/rejects.
pub fn resolve(base: &Path, requested: &str) -> Result<PathBuf, SandboxError> {
    let normalized = normalize(Path::new(requested));
    let base_is_root = base == Path::new("/");

    let candidate = if base_is_root {
        if normalized.is_absolute() {
            normalized
        } else {
            normalize(&base.join(normalized))
        }
    } else {
        let relative = demote_to_relative(&normalized);
        normalize(&base.join(relative))
    };

    let contained = if base_is_root {
        candidate.is_absolute()
    } else {
        // Component-wise prefix check: /srv/data2 does not start with /srv/data.
        candidate.starts_with(base)
    };

    if !contained {
        warn!(
            requested,
            candidate = %candidate.display(),
            base = %base.display(),
            "Rejected path outside sandbox"
        );
        return Err(SandboxError::AccessDenied);
    }

    Ok(candidate)
}
