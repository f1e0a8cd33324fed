// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conflict detection and resolution.
//!
//! A __conflict__ is anything sitting at a package file's target that is not
//! already that file. Linking over it would destroy it. So before anything
//! gets linked, Oxistow collects every conflict up front, and lets the caller
//! decide whether to back them up, delete them, or stop right there.

use crate::{
    link::{check_link, walk_files, LinkState},
    model::{ConflictFile, FileClassification, Package},
};

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{info, instrument, warn};

// Process wide counter for collision free backup names.
static NEXT_BACKUP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// What to do about detected conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    /// Move each conflicting target out of the way.
    Backup,

    /// Remove each conflicting target, recursively for directories.
    Delete,

    /// Abort without touching anything.
    Cancel,
}

/// Decide what to do about a set of conflicts.
///
/// Usually backed by an interactive prompt. Invoked at most once per sync,
/// with every conflict at once.
pub trait ConflictResolver {
    fn resolve(&mut self, conflicts: &[ConflictFile]) -> ConflictResolution;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&[ConflictFile]) -> ConflictResolution,
{
    fn resolve(&mut self, conflicts: &[ConflictFile]) -> ConflictResolution {
        self(conflicts)
    }
}

/// Find every file that a blind link would destroy.
///
/// Packages without a source directory are skipped. Targets that cannot be
/// inspected are logged and skipped. A non-directory sitting where a package
/// needs a directory is reported once, as the conflict itself, paired with
/// the package entry at the same relative path.
#[instrument(skip_all, level = "debug")]
pub fn detect_conflicts(packages: &[Package], dotfiles: &Path, home: &Path) -> Vec<ConflictFile> {
    let mut conflicts: Vec<ConflictFile> = Vec::new();
    for package in packages {
        let source_root = dotfiles.join(&package.source);
        if !source_root.is_dir() {
            continue;
        }

        for rel_path in walk_files(&source_root) {
            let source_path = source_root.join(&rel_path);
            let target_path = home.join(&rel_path);
            let state = match check_link(&source_path, &target_path) {
                Ok(state) => state,
                Err(err) => {
                    warn!("{err}");
                    continue;
                }
            };

            if state.classification() != FileClassification::Conflict {
                continue;
            }

            let (source_path, target_path) = match state {
                LinkState::Blocked(ancestor) => {
                    let rel_ancestor = ancestor.strip_prefix(home).unwrap_or(ancestor.as_path());
                    (source_root.join(rel_ancestor), ancestor)
                }
                _ => (source_path, target_path),
            };

            if conflicts.iter().any(|found| found.target_path == target_path) {
                continue;
            }

            let is_directory = fs::symlink_metadata(&target_path)
                .map(|meta| meta.is_dir())
                .unwrap_or(false);
            conflicts.push(ConflictFile {
                package_name: package.name.clone(),
                source_path,
                target_path,
                is_directory,
            });
        }
    }

    conflicts
}

/// Apply resolution to every conflict, in order.
///
/// Stops at the first conflict that cannot be resolved. [`ConflictResolution::Cancel`]
/// does nothing at all.
///
/// # Errors
///
/// - Return [`ConflictError::Backup`] if a target cannot be moved aside.
/// - Return [`ConflictError::Remove`] if a target cannot be removed.
#[instrument(skip(conflicts), level = "debug")]
pub fn resolve_conflicts(conflicts: &[ConflictFile], resolution: ConflictResolution) -> Result<()> {
    for conflict in conflicts {
        let target = conflict.target_path.as_path();
        match resolution {
            ConflictResolution::Backup => {
                let backup = backup_path(target);
                info!("back up {:?} to {:?}", target.display(), backup.display());
                fs::rename(target, &backup).map_err(|err| ConflictError::Backup {
                    source: err,
                    target_path: target.to_path_buf(),
                })?;
            }
            ConflictResolution::Delete => {
                info!("delete {:?}", target.display());
                let removal = if conflict.is_directory {
                    fs::remove_dir_all(target)
                } else {
                    fs::remove_file(target)
                };
                removal.map_err(|err| ConflictError::Remove {
                    source: err,
                    target_path: target.to_path_buf(),
                })?;
            }
            ConflictResolution::Cancel => return Ok(()),
        }
    }

    Ok(())
}

/// Pick a free backup path for target.
///
/// Prefers `<target>.backup`. If that is taken, falls back to
/// `<target>.backup.<pid>.<n>` for the first free `n`.
pub fn backup_path(target: &Path) -> PathBuf {
    let preferred = with_suffix(target, ".backup");
    if !is_taken(&preferred) {
        return preferred;
    }

    let pid = std::process::id();
    loop {
        let counter = NEXT_BACKUP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = with_suffix(target, &format!(".backup.{pid}.{counter}"));
        if !is_taken(&candidate) {
            return candidate;
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_taken(path: &Path) -> bool {
    !matches!(fs::symlink_metadata(path), Err(err) if err.kind() == io::ErrorKind::NotFound)
}

/// Conflict resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    /// Conflicting target cannot be backed up.
    #[error("failed to back up {:?}", target_path.display())]
    Backup {
        #[source]
        source: io::Error,
        target_path: PathBuf,
    },

    /// Conflicting target cannot be removed.
    #[error("failed to remove {:?}", target_path.display())]
    Remove {
        #[source]
        source: io::Error,
        target_path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ConflictError> = std::result::Result<T, E>;
