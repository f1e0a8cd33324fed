// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Drift analysis.
//!
//! __Drift__ is any difference between what the declared packages contain and
//! what the home directory actually links to. Oxistow offers two ways to look
//! for it.
//!
//! # Quick Check
//!
//! [`quick_check`] only counts files in each package and compares that count
//! with the one stored in the ledger. It cannot say _which_ file changed, but
//! it never touches the home directory, so it is cheap enough to run on every
//! refresh. A package the ledger has never seen is not considered drifted,
//! because there is no baseline to compare against.
//!
//! # Full Check
//!
//! [`full_check`] classifies every file of every package against its target,
//! and then scans the home directory for __orphans__: symlinks that point into
//! a package at a file that no longer exists there. This takes two walks per
//! package, so it is reserved for explicit sync and status requests.
//!
//! Both checks also compare the ledger's package list with the declared one.
//! Any package that only the ledger knows about has been removed from the
//! configuration, and always counts as drift.

use crate::{
    ledger::Ledger,
    link::{check_link, clean_path, count_files, resolve_symlink, same_file, walk_dirs, walk_files},
    model::{DriftResult, DriftSummary, FileClassification, Package},
};

use futures::future::join_all;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Compare current file counts with stored file counts.
#[instrument(skip_all, level = "debug")]
pub fn quick_check(packages: &[Package], dotfiles: &Path, ledger: &Ledger) -> DriftSummary {
    let mut summary = DriftSummary::default();
    for package in packages {
        let source_root = dotfiles.join(&package.source);
        let current = if source_root.is_dir() {
            count_files(&source_root)
        } else {
            0
        };

        let mut result = DriftResult::new(package);
        result.current_file_count = current;
        if let Some(stored) = ledger.get_count(&package.name) {
            result.stored_file_count = stored;
            result.has_drift = stored != current;
        }

        debug!(
            "package {:?} has {current} file(s), ledger says {}",
            package.name, result.stored_file_count
        );
        summary.push(result);
    }

    push_removed_packages(&mut summary, packages, ledger);
    summary
}

/// Classify every package file, and look for orphans and removed packages.
///
/// Packages whose source directory does not exist are left out of the
/// results entirely.
#[instrument(skip_all, level = "debug")]
pub fn full_check(
    packages: &[Package],
    dotfiles: &Path,
    home: &Path,
    ledger: &Ledger,
) -> DriftSummary {
    let mut summary = DriftSummary::default();
    for package in packages {
        let stored = ledger.get_count(&package.name);
        if let Some(result) = analyze_package(package, dotfiles, home, stored) {
            summary.push(result);
        }
    }

    push_removed_packages(&mut summary, packages, ledger);
    summary
}

/// Same as [`full_check`], but analyzes packages concurrently.
///
/// Each package is analyzed on the blocking thread pool. Results are merged
/// back in declaration order, so the summary is identical to the one that
/// [`full_check`] would produce.
///
/// # Errors
///
/// - Return [`DriftError::Join`] if an analysis task panicked.
#[instrument(skip_all, level = "debug")]
pub async fn full_check_concurrent(
    packages: &[Package],
    dotfiles: &Path,
    home: &Path,
    ledger: &Ledger,
) -> Result<DriftSummary> {
    let tasks = packages.iter().map(|package| {
        let package = package.clone();
        let dotfiles = dotfiles.to_path_buf();
        let home = home.to_path_buf();
        let stored = ledger.get_count(&package.name);
        tokio::task::spawn_blocking(move || analyze_package(&package, &dotfiles, &home, stored))
    });

    let mut summary = DriftSummary::default();
    for outcome in join_all(tasks).await {
        if let Some(result) = outcome? {
            summary.push(result);
        }
    }

    push_removed_packages(&mut summary, packages, ledger);
    Ok(summary)
}

/// Find symlinks in home that point at vanished files of a package.
///
/// Only directories that still exist in the package are looked at. Returned
/// paths are relative to home, sorted.
pub fn find_orphans(source_root: &Path, home: &Path) -> Vec<PathBuf> {
    let source_root = clean_path(source_root);
    let mut orphans = Vec::new();

    for rel_dir in walk_dirs(&source_root) {
        let home_dir = home.join(&rel_dir);

        // INVARIANT: Folded directory lists the package's own entries, none
        // of which can be an orphan.
        if matches!(same_file(&home_dir, &source_root.join(&rel_dir)), Ok(true)) {
            debug!("skip folded directory {:?}", home_dir.display());
            continue;
        }

        let entries = match fs::read_dir(&home_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                warn!("cannot scan {:?} for orphans: {err}", home_dir.display());
                continue;
            }
        };

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let is_symlink = entry
                .file_type()
                .map(|kind| kind.is_symlink())
                .unwrap_or(false);
            if !is_symlink {
                continue;
            }

            let link = entry.path();
            let destination = match resolve_symlink(&link) {
                Ok(destination) => destination,
                Err(err) => {
                    warn!("{err}");
                    continue;
                }
            };

            if !destination.starts_with(&source_root) {
                continue;
            }

            // INVARIANT: Orphan only if destination itself is gone, even if it
            // is a symlink that dangles.
            if let Err(err) = fs::symlink_metadata(&destination) {
                if err.kind() == io::ErrorKind::NotFound {
                    debug!("orphan {:?} -> {:?}", link.display(), destination.display());
                    found.push(rel_dir.join(entry.file_name()));
                }
            }
        }

        found.sort();
        orphans.extend(found);
    }

    orphans
}

fn analyze_package(
    package: &Package,
    dotfiles: &Path,
    home: &Path,
    stored: Option<usize>,
) -> Option<DriftResult> {
    let source_root = dotfiles.join(&package.source);
    if !source_root.is_dir() {
        debug!("skip package {:?}, no source directory", package.name);
        return None;
    }

    let mut result = DriftResult::new(package);
    let files = walk_files(&source_root);
    result.current_file_count = files.len();
    result.stored_file_count = stored.unwrap_or(0);

    let mut unclassified = 0;
    for rel_path in files {
        let state = match check_link(&source_root.join(&rel_path), &home.join(&rel_path)) {
            Ok(state) => state,
            Err(err) => {
                warn!("{err}");
                unclassified += 1;
                continue;
            }
        };

        match state.classification() {
            FileClassification::New => result.new_files.push(rel_path),
            FileClassification::Conflict => result.conflict_files.push(rel_path),
            _ => {}
        }
    }

    result.missing_files = find_orphans(&source_root, home);
    result.has_drift = unclassified > 0
        || !result.new_files.is_empty()
        || !result.missing_files.is_empty()
        || !result.conflict_files.is_empty();

    Some(result)
}

fn push_removed_packages(summary: &mut DriftSummary, packages: &[Package], ledger: &Ledger) {
    for entry in ledger.list_packages() {
        if !packages.iter().any(|package| package.name == entry.name) {
            debug!("package {:?} was removed from configuration", entry.name);
            summary.push_removed(entry.name.clone());
        }
    }
}

/// Drift analysis error types.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    /// Concurrent analysis task failed to complete.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
type Result<T, E = DriftError> = std::result::Result<T, E>;
