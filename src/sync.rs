// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Reconciliation of declared packages with the home directory.
//!
//! A sync converges the home directory toward the declared packages, and
//! records the result in the ledger. It always runs in the same order:
//!
//! 1. Resolve conflicts (interactive only). Cancelling here leaves the file
//!    system untouched.
//! 2. Relink every declared package through the link executor.
//! 3. Run a full drift check against the ledger from the _previous_ run.
//! 4. Unlink packages that were removed from the configuration.
//! 5. Remove orphaned symlinks of declared packages.
//! 6. Recompute file counts and save the ledger.
//!
//! Cleanup happens after relinking so the drift check sees what was just
//! linked. Nothing is rolled back on failure. Running sync again is how a
//! partially applied sync is finished.

use crate::{
    conflict::{detect_conflicts, resolve_conflicts, ConflictResolution, ConflictResolver},
    drift::{find_orphans, full_check},
    executor::{ExecutorError, LinkExecutor, LinkOptions},
    ledger::Ledger,
    link::count_files,
    model::Package,
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Callback receiving `(current, total, message)` at coarse milestones.
pub type ProgressSink = Box<dyn FnMut(usize, usize, &str)>;

/// Outcome of syncing every declared package.
#[derive(Default, Debug)]
pub struct SyncResult {
    /// Packages relinked successfully.
    pub synced: Vec<String>,

    /// Packages the link executor failed on.
    pub failed: Vec<SyncFailure>,

    /// Packages without a source directory.
    pub skipped: Vec<String>,

    /// Removed packages that were unlinked and dropped from the ledger.
    pub removed: Vec<String>,

    /// Orphaned symlinks deleted, relative to home.
    pub orphans_removed: Vec<PathBuf>,

    /// Conflicts backed up or deleted before linking.
    pub conflicts_resolved: usize,
}

impl SyncResult {
    /// Check if no package failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Link executor failure for one package.
#[derive(Debug)]
pub struct SyncFailure {
    pub package: String,
    pub error: ExecutorError,
}

/// Drive declared packages and home directory into agreement.
pub struct Reconciler<E>
where
    E: LinkExecutor,
{
    executor: E,
    dotfiles: PathBuf,
    home: PathBuf,
    options: LinkOptions,
    resolver: Option<Box<dyn ConflictResolver>>,
    progress: Option<ProgressSink>,
}

impl<E> Reconciler<E>
where
    E: LinkExecutor,
{
    /// Construct new reconciler linking packages from dotfiles into home.
    pub fn new(executor: E, dotfiles: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            dotfiles: dotfiles.into(),
            home: home.into(),
            options: LinkOptions::default(),
            resolver: None,
            progress: None,
        }
    }

    /// Options handed to every link executor call.
    ///
    /// With `dry_run` set, conflicts are not resolved, nothing is cleaned
    /// up, and the ledger is not saved.
    pub fn with_options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolver consulted by interactive syncs.
    pub fn with_resolver(mut self, resolver: impl ConflictResolver + 'static) -> Self {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Progress callback.
    pub fn with_progress(mut self, sink: impl FnMut(usize, usize, &str) + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    pub fn dotfiles(&self) -> &Path {
        self.dotfiles.as_path()
    }

    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    /// Sync every declared package.
    ///
    /// Per package link failures are collected into the result and do not
    /// stop the remaining packages.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Cancelled`] if the resolver cancelled.
    /// - Return [`SyncError::Unresolved`] if conflicts exist in an
    ///   interactive sync, but no resolver was given.
    /// - Return [`SyncError::Conflict`] if any conflict cannot be resolved.
    /// - Return [`SyncError::Ledger`] if ledger cannot be saved.
    #[instrument(skip(self, packages, ledger), level = "debug")]
    pub fn sync_all(
        &mut self,
        packages: &[Package],
        ledger: &mut Ledger,
        interactive: bool,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::default();

        if interactive {
            result.conflicts_resolved = self.settle_conflicts(packages)?;
        }

        let total = packages.len();
        for (index, package) in packages.iter().enumerate() {
            self.report(index, total, &format!("linking {}", package.name));
            if !self.dotfiles.join(&package.source).is_dir() {
                warn!("skip package {:?}, source directory missing", package.name);
                result.skipped.push(package.name.clone());
                continue;
            }

            info!("relink package {:?}", package.name);
            match self.executor.relink(&self.dotfiles, package, self.options) {
                Ok(()) => result.synced.push(package.name.clone()),
                Err(error) => {
                    warn!("failed to link package {:?}: {error}", package.name);
                    result.failed.push(SyncFailure {
                        package: package.name.clone(),
                        error,
                    });
                }
            }
        }
        self.report(total, total, "linked packages");

        if self.options.dry_run {
            debug!("dry run, skip cleanup and ledger update");
            return Ok(result);
        }

        let summary = full_check(packages, &self.dotfiles, &self.home, ledger);

        self.report(total, total, "cleaning up removed packages");
        for name in &summary.removed_packages {
            // INVARIANT: Unlink through ledger entry, declaration is gone.
            let Some(entry) = ledger
                .list_packages()
                .iter()
                .find(|entry| &entry.name == name)
                .cloned()
            else {
                continue;
            };

            info!("unlink removed package {:?}", entry.name);
            match self.executor.unlink(&self.dotfiles, &entry, self.options) {
                Ok(()) => {
                    ledger.remove_package(&entry.name);
                    ledger.remove_count(&entry.name);
                    result.removed.push(entry.name);
                }
                Err(error) => {
                    warn!("failed to unlink removed package {:?}: {error}", entry.name);
                    result.failed.push(SyncFailure {
                        package: entry.name,
                        error,
                    });
                }
            }
        }

        self.report(total, total, "removing orphaned symlinks");
        for drift in &summary.results {
            result
                .orphans_removed
                .extend(remove_orphans(&self.home, &drift.missing_files));
        }

        self.report(total, total, "saving ledger");
        self.persist(packages, ledger)?;

        Ok(result)
    }

    /// Sync one declared package by name.
    ///
    /// Does not resolve conflicts and does not clean up removed packages.
    /// File counts of every declared package are still recomputed, since the
    /// ledger is saved as a whole.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::PackageNotFound`] if no package has that name.
    /// - Return [`SyncError::Executor`] if package cannot be linked.
    /// - Return [`SyncError::Ledger`] if ledger cannot be saved.
    #[instrument(skip(self, packages, ledger), level = "debug")]
    pub fn sync_one(&mut self, name: &str, packages: &[Package], ledger: &mut Ledger) -> Result<()> {
        let package = packages
            .iter()
            .find(|package| package.name == name)
            .cloned()
            .ok_or_else(|| SyncError::PackageNotFound(name.to_string()))?;

        self.report(0, 1, &format!("linking {}", package.name));
        let source_root = self.dotfiles.join(&package.source);
        if source_root.is_dir() {
            info!("relink package {:?}", package.name);
            self.executor
                .relink(&self.dotfiles, &package, self.options)?;
        } else {
            warn!("skip package {:?}, source directory missing", package.name);
        }

        if self.options.dry_run {
            debug!("dry run, skip cleanup and ledger update");
            return Ok(());
        }

        self.report(1, 1, "removing orphaned symlinks");
        if source_root.is_dir() {
            let orphans = find_orphans(&source_root, &self.home);
            remove_orphans(&self.home, &orphans);
        }

        self.report(1, 1, "saving ledger");
        self.persist(packages, ledger)
    }

    fn settle_conflicts(&mut self, packages: &[Package]) -> Result<usize> {
        let conflicts = detect_conflicts(packages, &self.dotfiles, &self.home);
        if conflicts.is_empty() {
            return Ok(0);
        }

        info!("found {} conflicting file(s)", conflicts.len());
        let resolver = self
            .resolver
            .as_mut()
            .ok_or(SyncError::Unresolved(conflicts.len()))?;

        let resolution = resolver.resolve(&conflicts);
        if resolution == ConflictResolution::Cancel {
            info!("sync cancelled");
            return Err(SyncError::Cancelled);
        }

        if self.options.dry_run {
            debug!("dry run, leave {} conflict(s) in place", conflicts.len());
            return Ok(0);
        }

        resolve_conflicts(&conflicts, resolution)?;
        Ok(conflicts.len())
    }

    fn persist(&self, packages: &[Package], ledger: &mut Ledger) -> Result<()> {
        for package in packages {
            let source_root = self.dotfiles.join(&package.source);
            let count = if source_root.is_dir() {
                count_files(&source_root)
            } else {
                0
            };

            ledger.add_package(package.name.clone(), package.source.clone());
            ledger.set_count(package.name.clone(), count);
        }

        info!("save ledger to {:?}", ledger.path().display());
        Ok(ledger.save()?)
    }

    fn report(&mut self, current: usize, total: usize, message: &str) {
        if let Some(sink) = self.progress.as_mut() {
            sink(current, total, message);
        }
    }
}

fn remove_orphans(home: &Path, orphans: &[PathBuf]) -> Vec<PathBuf> {
    let mut removed = Vec::new();
    for orphan in orphans {
        let link = home.join(orphan);
        info!("remove orphaned symlink {:?}", link.display());
        match fs::remove_file(&link) {
            Ok(()) => removed.push(orphan.clone()),
            Err(err) => warn!("failed to remove orphan {:?}: {err}", link.display()),
        }
    }

    removed
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Conflict resolution was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Conflicts exist but nobody can decide on them.
    #[error("{0} conflicting file(s) and no way to resolve them")]
    Unresolved(usize),

    /// Package is not declared.
    #[error("package {0:?} not found")]
    PackageNotFound(String),

    /// Conflict could not be resolved.
    #[error(transparent)]
    Conflict(#[from] crate::conflict::ConflictError),

    /// Link executor failed.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Ledger could not be persisted.
    #[error(transparent)]
    Ledger(#[from] crate::ledger::LedgerError),
}

/// Friendly result alias :3
pub type Result<T, E = SyncError> = std::result::Result<T, E>;
