// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Drift and link status data model.
//!
//! Everything in here is computed fresh from the live file system on each
//! invocation. Nothing is persisted except through the state ledger.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A named group of configuration files sharing one source directory.
///
/// The source path is relative to the dotfiles root. Package names are
/// expected to be unique within a run.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Package {
    /// Name of the package.
    pub name: String,

    /// Source directory relative to dotfiles root.
    pub source: PathBuf,
}

impl Package {
    /// Construct new package.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Classification of a single package file against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClassification {
    /// Target is a symlink that resolves to the source file.
    Linked,

    /// Target is the source file reached through a symlinked ancestor
    /// directory.
    LinkedViaFold,

    /// Nothing exists at the target yet.
    New,

    /// Something else occupies the target.
    Conflict,

    /// Symlink in home points into the package at a file that is gone.
    Orphan,
}

impl FileClassification {
    /// Target already provides the source file.
    ///
    /// Folded directories count as linked.
    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked | Self::LinkedViaFold)
    }
}

/// Drift report for one package.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DriftResult {
    pub package_name: String,
    pub source_path: PathBuf,
    pub current_file_count: usize,
    pub stored_file_count: usize,
    pub has_drift: bool,

    /// Files without anything at their target, relative to package root.
    pub new_files: Vec<PathBuf>,

    /// Orphaned symlinks, relative to home.
    pub missing_files: Vec<PathBuf>,

    /// Files whose target is occupied, relative to package root.
    pub conflict_files: Vec<PathBuf>,
}

impl DriftResult {
    pub(crate) fn new(package: &Package) -> Self {
        Self {
            package_name: package.name.clone(),
            source_path: package.source.clone(),
            ..Default::default()
        }
    }
}

/// Aggregated drift report over all declared packages.
///
/// # Invariant
///
/// - `drifted_packages` counts results with drift plus every removed package.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DriftSummary {
    pub total_packages: usize,
    pub drifted_packages: usize,
    pub total_new_files: usize,
    pub results: Vec<DriftResult>,

    /// Packages in the ledger that are no longer declared.
    pub removed_packages: Vec<String>,
}

impl DriftSummary {
    /// Check if anything at all drifted.
    pub fn has_drift(&self) -> bool {
        self.drifted_packages > 0
    }

    /// Total orphaned symlinks across all packages.
    pub fn total_missing_files(&self) -> usize {
        self.results.iter().map(|r| r.missing_files.len()).sum()
    }

    /// Total conflicting files across all packages.
    pub fn total_conflict_files(&self) -> usize {
        self.results.iter().map(|r| r.conflict_files.len()).sum()
    }

    pub(crate) fn push(&mut self, result: DriftResult) {
        self.total_packages += 1;
        self.total_new_files += result.new_files.len();
        if result.has_drift {
            self.drifted_packages += 1;
        }
        self.results.push(result);
    }

    pub(crate) fn push_removed(&mut self, name: impl Into<String>) {
        self.drifted_packages += 1;
        self.removed_packages.push(name.into());
    }
}

/// File that a blind link would destroy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictFile {
    pub package_name: String,

    /// Absolute path of the package file.
    pub source_path: PathBuf,

    /// Absolute path of the occupied target.
    pub target_path: PathBuf,

    /// Target is a real directory, so removal must be recursive.
    pub is_directory: bool,
}

/// Link state of one file of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub rel_path: PathBuf,
    pub is_linked: bool,

    /// Human readable reason, empty when linked.
    pub issue: String,
}

/// Link state of every file in a package.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ConfigLinkStatus {
    pub package_name: String,
    pub source_path: PathBuf,
    pub linked_count: usize,
    pub total_count: usize,
    pub files: Vec<FileStatus>,
}

impl ConfigLinkStatus {
    pub fn is_fully_linked(&self) -> bool {
        self.linked_count == self.total_count && self.total_count > 0
    }

    pub fn is_partially_linked(&self) -> bool {
        self.linked_count > 0 && self.linked_count < self.total_count
    }

    pub fn is_not_linked(&self) -> bool {
        self.linked_count == 0
    }
}
