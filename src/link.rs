// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink inspection primitives.
//!
//! Every package file has a __target__, i.e., the same relative path under the
//! home directory. Deciding whether a target already provides its source file
//! is the one question that the inspector, the drift analyzer, and the
//! conflict detector all need answered the same way. So they all go through
//! [`check_link`].
//!
//! # Directory Folding
//!
//! The link executor may symlink a whole directory instead of each file
//! inside of it. When that happens, the target of a file is not a symlink
//! we created, but the package's own entry reached through a symlinked
//! ancestor. We detect this through entry identity (device and inode of the
//! entry itself, without following it), not through path comparison. This
//! holds even when the package entry is itself a symlink. Mistaking a fold
//! for a conflict would make a correctly linked package look like it would
//! destroy user data, and resolving that conflict would destroy the package.
//!
//! # Ignored Files
//!
//! GNU Stow never links some files, e.g., version control metadata and top
//! level READMEs. Package walks skip the same files, so they never show up
//! as drift that no sync can fix. Only Stow's built-in list is honored.
//! Per package `.stow-local-ignore` and global ignore files are not read.

use crate::model::FileClassification;

use ignore::{
    gitignore::{Gitignore, GitignoreBuilder},
    WalkBuilder,
};
use std::{
    fs,
    io,
    path::{Component, Path, PathBuf},
};
use tracing::warn;

/// Files GNU Stow skips unless a package brings its own ignore list.
const STOW_DEFAULT_IGNORE: &[&str] = &[
    "RCS",
    "*,v",
    "CVS",
    ".#*",
    ".cvsignore",
    ".svn",
    "_darcs",
    ".hg",
    ".git",
    ".gitignore",
    ".gitmodules",
    "*~",
    "\\#*#",
    "/README*",
    "/LICENSE*",
    "/COPYING",
];

/// Detailed outcome of checking one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    /// Target is a symlink to the source.
    Linked,

    /// Target is the source through a folded ancestor directory.
    Folded,

    /// Nothing at the target.
    Missing,

    /// A real file or directory sits at the target.
    Occupied,

    /// Target is a symlink to something other than the source.
    Elsewhere(PathBuf),

    /// An ancestor of the target is not a directory, so nothing can be
    /// linked below it.
    Blocked(PathBuf),
}

impl LinkState {
    /// Collapse into a drift classification.
    pub fn classification(&self) -> FileClassification {
        match self {
            Self::Linked => FileClassification::Linked,
            Self::Folded => FileClassification::LinkedViaFold,
            Self::Missing => FileClassification::New,
            Self::Occupied | Self::Elsewhere(_) | Self::Blocked(_) => {
                FileClassification::Conflict
            }
        }
    }

    /// Human readable issue, empty if linked.
    pub fn issue(&self) -> &'static str {
        match self {
            Self::Linked | Self::Folded => "",
            Self::Missing => "not linked",
            Self::Occupied => "file exists (conflict)",
            Self::Elsewhere(_) => "points elsewhere",
            Self::Blocked(_) => "parent is not a directory",
        }
    }
}

/// Check whether target provides source.
///
/// 1. Nothing at target means [`LinkState::Missing`].
/// 2. A non-directory ancestor in the way means [`LinkState::Blocked`].
/// 3. Target being the very same entry as source means [`LinkState::Folded`].
/// 4. Any other non-symlink at target is [`LinkState::Occupied`].
/// 5. A symlink at target is resolved against its own parent directory, and
///    must land exactly on source to be [`LinkState::Linked`].
///
/// # Errors
///
/// - Return [`LinkError::Stat`] if target or source cannot be inspected.
/// - Return [`LinkError::ReadLink`] if symlink at target cannot be read.
pub fn check_link(source: &Path, target: &Path) -> Result<LinkState> {
    let metadata = match fs::symlink_metadata(target) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(LinkState::Missing),
        Err(err) => {
            return match blocking_ancestor(target) {
                Some(ancestor) => Ok(LinkState::Blocked(ancestor)),
                None => Err(LinkError::stat(target, err)),
            }
        }
    };

    if same_entry(source, target)? {
        return Ok(LinkState::Folded);
    }

    if !metadata.file_type().is_symlink() {
        return Ok(LinkState::Occupied);
    }

    let destination = resolve_symlink(target)?;
    if destination == clean_path(source) {
        Ok(LinkState::Linked)
    } else {
        Ok(LinkState::Elsewhere(destination))
    }
}

// Nearest existing ancestor, if it is something other than a directory.
fn blocking_ancestor(target: &Path) -> Option<PathBuf> {
    for ancestor in target.ancestors().skip(1) {
        match fs::metadata(ancestor) {
            Ok(metadata) if metadata.is_dir() => return None,
            Ok(_) => return Some(ancestor.to_path_buf()),
            Err(_) => continue,
        }
    }

    None
}

/// Resolve where a symlink points.
///
/// Relative link targets are resolved against the directory holding the
/// symlink, never against the current working directory. The result is
/// lexically cleaned, but not canonicalized, so it may not exist.
///
/// # Errors
///
/// - Return [`LinkError::ReadLink`] if link cannot be read.
pub fn resolve_symlink(link: &Path) -> Result<PathBuf> {
    let destination = fs::read_link(link).map_err(|err| LinkError::ReadLink {
        source: err,
        path: link.to_path_buf(),
    })?;

    if destination.is_absolute() {
        return Ok(clean_path(&destination));
    }

    let parent = link.parent().unwrap_or_else(|| Path::new(""));
    Ok(clean_path(&parent.join(destination)))
}

/// Lexically normalize a path.
///
/// Drops `.` components and folds `..` into the preceding component. Leading
/// `..` of a relative path are kept, and `..` at the root stays at the root.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match cleaned.components().next_back() {
                Some(Component::Normal(_)) => {
                    cleaned.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => cleaned.push(".."),
            },
            other => cleaned.push(other.as_os_str()),
        }
    }

    if cleaned.as_os_str().is_empty() {
        cleaned.push(".");
    }

    cleaned
}

/// Check if two paths refer to the same underlying file.
///
/// Follows symlinks on both sides, then compares device and inode.
///
/// # Errors
///
/// - Return [`LinkError::Stat`] if either path cannot be inspected.
#[cfg(unix)]
pub fn same_file(lhs: &Path, rhs: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let lhs_meta = fs::metadata(lhs).map_err(|err| LinkError::stat(lhs, err))?;
    let rhs_meta = fs::metadata(rhs).map_err(|err| LinkError::stat(rhs, err))?;

    Ok(lhs_meta.dev() == rhs_meta.dev() && lhs_meta.ino() == rhs_meta.ino())
}

/// Check if two paths refer to the same underlying file.
///
/// Without inode semantics we compare canonical paths instead. This is
/// weaker than true identity, e.g., hard links compare as different files.
///
/// # Errors
///
/// - Return [`LinkError::Stat`] if either path cannot be canonicalized.
#[cfg(not(unix))]
pub fn same_file(lhs: &Path, rhs: &Path) -> Result<bool> {
    let lhs_real = fs::canonicalize(lhs).map_err(|err| LinkError::stat(lhs, err))?;
    let rhs_real = fs::canonicalize(rhs).map_err(|err| LinkError::stat(rhs, err))?;

    Ok(lhs_real == rhs_real)
}

/// Check if two paths name the same directory entry.
///
/// Unlike [`same_file`], symlinks are not followed, so a symlink only ever
/// matches itself.
///
/// # Errors
///
/// - Return [`LinkError::Stat`] if either path cannot be inspected.
#[cfg(unix)]
pub fn same_entry(lhs: &Path, rhs: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let lhs_meta = fs::symlink_metadata(lhs).map_err(|err| LinkError::stat(lhs, err))?;
    let rhs_meta = fs::symlink_metadata(rhs).map_err(|err| LinkError::stat(rhs, err))?;

    Ok(lhs_meta.dev() == rhs_meta.dev() && lhs_meta.ino() == rhs_meta.ino())
}

/// Check if two paths name the same directory entry.
///
/// Compares canonical parent directories plus file names.
///
/// # Errors
///
/// - Return [`LinkError::Stat`] if either parent cannot be canonicalized.
#[cfg(not(unix))]
pub fn same_entry(lhs: &Path, rhs: &Path) -> Result<bool> {
    fn real_entry(path: &Path) -> Result<PathBuf> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let real = fs::canonicalize(parent).map_err(|err| LinkError::stat(path, err))?;
        Ok(match path.file_name() {
            Some(name) => real.join(name),
            None => real,
        })
    }

    Ok(real_entry(lhs)? == real_entry(rhs)?)
}

/// List every non-directory entry under root, relative to root.
///
/// Symlinks are listed but never followed. Hidden files get no special
/// treatment, but whatever GNU Stow would ignore is skipped. Unreadable
/// entries are logged and skipped. Output is sorted by path.
pub fn walk_files(root: &Path) -> Vec<PathBuf> {
    walk(root, |is_dir| !is_dir)
}

/// List every directory under root, relative to root, including root itself
/// as the empty path.
pub fn walk_dirs(root: &Path) -> Vec<PathBuf> {
    walk(root, |is_dir| is_dir)
}

/// Count non-directory entries under root.
pub fn count_files(root: &Path) -> usize {
    walk_files(root).len()
}

fn walk(root: &Path, keep: impl Fn(bool) -> bool) -> Vec<PathBuf> {
    let matcher = stow_ignore(root);
    let mut paths = Vec::new();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
            !matcher.matched(entry.path(), is_dir).is_ignore()
        })
        .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
        .build();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("skip unreadable entry under {:?}: {err}", root.display());
                continue;
            }
        };

        let is_dir = entry.file_type().is_some_and(|kind| kind.is_dir());
        if !keep(is_dir) {
            continue;
        }

        // INVARIANT: Walker only yields paths beneath root.
        if let Ok(relative) = entry.path().strip_prefix(root) {
            paths.push(relative.to_path_buf());
        }
    }

    paths
}

fn stow_ignore(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    for pattern in STOW_DEFAULT_IGNORE {
        if let Err(err) = builder.add_line(None, pattern) {
            warn!("bad ignore pattern {pattern:?}: {err}");
        }
    }

    builder.build().unwrap_or_else(|err| {
        warn!("cannot build ignore list for {:?}: {err}", root.display());
        Gitignore::empty()
    })
}

/// Link inspection error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Path cannot be inspected.
    #[error("cannot stat {:?}: {source}", path.display())]
    Stat {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Symlink cannot be read.
    #[error("cannot read link {:?}: {source}", path.display())]
    ReadLink {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl LinkError {
    fn stat(path: &Path, source: io::Error) -> Self {
        Self::Stat {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;
