// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per package link status.

use crate::{
    link::{check_link, walk_files},
    model::{ConfigLinkStatus, FileStatus, Package},
};

use std::path::Path;
use tracing::{debug, instrument, warn};

/// Report link status of every file in package.
///
/// A package whose source directory does not exist yields an empty status
/// rather than an error. Files that cannot be inspected are reported as not
/// linked, with the reason recorded as their issue.
#[instrument(skip(package, dotfiles, home), fields(package = %package.name), level = "debug")]
pub fn inspect(package: &Package, dotfiles: &Path, home: &Path) -> ConfigLinkStatus {
    let mut status = ConfigLinkStatus {
        package_name: package.name.clone(),
        source_path: package.source.clone(),
        ..Default::default()
    };

    let source_root = dotfiles.join(&package.source);
    if !source_root.is_dir() {
        debug!("package source {:?} does not exist", source_root.display());
        return status;
    }

    for rel_path in walk_files(&source_root) {
        let file = match check_link(&source_root.join(&rel_path), &home.join(&rel_path)) {
            Ok(state) => FileStatus {
                is_linked: state.classification().is_linked(),
                issue: state.issue().to_string(),
                rel_path,
            },
            Err(err) => {
                warn!("{err}");
                FileStatus {
                    rel_path,
                    is_linked: false,
                    issue: err.to_string(),
                }
            }
        };

        status.total_count += 1;
        if file.is_linked {
            status.linked_count += 1;
        }
        status.files.push(file);
    }

    status
}
