// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link execution.
//!
//! Oxistow never builds symlink farms on its own. The mechanical work of
//! creating and removing symlinks is handed to a [`LinkExecutor`], which by
//! default is GNU Stow running as a subprocess. Everything else in the crate
//! only needs to know three verbs: link, unlink, and relink.
//!
//! # See Also
//!
//! - [GNU Stow manual](https://www.gnu.org/software/stow/manual/stow.html)

use crate::model::Package;

use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, info, instrument};

/// Options shared by every link operation.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Report what would happen without touching the file system.
    pub dry_run: bool,

    /// Take ownership of pre-existing files instead of failing.
    pub force: bool,
}

/// Perform link operations for a package.
///
/// Implementations must treat relink as idempotent, i.e., relinking an
/// already linked package is a no-op as far as the file system is concerned.
pub trait LinkExecutor {
    /// Link every file of package into target directory.
    fn link(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()>;

    /// Remove every symlink of package from target directory.
    fn unlink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()>;

    /// Remove then link package again, picking up added or removed files.
    fn relink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()>;
}

impl<E> LinkExecutor for &E
where
    E: LinkExecutor + ?Sized,
{
    fn link(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        (**self).link(dotfiles, package, options)
    }

    fn unlink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        (**self).unlink(dotfiles, package, options)
    }

    fn relink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        (**self).relink(dotfiles, package, options)
    }
}

/// Link executor backed by GNU Stow.
///
/// Stow wants a stow directory and a package directory name inside of it. So
/// a package whose source is `editors/nvim` is run as package `nvim` with
/// stow directory `<dotfiles>/editors`. Stow is allowed to fold directories.
#[derive(Debug, Clone)]
pub struct StowExecutor {
    program: OsString,
    target: PathBuf,
}

impl StowExecutor {
    /// Construct new stow executor linking into target directory.
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            program: "stow".into(),
            target: target.into(),
        }
    }

    /// Use a different stow binary.
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn expand_bin_args(
        &self,
        dotfiles: &Path,
        package: &Package,
        action: &str,
        options: LinkOptions,
    ) -> Result<Vec<OsString>> {
        let source = dotfiles.join(&package.source);
        let stow_dir = source.parent().unwrap_or(dotfiles);
        let package_dir = source
            .file_name()
            .ok_or_else(|| ExecutorError::BadSource(package.source.clone()))?;

        let mut bin_args: Vec<OsString> = vec![
            "--dir".into(),
            stow_dir.as_os_str().into(),
            "--target".into(),
            self.target.as_os_str().into(),
        ];

        if options.dry_run {
            bin_args.push("--no".into());
        }

        if options.force {
            bin_args.push("--adopt".into());
        }

        bin_args.push(action.into());
        bin_args.push(package_dir.into());

        Ok(bin_args)
    }

    fn stow(
        &self,
        dotfiles: &Path,
        package: &Package,
        action: &str,
        options: LinkOptions,
    ) -> Result<()> {
        let args = self.expand_bin_args(dotfiles, package, action, options)?;
        debug!("run {:?} with {args:?}", self.program);
        match syscall_non_interactive(&self.program, args) {
            Ok(output) => {
                if !output.is_empty() {
                    info!("{output}");
                }
                Ok(())
            }
            Err(SyscallError::Spawn(err)) => Err(ExecutorError::Syscall(err)),
            Err(SyscallError::Status(message)) => Err(ExecutorError::Failed {
                package: package.name.clone(),
                message,
            }),
        }
    }
}

impl LinkExecutor for StowExecutor {
    #[instrument(skip(self, dotfiles, package), fields(package = %package.name), level = "debug")]
    fn link(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        self.stow(dotfiles, package, "--stow", options)
    }

    #[instrument(skip(self, dotfiles, package), fields(package = %package.name), level = "debug")]
    fn unlink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        self.stow(dotfiles, package, "--delete", options)
    }

    #[instrument(skip(self, dotfiles, package), fields(package = %package.name), level = "debug")]
    fn relink(&self, dotfiles: &Path, package: &Package, options: LinkOptions) -> Result<()> {
        self.stow(dotfiles, package, "--restow", options)
    }
}

enum SyscallError {
    Spawn(std::io::Error),
    Status(String),
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String, SyscallError> {
    let output = Command::new(cmd.as_ref())
        .args(args)
        .output()
        .map_err(SyscallError::Spawn)?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(SyscallError::Status(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        )));
    }

    Ok(message)
}

/// Link execution error types.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// Link program could not be run at all.
    #[error(transparent)]
    Syscall(#[from] std::io::Error),

    /// Link program ran but reported failure.
    #[error("failed to link package {package:?}: {message}")]
    Failed { package: String, message: String },

    /// Package source has no directory name to hand to the link program.
    #[error("package source {:?} does not name a directory", .0.display())]
    BadSource(PathBuf),
}

/// Friendly result alias :3
pub type Result<T, E = ExecutorError> = std::result::Result<T, E>;
