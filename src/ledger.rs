// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted state ledger.
//!
//! Oxistow remembers what it managed on the last run in a small TOML document
//! called the __ledger__. It holds two things: the list of packages that were
//! declared, and the number of files each package had. The first lets us spot
//! packages that vanished from the configuration, so their symlinks can be
//! cleaned up. The second lets a quick drift check compare file counts
//! without walking anybody's home directory.
//!
//! # Ledger Layout
//!
//! ```toml
//! [[package]]
//! name = "shell"
//! source = "shell"
//!
//! [counts]
//! shell = 4
//! ```
//!
//! # Concurrency
//!
//! The ledger is loaded once, mutated in memory, and saved once per run. No
//! lock is taken. Running two instances of Oxistow against the same ledger
//! at once can lose updates.

use crate::model::Package;

use mkdirp::mkdirp;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, rename, write},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

/// Record of previously managed packages and their file counts.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    path: PathBuf,
    state: LedgerState,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
struct LedgerState {
    #[serde(rename = "package", default)]
    packages: Vec<Package>,

    #[serde(default)]
    counts: BTreeMap<String, usize>,
}

impl Ledger {
    /// Construct new empty ledger bound to path.
    ///
    /// Nothing is written until [`Ledger::save`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: LedgerState::default(),
        }
    }

    /// Load existing ledger.
    ///
    /// # Errors
    ///
    /// - Return [`LedgerError::Read`] if ledger exists but cannot be read.
    /// - Return [`LedgerError::Deserialize`] if ledger content is invalid.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl Into<PathBuf>) -> Result<Option<Self>> {
        let path = path.into();
        let content = match read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no ledger at {:?}", path.display());
                return Ok(None);
            }
            Err(err) => return Err(LedgerError::Read { source: err, path }),
        };

        let state = toml::de::from_str(&content).map_err(|err| LedgerError::Deserialize {
            source: err,
            path: path.clone(),
        })?;

        Ok(Some(Self { path, state }))
    }

    /// Load existing ledger, or start an empty one at path.
    ///
    /// # Errors
    ///
    /// - Return [`LedgerError::Read`] if ledger exists but cannot be read.
    /// - Return [`LedgerError::Deserialize`] if ledger content is invalid.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        Ok(Self::load(&path)?.unwrap_or_else(|| Self::new(path)))
    }

    /// Path ledger is saved to.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Get stored file count of package.
    pub fn get_count(&self, name: impl AsRef<str>) -> Option<usize> {
        self.state.counts.get(name.as_ref()).copied()
    }

    /// Set stored file count of package.
    pub fn set_count(&mut self, name: impl Into<String>, count: usize) {
        self.state.counts.insert(name.into(), count);
    }

    /// Forget stored file count of package.
    pub fn remove_count(&mut self, name: impl AsRef<str>) {
        self.state.counts.remove(name.as_ref());
    }

    /// List previously managed packages.
    pub fn list_packages(&self) -> &[Package] {
        self.state.packages.as_slice()
    }

    /// Record package as managed.
    ///
    /// Replaces the source of an already recorded package with the same name.
    pub fn add_package(&mut self, name: impl Into<String>, source: impl Into<PathBuf>) {
        let package = Package::new(name, source);
        match self
            .state
            .packages
            .iter_mut()
            .find(|entry| entry.name == package.name)
        {
            Some(entry) => entry.source = package.source,
            None => self.state.packages.push(package),
        }
    }

    /// Forget managed package.
    pub fn remove_package(&mut self, name: impl AsRef<str>) {
        self.state
            .packages
            .retain(|entry| entry.name != name.as_ref());
    }

    /// Persist ledger.
    ///
    /// Creates parent directories as needed. Content is first written to a
    /// temporary sibling file and then renamed over the ledger, so a crash
    /// never leaves a half written ledger behind.
    ///
    /// # Errors
    ///
    /// - Return [`LedgerError::Serialize`] if ledger cannot be serialized.
    /// - Return [`LedgerError::Write`] if ledger cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn save(&self) -> Result<()> {
        let content =
            toml::ser::to_string_pretty(&self.state).map_err(|err| LedgerError::Serialize {
                source: err,
                path: self.path.clone(),
            })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            mkdirp(parent).map_err(|err| self.write_error(err))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger".into());
        let temp_path = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

        write(&temp_path, content.as_bytes()).map_err(|err| self.write_error(err))?;
        rename(&temp_path, &self.path).map_err(|err| self.write_error(err))?;
        debug!("saved ledger to {:?}", self.path.display());

        Ok(())
    }

    fn write_error(&self, source: io::Error) -> LedgerError {
        LedgerError::Write {
            source,
            path: self.path.clone(),
        }
    }
}

/// Ledger error types.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Ledger cannot be read from.
    #[error("failed to read ledger at {:?}", path.display())]
    Read {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Ledger cannot be written to.
    #[error("failed to write ledger at {:?}", path.display())]
    Write {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Ledger content is not valid.
    #[error("failed to parse ledger at {:?}", path.display())]
    Deserialize {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    /// Ledger cannot be serialized.
    #[error("failed to serialize ledger for {:?}", path.display())]
    Serialize {
        #[source]
        source: toml::ser::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
