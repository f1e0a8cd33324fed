// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout for the configuration file that Oxistow uses to declare
//! which packages should be linked, and where. File I/O is left to the caller
//! to figure out.
//!
//! Package names and source paths are trusted as given. Checking them for
//! traversal or unsafe characters is up to whoever writes the configuration.

use crate::model::Package;

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Dotfiles configuration layout.
///
/// # General Layout
///
/// A configuration is composed of two basic parts: settings and packages.
/// The settings section says where the dotfiles live and where they get
/// linked to. The package section lists every package that should be linked,
/// each with a source directory relative to the dotfiles root.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DotfilesConfig {
    /// General settings.
    pub settings: Settings,

    /// Declared packages.
    #[serde(rename = "package", default)]
    pub packages: Vec<Package>,
}

impl DotfilesConfig {
    /// Find declared package by name.
    pub fn find_package(&self, name: impl AsRef<str>) -> Option<&Package> {
        self.packages
            .iter()
            .find(|package| package.name == name.as_ref())
    }
}

impl FromStr for DotfilesConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: DotfilesConfig =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path setting.
        config.settings.dotfiles = expand(&config.settings.dotfiles)?;
        config.settings.target = match config.settings.target {
            Some(target) => Some(expand(&target)?),
            None => None,
        };

        Ok(config)
    }
}

impl Display for DotfilesConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// General configuration settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Root directory holding every package.
    pub dotfiles: PathBuf,

    /// Directory to link packages into. Defaults to home directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
