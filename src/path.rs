// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Default locations.
//!
//! Oxistow reads one configuration file and keeps one ledger. Both live in
//! the usual XDG directories unless the command line says otherwise. The
//! link target defaults to the user's home directory.

use std::path::PathBuf;

/// Determine user's home directory, the default link target.
///
/// Existence is not checked.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to configuration file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/oxistow/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("oxistow").join("config.toml"))
        .ok_or(NoWayHome)
}

/// Determine default absolute path to state ledger.
///
/// Uses XDG Base Directory path `$XDG_DATA_HOME/oxistow/state.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_ledger_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|path| path.join("oxistow").join("state.toml"))
        .ok_or(NoWayHome)
}

/// Home, config, or data directory cannot be determined.
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
