// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile symlink drift detection and reconciliation.
//!
//! Oxistow keeps a home directory in sync with a tree of dotfile
//! __packages__. Each package is a directory whose files get symlinked into
//! the home directory at the same relative path. The actual linking is done
//! by GNU Stow. Oxistow's job is everything around it: figuring out what
//! drifted, refusing to clobber files the user did not hand over, and
//! cleaning up after packages and files that went away.
//!
//! # Layout
//!
//! - [`link`]: the one link check everything else agrees on.
//! - [`inspect`]: per package link status.
//! - [`drift`]: quick and full drift analysis.
//! - [`conflict`]: conflict detection and resolution.
//! - [`sync`]: reconciliation driving the [`executor`] and the [`ledger`].

pub mod config;
pub mod conflict;
pub mod drift;
pub mod executor;
pub mod inspect;
pub mod ledger;
pub mod link;
pub mod model;
pub mod path;
pub mod sync;

pub use config::DotfilesConfig;
pub use conflict::{detect_conflicts, ConflictResolution, ConflictResolver};
pub use drift::{full_check, full_check_concurrent, quick_check};
pub use executor::{LinkExecutor, LinkOptions, StowExecutor};
pub use inspect::inspect;
pub use ledger::Ledger;
pub use model::{
    ConfigLinkStatus, ConflictFile, DriftResult, DriftSummary, FileClassification, FileStatus,
    Package,
};
pub use sync::{Reconciler, SyncError, SyncResult};
