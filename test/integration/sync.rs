// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{DotfilesFixture, FakeStow};

use anyhow::Result;
use oxistow::{
    full_check, link::LinkState, ConflictFile, ConflictResolution, Ledger, Package, Reconciler,
};
use pretty_assertions::assert_eq;
use std::{cell::Cell, fs, os::unix::fs::symlink, path::PathBuf, rc::Rc};

fn reconciler(fixture: &DotfilesFixture) -> Reconciler<FakeStow> {
    Reconciler::new(
        FakeStow::new(&fixture.home),
        &fixture.dotfiles,
        &fixture.home,
    )
}

#[test]
fn sync_converges_and_removes_orphans() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("pkg1", ".config/test.conf", "key = value")?;
    fixture.add_file("pkg1", ".bashrc", "export EDITOR=vi")?;
    let packages = vec![Package::new("pkg1", "pkg1")];

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;
    assert!(result.is_success());
    assert_eq!(result.synced, vec!["pkg1".to_string()]);

    assert_eq!(fixture.link_state("pkg1", ".config/test.conf")?, LinkState::Linked);
    assert_eq!(fixture.link_state("pkg1", ".bashrc")?, LinkState::Linked);
    let saved = Ledger::load(&fixture.ledger_path)?.expect("ledger saved");
    assert_eq!(saved.get_count("pkg1"), Some(2));

    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &saved);
    assert_eq!(summary.total_conflict_files(), 0);

    let orphan = fixture.add_home_symlink(
        ".config/old.conf",
        fixture.dotfiles.join("pkg1/.config/old.conf"),
    )?;

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;
    assert_eq!(result.orphans_removed, vec![PathBuf::from(".config/old.conf")]);
    assert!(fs::symlink_metadata(&orphan).is_err());
    assert_eq!(fixture.link_state("pkg1", ".config/test.conf")?, LinkState::Linked);
    assert_eq!(fixture.link_state("pkg1", ".bashrc")?, LinkState::Linked);

    Ok(())
}

#[test]
fn sync_twice_is_idempotent() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("shell", ".config/fish/config.fish", "")?;
    fixture.add_file("git", ".gitconfig", "")?;
    let packages = vec![Package::new("shell", "shell"), Package::new("git", "git")];

    let mut ledger = fixture.ledger()?;
    reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;
    let mut ledger = fixture.ledger()?;
    reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;

    let ledger = fixture.ledger()?;
    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &ledger);
    assert_eq!(summary.total_new_files, 0);
    assert_eq!(summary.total_conflict_files(), 0);
    assert_eq!(summary.total_missing_files(), 0);
    assert!(!summary.has_drift());

    Ok(())
}

#[test]
fn interactive_backup_then_link() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "from dotfiles")?;
    fixture.add_file("shell", ".profile", "")?;
    fixture.add_home_file(".bashrc", "my own")?;
    let packages = vec![Package::new("shell", "shell")];

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture)
        .with_resolver(|conflicts: &[ConflictFile]| {
            assert_eq!(conflicts.len(), 1);
            ConflictResolution::Backup
        })
        .sync_all(&packages, &mut ledger, true)?;

    assert_eq!(result.conflicts_resolved, 1);
    assert_eq!(fixture.link_state("shell", ".bashrc")?, LinkState::Linked);
    assert_eq!(fs::read_to_string(fixture.home.join(".bashrc.backup"))?, "my own");

    Ok(())
}

#[test]
fn interactive_delete_directory_conflict() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("nvim", ".config/nvim/init.lua", "")?;
    fixture.add_home_file(".config/nvim/init.lua/stale/file", "junk")?;
    let packages = vec![Package::new("nvim", "nvim")];

    let mut ledger = fixture.ledger()?;
    reconciler(&fixture)
        .with_resolver(|_: &[ConflictFile]| ConflictResolution::Delete)
        .sync_all(&packages, &mut ledger, true)?;

    assert_eq!(fixture.link_state("nvim", ".config/nvim/init.lua")?, LinkState::Linked);

    Ok(())
}

#[test]
fn conflict_fails_only_its_package() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("git", ".gitconfig", "")?;
    fixture.add_home_file(".bashrc", "my own")?;
    let packages = vec![Package::new("shell", "shell"), Package::new("git", "git")];

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;

    assert_eq!(result.synced, vec!["git".to_string()]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].package, "shell");
    assert_eq!(fs::read_to_string(fixture.home.join(".bashrc"))?, "my own");
    assert_eq!(fixture.link_state("git", ".gitconfig")?, LinkState::Linked);

    Ok(())
}

#[test]
fn removed_package_is_unlinked() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("oldpkg", ".oldrc", "")?;

    let mut ledger = fixture.ledger()?;
    let before = vec![Package::new("shell", "shell"), Package::new("oldpkg", "oldpkg")];
    reconciler(&fixture).sync_all(&before, &mut ledger, false)?;
    assert_eq!(fixture.link_state("oldpkg", ".oldrc")?, LinkState::Linked);

    let mut ledger = fixture.ledger()?;
    let after = vec![Package::new("shell", "shell")];
    let result = reconciler(&fixture).sync_all(&after, &mut ledger, false)?;

    assert_eq!(result.removed, vec!["oldpkg".to_string()]);
    assert!(fs::symlink_metadata(fixture.home.join(".oldrc")).is_err());
    assert_eq!(fixture.link_state("shell", ".bashrc")?, LinkState::Linked);

    let saved = fixture.ledger()?;
    assert_eq!(saved.list_packages(), &[Package::new("shell", "shell")]);
    assert_eq!(saved.get_count("oldpkg"), None);

    Ok(())
}

#[test]
fn folded_directory_survives_sync() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("testpkg", "config/settings.txt", "")?;
    fixture.add_home_symlink("config", fixture.dotfiles.join("testpkg/config"))?;
    let packages = vec![Package::new("testpkg", "testpkg")];

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture).sync_all(&packages, &mut ledger, true)?;

    assert!(result.is_success());
    assert_eq!(result.conflicts_resolved, 0);
    assert_eq!(fixture.link_state("testpkg", "config/settings.txt")?, LinkState::Folded);
    assert!(fs::symlink_metadata(fixture.home.join("config"))?
        .file_type()
        .is_symlink());

    Ok(())
}

#[test]
fn folded_symlink_member_survives_interactive_delete() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("testpkg", "config/settings.txt", "x = 1")?;
    let alias = fixture.dotfiles.join("testpkg/config/alias");
    symlink("settings.txt", &alias)?;
    fixture.add_home_symlink("config", fixture.dotfiles.join("testpkg/config"))?;
    let packages = vec![Package::new("testpkg", "testpkg")];

    let asked = Rc::new(Cell::new(false));
    let seen = Rc::clone(&asked);
    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture)
        .with_resolver(move |_: &[ConflictFile]| {
            seen.set(true);
            ConflictResolution::Delete
        })
        .sync_all(&packages, &mut ledger, true)?;

    assert!(!asked.get());
    assert!(result.is_success());
    assert!(result.orphans_removed.is_empty());
    assert!(fs::symlink_metadata(&alias)?.file_type().is_symlink());
    assert_eq!(fixture.link_state("testpkg", "config/alias")?, LinkState::Folded);
    assert_eq!(fixture.ledger()?.get_count("testpkg"), Some(2));

    Ok(())
}

#[test]
fn file_blocking_directory_is_backed_up() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("nvim", ".config/nvim/init.lua", "")?;
    fixture.add_file("nvim", ".config/nvim/lazy.lua", "")?;
    fixture.add_home_file(".config", "not a directory")?;
    let packages = vec![Package::new("nvim", "nvim")];

    let mut ledger = fixture.ledger()?;
    let result = reconciler(&fixture)
        .with_resolver(|conflicts: &[ConflictFile]| {
            assert_eq!(conflicts.len(), 1);
            ConflictResolution::Backup
        })
        .sync_all(&packages, &mut ledger, true)?;

    assert_eq!(result.conflicts_resolved, 1);
    assert_eq!(fs::read_to_string(fixture.home.join(".config.backup"))?, "not a directory");
    assert_eq!(fixture.link_state("nvim", ".config/nvim/init.lua")?, LinkState::Linked);
    assert_eq!(fixture.link_state("nvim", ".config/nvim/lazy.lua")?, LinkState::Linked);

    Ok(())
}

#[test]
fn stow_ignored_files_never_drift() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("shell", "README.md", "# my shell setup")?;
    fixture.add_file("shell", ".gitignore", "*.swp")?;
    let packages = vec![Package::new("shell", "shell")];

    let mut ledger = fixture.ledger()?;
    reconciler(&fixture).sync_all(&packages, &mut ledger, false)?;

    let ledger = fixture.ledger()?;
    assert_eq!(ledger.get_count("shell"), Some(1));
    assert_eq!(fixture.link_state("shell", "README.md")?, LinkState::Missing);

    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &ledger);
    assert!(!summary.has_drift());
    assert_eq!(summary.total_new_files, 0);

    Ok(())
}

#[test]
fn sync_one_recounts_every_declared_package() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("git", ".gitconfig", "")?;
    fixture.add_file("git", ".gitignore_global", "")?;
    let packages = vec![Package::new("shell", "shell"), Package::new("git", "git")];

    let mut ledger = fixture.ledger()?;
    reconciler(&fixture).sync_one("shell", &packages, &mut ledger)?;

    assert_eq!(fixture.link_state("shell", ".bashrc")?, LinkState::Linked);
    assert_eq!(fixture.link_state("git", ".gitconfig")?, LinkState::Missing);

    let saved = fixture.ledger()?;
    assert_eq!(saved.get_count("shell"), Some(1));
    assert_eq!(saved.get_count("git"), Some(2));

    Ok(())
}

#[test]
fn sync_one_removes_its_orphans_only() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("git", ".gitconfig", "")?;
    let shell_orphan = fixture.add_home_symlink(".zshrc", fixture.dotfiles.join("shell/.zshrc"))?;
    let git_orphan = fixture.add_home_symlink(".gitold", fixture.dotfiles.join("git/.gitold"))?;
    let packages = vec![Package::new("shell", "shell"), Package::new("git", "git")];

    let mut ledger = fixture.ledger()?;
    reconciler(&fixture).sync_one("shell", &packages, &mut ledger)?;

    assert!(fs::symlink_metadata(&shell_orphan).is_err());
    assert!(fs::symlink_metadata(&git_orphan).is_ok());

    Ok(())
}
