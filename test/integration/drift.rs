// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{DotfilesFixture, FakeStow};

use anyhow::Result;
use oxistow::{
    detect_conflicts, full_check, full_check_concurrent, inspect, quick_check, Package,
    Reconciler,
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[test]
fn quick_check_without_baseline_reports_nothing() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("shell", ".profile", "")?;
    let packages = vec![Package::new("shell", "shell")];

    let summary = quick_check(&packages, &fixture.dotfiles, &fixture.ledger()?);
    assert!(!summary.has_drift());
    assert_eq!(summary.results[0].current_file_count, 2);

    Ok(())
}

#[test]
fn quick_check_notices_added_file_after_sync() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    let packages = vec![Package::new("shell", "shell")];

    let mut ledger = fixture.ledger()?;
    Reconciler::new(FakeStow::new(&fixture.home), &fixture.dotfiles, &fixture.home)
        .sync_all(&packages, &mut ledger, false)?;
    assert!(!quick_check(&packages, &fixture.dotfiles, &fixture.ledger()?).has_drift());

    fixture.add_file("shell", ".inputrc", "")?;
    let summary = quick_check(&packages, &fixture.dotfiles, &fixture.ledger()?);
    assert!(summary.has_drift());
    assert_eq!(summary.results[0].stored_file_count, 1);
    assert_eq!(summary.results[0].current_file_count, 2);

    Ok(())
}

#[test]
fn removed_package_is_drift_even_when_rest_is_clean() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("oldpkg", ".oldrc", "")?;

    let mut ledger = fixture.ledger()?;
    let before = vec![Package::new("shell", "shell"), Package::new("oldpkg", "oldpkg")];
    Reconciler::new(FakeStow::new(&fixture.home), &fixture.dotfiles, &fixture.home)
        .sync_all(&before, &mut ledger, false)?;

    let after = vec![Package::new("shell", "shell")];
    let ledger = fixture.ledger()?;

    let quick = quick_check(&after, &fixture.dotfiles, &ledger);
    assert_eq!(quick.removed_packages, vec!["oldpkg".to_string()]);
    assert!(quick.has_drift());

    let full = full_check(&after, &fixture.dotfiles, &fixture.home, &ledger);
    assert_eq!(full.removed_packages, vec!["oldpkg".to_string()]);
    assert_eq!(full.drifted_packages, 1);
    assert!(!full.results[0].has_drift);

    Ok(())
}

#[test]
fn only_the_occupied_file_conflicts() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("shell", ".profile", "")?;
    fixture.add_file("shell", ".config/starship.toml", "")?;
    fixture.add_home_file(".profile", "mine")?;
    let packages = vec![Package::new("shell", "shell")];

    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &fixture.ledger()?);
    let result = &summary.results[0];
    assert_eq!(result.conflict_files, vec![PathBuf::from(".profile")]);
    assert_eq!(
        result.new_files,
        vec![PathBuf::from(".bashrc"), PathBuf::from(".config/starship.toml")]
    );

    let conflicts = detect_conflicts(&packages, &fixture.dotfiles, &fixture.home);
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].target_path, fixture.home.join(".profile"));
    assert!(!conflicts[0].is_directory);

    Ok(())
}

#[test]
fn folded_directory_is_not_drift() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("testpkg", "config/settings.txt", "")?;
    fixture.add_file("testpkg", "config/nested/deep.txt", "")?;
    fixture.add_home_symlink("config", fixture.dotfiles.join("testpkg/config"))?;
    let packages = vec![Package::new("testpkg", "testpkg")];

    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &fixture.ledger()?);
    assert_eq!(summary.total_conflict_files(), 0);
    assert_eq!(summary.total_new_files, 0);
    assert_eq!(summary.total_missing_files(), 0);
    assert!(detect_conflicts(&packages, &fixture.dotfiles, &fixture.home).is_empty());

    let status = inspect(&packages[0], &fixture.dotfiles, &fixture.home);
    assert!(status.is_fully_linked());
    assert_eq!(status.linked_count, 2);

    Ok(())
}

#[test]
fn symlinks_into_other_trees_are_not_orphans() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_home_symlink(".vimrc", fixture.dotfiles.join("vim/.vimrc"))?;
    fixture.add_home_symlink(".zshrc", "/nonexistent/.zshrc")?;
    fixture.add_home_symlink(".inputrc", fixture.dotfiles.join("shell/.inputrc"))?;
    let packages = vec![Package::new("shell", "shell")];

    let summary = full_check(&packages, &fixture.dotfiles, &fixture.home, &fixture.ledger()?);
    assert_eq!(summary.results[0].missing_files, vec![PathBuf::from(".inputrc")]);

    Ok(())
}

#[tokio::test]
async fn concurrent_check_matches_sequential() -> Result<()> {
    let fixture = DotfilesFixture::new()?;
    fixture.add_file("shell", ".bashrc", "")?;
    fixture.add_file("git", ".gitconfig", "")?;
    fixture.add_file("nvim", ".config/nvim/init.lua", "")?;
    fixture.add_home_file(".gitconfig", "mine")?;
    fixture.add_home_symlink(".bashrc", fixture.dotfiles.join("shell/.bashrc"))?;
    let packages = vec![
        Package::new("shell", "shell"),
        Package::new("git", "git"),
        Package::new("ghost", "ghost"),
        Package::new("nvim", "nvim"),
    ];
    let ledger = fixture.ledger()?;

    let sequential = full_check(&packages, &fixture.dotfiles, &fixture.home, &ledger);
    let concurrent =
        full_check_concurrent(&packages, &fixture.dotfiles, &fixture.home, &ledger).await?;
    assert_eq!(concurrent, sequential);
    assert_eq!(concurrent.total_packages, 3);

    Ok(())
}
