// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use oxistow::{
    conflict::backup_path,
    path::{default_config_path, default_ledger_path, home_dir},
    detect_conflicts, full_check, full_check_concurrent, inspect, quick_check, ConflictFile,
    ConflictResolution, DotfilesConfig, DriftSummary, Ledger, LinkOptions, Reconciler,
    StowExecutor,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Select;
use std::{fs::read_to_string, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "oxistow [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Path to state ledger.
    #[arg(short, long, global = true, value_name = "path")]
    pub ledger: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let session = Session::load(self.config, self.ledger)?;
        match self.command {
            Command::Status(opts) => run_status(session, opts),
            Command::Drift(opts) => run_drift(session, opts).await,
            Command::Conflicts => run_conflicts(session),
            Command::Sync(opts) => run_sync(session, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show link status of packages.
    #[command(override_usage = "oxistow status [options] [<package>]...")]
    Status(StatusOptions),

    /// Report drift between packages and home directory.
    #[command(override_usage = "oxistow drift [options]")]
    Drift(DriftOptions),

    /// List files that linking would overwrite.
    #[command(override_usage = "oxistow conflicts")]
    Conflicts,

    /// Link packages and clean up after removed files and packages.
    #[command(override_usage = "oxistow sync [options] [<package>]")]
    Sync(SyncOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Packages to show, all of them if empty.
    #[arg(value_name = "package")]
    pub packages: Vec<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DriftOptions {
    /// Only compare file counts with the ledger.
    #[arg(short, long)]
    pub quick: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Sync only this package.
    #[arg(value_name = "package")]
    pub package: Option<String>,

    /// Ask what to do about conflicting files before linking.
    #[arg(short, long, conflicts_with = "package")]
    pub interactive: bool,

    /// Show what would be linked without changing anything.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Adopt pre-existing files into packages instead of failing.
    #[arg(short, long)]
    pub force: bool,
}

/// Everything loaded from disk that commands need.
struct Session {
    config: DotfilesConfig,
    home: PathBuf,
    ledger: Ledger,
}

impl Session {
    fn load(config: Option<PathBuf>, ledger: Option<PathBuf>) -> Result<Self> {
        let config_path = match config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let config: DotfilesConfig = read_to_string(&config_path)
            .with_context(|| format!("failed to read config at {:?}", config_path.display()))?
            .parse()?;

        let home = match &config.settings.target {
            Some(target) => target.clone(),
            None => home_dir()?,
        };

        let ledger = Ledger::open(match ledger {
            Some(path) => path,
            None => default_ledger_path()?,
        })?;

        Ok(Self {
            config,
            home,
            ledger,
        })
    }

    fn dotfiles(&self) -> PathBuf {
        self.config.settings.dotfiles.clone()
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_status(session: Session, opts: StatusOptions) -> Result<()> {
    let dotfiles = session.dotfiles();
    for package in &session.config.packages {
        if !opts.packages.is_empty() && !opts.packages.contains(&package.name) {
            continue;
        }

        let status = inspect(package, &dotfiles, &session.home);
        let state = if status.is_fully_linked() {
            "fully linked".to_string()
        } else if status.is_partially_linked() {
            format!("partially linked ({}/{})", status.linked_count, status.total_count)
        } else {
            "not linked".to_string()
        };
        println!("{}: {state}", status.package_name);

        for file in status.files.iter().filter(|file| !file.is_linked) {
            println!("    {}: {}", file.rel_path.display(), file.issue);
        }
    }

    for name in &opts.packages {
        if session.config.find_package(name).is_none() {
            bail!("package {name:?} not found");
        }
    }

    Ok(())
}

async fn run_drift(session: Session, opts: DriftOptions) -> Result<()> {
    let dotfiles = session.dotfiles();
    let summary = if opts.quick {
        quick_check(&session.config.packages, &dotfiles, &session.ledger)
    } else {
        full_check_concurrent(
            &session.config.packages,
            &dotfiles,
            &session.home,
            &session.ledger,
        )
        .await?
    };

    print_drift(&summary, opts.quick);
    Ok(())
}

fn print_drift(summary: &DriftSummary, quick: bool) {
    for result in summary.results.iter().filter(|result| result.has_drift) {
        if quick {
            println!(
                "{}: {} file(s), ledger has {}",
                result.package_name, result.current_file_count, result.stored_file_count
            );
            continue;
        }

        println!("{}:", result.package_name);
        for path in &result.new_files {
            println!("    new:      {}", path.display());
        }
        for path in &result.missing_files {
            println!("    orphan:   {}", path.display());
        }
        for path in &result.conflict_files {
            println!("    conflict: {}", path.display());
        }
    }

    for name in &summary.removed_packages {
        println!("{name}: removed from configuration");
    }

    println!(
        "{} of {} package(s) drifted",
        summary.drifted_packages,
        summary.total_packages + summary.removed_packages.len()
    );
}

fn run_conflicts(session: Session) -> Result<()> {
    let conflicts = detect_conflicts(
        &session.config.packages,
        &session.dotfiles(),
        &session.home,
    );
    print_conflicts(&conflicts);
    println!("{} conflicting file(s)", conflicts.len());

    Ok(())
}

fn print_conflicts(conflicts: &[ConflictFile]) {
    for conflict in conflicts {
        let kind = if conflict.is_directory { "directory" } else { "file" };
        println!(
            "{}: {} ({kind})",
            conflict.package_name,
            conflict.target_path.display()
        );
    }
}

fn run_sync(mut session: Session, opts: SyncOptions) -> Result<()> {
    report_pending(&session, opts.package.as_deref());

    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    let bar = ProgressBar::new(session.config.packages.len() as u64);
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));

    let options = LinkOptions {
        dry_run: opts.dry_run,
        force: opts.force,
    };
    let executor = StowExecutor::new(&session.home);
    let progress_bar = bar.clone();
    let prompt_bar = bar.clone();
    let mut reconciler = Reconciler::new(executor, session.dotfiles(), &session.home)
        .with_options(options)
        .with_progress(move |current: usize, total: usize, message: &str| {
            progress_bar.set_length(total as u64);
            progress_bar.set_position(current as u64);
            progress_bar.set_message(message.to_string());
        })
        .with_resolver(move |conflicts: &[ConflictFile]| {
            prompt_bar.suspend(|| prompt_resolution(conflicts))
        });

    if let Some(name) = opts.package {
        reconciler.sync_one(&name, &session.config.packages, &mut session.ledger)?;
        bar.finish_and_clear();
        info!("Synced package {name:?}");
        return Ok(());
    }

    let result = reconciler.sync_all(
        &session.config.packages,
        &mut session.ledger,
        opts.interactive,
    )?;
    bar.finish_and_clear();

    if result.conflicts_resolved > 0 {
        info!("resolved {} conflict(s)", result.conflicts_resolved);
    }
    for name in &result.removed {
        info!("unlinked removed package {name:?}");
    }
    if !result.orphans_removed.is_empty() {
        info!("removed {} orphaned symlink(s)", result.orphans_removed.len());
    }

    if !result.is_success() {
        for failure in &result.failed {
            error!("{}: {}", failure.package, failure.error);
        }
        bail!("Failed to sync {} package(s)", result.failed.len());
    }

    info!("Synced {} package(s)", result.synced.len());
    Ok(())
}

fn report_pending(session: &Session, package: Option<&str>) {
    let summary = full_check(
        &session.config.packages,
        &session.dotfiles(),
        &session.home,
        &session.ledger,
    );
    let (conflicts, orphans) = pending_counts(&summary, package);
    info!("{conflicts} conflicting file(s), {orphans} orphaned symlink(s)");

    if package.is_none() && !summary.removed_packages.is_empty() {
        info!(
            "{} removed package(s) to unlink: {}",
            summary.removed_packages.len(),
            summary.removed_packages.join(", ")
        );
    }
}

fn pending_counts(summary: &DriftSummary, package: Option<&str>) -> (usize, usize) {
    summary
        .results
        .iter()
        .filter(|result| package.is_none_or(|name| result.package_name == name))
        .fold((0, 0), |(conflicts, orphans), result| {
            (
                conflicts + result.conflict_files.len(),
                orphans + result.missing_files.len(),
            )
        })
}

fn prompt_resolution(conflicts: &[ConflictFile]) -> ConflictResolution {
    print_conflicts(conflicts);
    if let Some(first) = conflicts.first() {
        println!(
            "backups are named like {:?}",
            backup_path(&first.target_path).display()
        );
    }

    let choices = vec!["back up", "delete", "cancel"];
    let message = format!("{} file(s) would be overwritten", conflicts.len());
    match Select::new(message.as_str(), choices).prompt() {
        Ok("back up") => ConflictResolution::Backup,
        Ok("delete") => ConflictResolution::Delete,
        _ => ConflictResolution::Cancel,
    }
}
