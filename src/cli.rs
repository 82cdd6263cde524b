//! Command-line interface module for dataflux.
//!
//! This module handles all CLI-related functionality including:
//! - Argument and subcommand definitions
//! - Scanning with progress display
//! - Rule application orchestration and report export
//! - Rule listing and export
//! - Flatten and sort-by-type runs

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::engine::RuleEngine;
use crate::output::OutputFormatter;
use crate::processor::FileProcessor;
use crate::rules::RuleSet;
use crate::scanner::{DirectoryScanner, ScanResult};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// Scan folders by media type and reorganize them with rules
#[derive(Parser, Debug)]
#[command(name = "dataflux")]
#[command(version)]
#[command(about = "Scan folders by media type and reorganize files with priority-ordered rules", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace (overrides config)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show per-media-type statistics for one or more folders
    Scan {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan folders and apply the processing rules to every file found
    Apply {
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Base directory the rule templates are resolved under
        #[arg(short, long)]
        target: PathBuf,

        /// Rule document (overrides config)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Plan and report without touching any file
        #[arg(long)]
        dry_run: bool,

        /// Write the report as JSON to this file
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },

    /// Inspect or export rules
    Rules {
        #[command(subcommand)]
        action: RulesCommand,
    },

    /// Move every file below SOURCE directly into TARGET
    Flatten {
        source: PathBuf,
        target: PathBuf,

        /// Only move files with this extension (repeatable)
        #[arg(long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Move every file below SOURCE into TARGET/<media type>/
    Sort {
        source: PathBuf,
        target: PathBuf,

        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesCommand {
    /// List rules in evaluation order
    List {
        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
    /// Write the active rules as a JSON document
    Export {
        file: PathBuf,

        #[arg(short, long)]
        rules: Option<PathBuf>,
    },
}

/// Runs one command with an already-loaded configuration.
///
/// # Examples
///
/// ```no_run
/// use dataflux::cancel::CancelToken;
/// use dataflux::cli::{run_cli, Command};
/// use dataflux::config::Config;
/// use std::path::PathBuf;
///
/// let command = Command::Scan { dirs: vec![PathBuf::from("/media")], json: false };
/// run_cli(command, &Config::default(), &CancelToken::new()).unwrap();
/// ```
pub fn run_cli(command: Command, config: &Config, cancel: &CancelToken) -> Result<()> {
    let scanner = DirectoryScanner::with_filters(
        config
            .compile_filters()
            .context("Error compiling scan filters")?,
    );

    match command {
        Command::Scan { dirs, json } => {
            let result = scan_with_progress(&scanner, &dirs, cancel, !json);
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                OutputFormatter::scan_table(&result);
            }
            Ok(())
        }
        Command::Apply {
            dirs,
            target,
            rules,
            dry_run,
            report,
        } => apply(
            &scanner,
            &dirs,
            &target,
            &load_rules(rules.as_deref(), config)?,
            dry_run,
            report.as_deref(),
            cancel,
        ),
        Command::Rules { action } => match action {
            RulesCommand::List { rules } => {
                OutputFormatter::rule_list(&load_rules(rules.as_deref(), config)?);
                Ok(())
            }
            RulesCommand::Export { file, rules } => {
                load_rules(rules.as_deref(), config)?.save(&file)?;
                OutputFormatter::success(&format!("Rules written to {}", file.display()));
                Ok(())
            }
        },
        Command::Flatten {
            source,
            target,
            extensions,
            dry_run,
        } => {
            ensure_dir(&source)?;
            let mut processor = FileProcessor::with_scanner(dry_run, scanner);
            let filter = (!extensions.is_empty()).then_some(extensions.as_slice());
            let pb = OutputFormatter::create_progress_bar();
            let mut on_progress = progress_callback(&pb);
            let report = processor.flatten_directory(
                &source,
                &target,
                filter,
                Some(&mut on_progress),
                Some(cancel),
            );
            pb.finish_and_clear();
            if dry_run {
                OutputFormatter::dry_run_notice("No files were moved.");
            }
            OutputFormatter::process_report(&report);
            Ok(())
        }
        Command::Sort {
            source,
            target,
            dry_run,
        } => {
            ensure_dir(&source)?;
            let mut processor = FileProcessor::with_scanner(dry_run, scanner);
            let pb = OutputFormatter::create_progress_bar();
            let mut on_progress = progress_callback(&pb);
            let report =
                processor.sort_by_type(&source, &target, Some(&mut on_progress), Some(cancel));
            pb.finish_and_clear();
            if dry_run {
                OutputFormatter::dry_run_notice("No files were moved.");
            }
            OutputFormatter::process_report(&report);
            Ok(())
        }
    }
}

/// Scans `dirs` and applies `rules` under `target`.
fn apply(
    scanner: &DirectoryScanner,
    dirs: &[PathBuf],
    target: &Path,
    rules: &RuleSet,
    dry_run: bool,
    report_path: Option<&Path>,
    cancel: &CancelToken,
) -> Result<()> {
    let scan = scan_with_progress(scanner, dirs, cancel, true);
    let records = scan.file_records();
    info!("{} files to evaluate against {} rules", records.len(), rules.len());

    let engine = RuleEngine::with_rules(rules.clone());
    let pb = OutputFormatter::create_progress_bar();
    let mut on_progress = progress_callback(&pb);
    let report = engine.apply_rules(&records, target, dry_run, Some(&mut on_progress), Some(cancel));
    pb.finish_and_clear();

    if dry_run {
        OutputFormatter::dry_run_notice("No files were modified.");
    }
    OutputFormatter::rule_report(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Error writing report to {}", path.display()))?;
        OutputFormatter::success(&format!("Report written to {}", path.display()));
    }

    Ok(())
}

fn scan_with_progress(
    scanner: &DirectoryScanner,
    dirs: &[PathBuf],
    cancel: &CancelToken,
    show_progress: bool,
) -> ScanResult {
    if !show_progress {
        return scanner.scan_multiple_directories(dirs, None, Some(cancel));
    }

    let pb = OutputFormatter::create_progress_bar();
    let mut on_progress = progress_callback(&pb);
    let result = scanner.scan_multiple_directories(dirs, Some(&mut on_progress), Some(cancel));
    pb.finish_and_clear();

    if cancel.is_cancelled() {
        OutputFormatter::warning("Scan cancelled, showing partial result.");
    }
    result
}

fn progress_callback(pb: &ProgressBar) -> impl FnMut(usize, usize, &Path) + '_ {
    move |done, total, current| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
        pb.set_message(current.display().to_string());
    }
}

/// Rule document precedence: explicit flag, then config, then built-in defaults.
///
/// An explicit document must exist. A configured one that is missing falls
/// back to the defaults.
fn load_rules(explicit: Option<&Path>, config: &Config) -> Result<RuleSet> {
    if let Some(path) = explicit {
        return RuleSet::load(path)
            .with_context(|| format!("Error loading rules from {}", path.display()));
    }
    match config.rules.file.as_deref() {
        Some(path) => RuleSet::load_or_default(path)
            .with_context(|| format!("Error loading rules from {}", path.display())),
        None => Ok(RuleSet::with_defaults()),
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        bail!("Not a directory: {}", path.display());
    }
    Ok(())
}
