//! Output formatting and styling module.
//!
//! Centralizes everything the binary prints: colored status lines, progress
//! bars and the scan / report tables.

use crate::engine::{Report, ReportEntry};
use crate::processor::{ProcessEntry, ProcessReport};
use crate::rules::RuleSet;
use crate::scanner::{ScanResult, human_size};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

/// How many extensions the scan table lists per category.
const TOP_EXTENSIONS: usize = 5;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar whose length is set by the first progress call.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dataflux::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar();
    /// pb.set_length(100);
    /// pb.set_position(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar() -> ProgressBar {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints per-category scan statistics.
    pub fn scan_table(result: &ScanResult) {
        Self::header("SCAN RESULT");

        if result.is_empty() {
            println!("No files found.");
            return;
        }

        println!(
            "{:<10} | {:>8} | {:>10} | {}",
            "Category".bold(),
            "Files".bold(),
            "Size".bold(),
            "Top extensions".bold()
        );
        println!("{}", "-".repeat(60));

        for (category, stats) in result.iter() {
            let mut extensions: Vec<_> = stats.extension_histogram.iter().collect();
            extensions.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let top = extensions
                .iter()
                .take(TOP_EXTENSIONS)
                .map(|(ext, count)| {
                    let ext = if ext.is_empty() { "(none)" } else { ext.as_str() };
                    format!("{} ({})", ext, count)
                })
                .collect::<Vec<_>>()
                .join(", ");

            println!(
                "{:<10} | {:>8} | {:>10} | {}",
                category.as_str(),
                stats.count.to_string().green(),
                human_size(stats.total_size),
                top
            );
        }

        println!("{}", "-".repeat(60));
        println!(
            "{:<10} | {:>8} | {:>10} |",
            "Total".bold(),
            result.total_files().to_string().green().bold(),
            human_size(result.total_size())
        );
    }

    /// Prints the rules in evaluation order.
    pub fn rule_list(rules: &RuleSet) {
        Self::header("RULES");
        for rule in rules.iter() {
            let state = if rule.enabled {
                "on ".green()
            } else {
                "off".red()
            };
            println!(
                "[{}] {:>3}  {:<24} {} -> {}",
                state,
                rule.priority,
                rule.id,
                rule.action.operation,
                rule.action.target_dir
            );
            if !rule.description.is_empty() {
                println!("            {}", rule.description.dimmed());
            }
        }
    }

    /// Prints each operation of a rule report and a summary.
    pub fn rule_report(report: &Report) {
        let verb = if report.dry_run { "Would" } else { "Did" };

        Self::header("OPERATIONS");
        for entry in &report.operations {
            match entry {
                ReportEntry::Applied(op) => println!(
                    " - {} → {} ({} {}, rule {})",
                    op.source.display(),
                    op.target.display(),
                    verb.to_lowercase(),
                    op.operation,
                    op.rule_id
                ),
                ReportEntry::Failed(err) => {
                    Self::error(&format!("{}: {}", err.source.display(), err.error))
                }
            }
        }

        Self::header("SUMMARY");
        println!("Processed: {}", report.processed.to_string().green());
        println!("Skipped:   {}", report.skipped);
        println!("Errors:    {}", report.errors.to_string().red());
        for (rule_id, count) in &report.by_rule {
            println!(
                "  {:<24} {} {}",
                rule_id,
                count,
                if *count == 1 { "file" } else { "files" }
            );
        }
        if report.cancelled {
            Self::warning("Cancelled before all files were processed.");
        }
    }

    /// Prints a flatten / sort report.
    pub fn process_report(report: &ProcessReport) {
        Self::header("OPERATIONS");
        for entry in &report.operations {
            match entry {
                ProcessEntry::Moved(op) => {
                    println!(" - {} → {}", op.source.display(), op.target.display())
                }
                ProcessEntry::Failed(err) => {
                    Self::error(&format!("{}: {}", err.source.display(), err.error))
                }
            }
        }

        Self::header("SUMMARY");
        println!("Moved:   {}", report.processed.to_string().green());
        println!("Skipped: {}", report.skipped);
        println!("Errors:  {}", report.errors.to_string().red());
        for (category, count) in &report.by_type {
            println!("  {:<10} {}", category.as_str(), count);
        }
        if report.cancelled {
            Self::warning("Cancelled before all files were processed.");
        }
    }
}
