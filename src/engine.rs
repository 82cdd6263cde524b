//! Rule evaluation and application.
//!
//! The [`RuleEngine`] decides, for each file, which single rule applies
//! (the first enabled match in priority order), resolves the rule's
//! destination template under a base directory, and carries out or
//! simulates the operation. Per-file failures become report entries; the
//! batch always runs to completion unless cancelled.

use crate::cancel::{CancelToken, is_cancelled};
use crate::error::{DatafluxError, Result};
use crate::file_ops::{execute_operation, resolve_unique_path};
use crate::media_category::{MediaCategory, classify_path, dotted_extension};
use crate::rules::{FileFacts, OperationKind, ProcessingRule, RuleSet};
use crate::scanner::ProgressCallback;
use chrono::{DateTime, Datelike, Local, TimeZone};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

/// One file to evaluate: the scanner's output or an externally supplied entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    pub media_type: MediaCategory,
}

impl FileRecord {
    pub fn new(path: PathBuf, size: u64, media_type: MediaCategory) -> Self {
        Self {
            path,
            size,
            media_type,
        }
    }

    /// Builds a record from disk, classifying the file by extension.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::new(
            path.to_path_buf(),
            metadata.len(),
            classify_path(path),
        ))
    }
}

/// A planned or performed operation on one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub rule_id: String,
    pub rule_name: String,
    pub operation: OperationKind,
    pub timestamp: DateTime<Local>,
}

/// A file that matched a rule but could not be planned or processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub source: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportEntry {
    Applied(OperationRecord),
    Failed(ErrorRecord),
}

impl ReportEntry {
    pub fn as_operation(&self) -> Option<&OperationRecord> {
        match self {
            ReportEntry::Applied(record) => Some(record),
            ReportEntry::Failed(_) => None,
        }
    }
}

/// Aggregate outcome of [`RuleEngine::apply_rules`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub operations: Vec<ReportEntry>,
    pub by_rule: BTreeMap<String, usize>,
    pub dry_run: bool,
    pub cancelled: bool,
}

impl Report {
    /// The successful operations, in input order.
    pub fn applied(&self) -> impl Iterator<Item = &OperationRecord> {
        self.operations.iter().filter_map(ReportEntry::as_operation)
    }
}

/// Holds the rule set and applies it to files.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    rules: RuleSet,
}

impl RuleEngine {
    /// An engine with the built-in default rules.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Adds a rule, keeping priority order.
    pub fn add_rule(&mut self, rule: ProcessingRule) -> Result<()> {
        self.rules.add(rule)
    }

    pub fn remove_rule(&mut self, id: &str) -> bool {
        self.rules.remove(id)
    }

    /// Enabled rules matching `record`, in priority order.
    pub fn evaluate(&self, record: &FileRecord) -> Vec<&ProcessingRule> {
        self.evaluate_at(record, Local::now())
    }

    /// Like [`RuleEngine::evaluate`], with ages measured from `now`.
    pub fn evaluate_at(&self, record: &FileRecord, now: DateTime<Local>) -> Vec<&ProcessingRule> {
        let extension = dotted_extension(&record.path);
        let facts = FileFacts {
            media_type: record.media_type,
            extension: &extension,
            size: record.size,
            age_days: modified_time(&record.path)
                .ok()
                .map(|modified| (now - modified).num_days()),
        };

        self.rules
            .enabled()
            .filter(|rule| rule.matches(&facts))
            .collect()
    }

    /// Applies the first matching rule to every entry.
    ///
    /// Files matching no rule are counted as skipped. For a match, the
    /// destination is resolved and, unless `dry_run`, the operation is
    /// executed. Targets planned earlier in the same call count as taken,
    /// so a dry run lists exactly the targets a live run would use.
    /// `on_progress` receives `(done, total, path)` after every entry.
    pub fn apply_rules(
        &self,
        entries: &[FileRecord],
        base_target_dir: &Path,
        dry_run: bool,
        mut on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> Report {
        let mut report = Report {
            dry_run,
            ..Default::default()
        };
        let mut planned: HashSet<PathBuf> = HashSet::new();
        let total = entries.len();

        for (index, entry) in entries.iter().enumerate() {
            if is_cancelled(cancel) {
                info!("Rule application cancelled after {} of {} files", index, total);
                report.cancelled = true;
                break;
            }

            let now = Local::now();
            match self.evaluate_at(entry, now).first() {
                None => {
                    debug!("No rule matches {}", entry.path.display());
                    report.skipped += 1;
                }
                Some(rule) => {
                    let outcome = self
                        .plan_target(entry, rule, base_target_dir, &planned)
                        .and_then(|target| {
                            if !dry_run {
                                execute_operation(&entry.path, &target, rule.action.operation)?;
                            }
                            Ok(target)
                        });

                    match outcome {
                        Ok(target) => {
                            debug!(
                                "{} {} -> {} ({})",
                                rule.action.operation,
                                entry.path.display(),
                                target.display(),
                                rule.id
                            );
                            planned.insert(target.clone());
                            report.processed += 1;
                            *report.by_rule.entry(rule.id.clone()).or_insert(0) += 1;
                            report.operations.push(ReportEntry::Applied(OperationRecord {
                                source: entry.path.clone(),
                                target,
                                rule_id: rule.id.clone(),
                                rule_name: rule.name.clone(),
                                operation: rule.action.operation,
                                timestamp: Local::now(),
                            }));
                        }
                        Err(e) => {
                            warn!("{}", e);
                            report.errors += 1;
                            report.operations.push(ReportEntry::Failed(ErrorRecord {
                                source: entry.path.clone(),
                                rule_id: Some(rule.id.clone()),
                                error: e.to_string(),
                            }));
                        }
                    }
                }
            }

            if let Some(callback) = on_progress.as_deref_mut() {
                callback(index + 1, total, entry.path.as_path());
            }
        }

        info!(
            "Rules applied{}: {} processed, {} skipped, {} errors",
            if dry_run { " (dry run)" } else { "" },
            report.processed,
            report.skipped,
            report.errors
        );

        report
    }

    /// Resolves the destination of `entry` under `rule` without touching the disk.
    fn plan_target(
        &self,
        entry: &FileRecord,
        rule: &ProcessingRule,
        base_target_dir: &Path,
        planned: &HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        let relative = render_template(&rule.action.target_dir, entry)?;
        let directory = base_target_dir.join(relative);
        let file_name = entry
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DatafluxError::Planning {
                path: entry.path.clone(),
                reason: "path has no file name".to_string(),
            })?;

        Ok(resolve_unique_path(&directory, &file_name, planned))
    }
}

/// Substitutes `{extension}`, `{media_type}`, `{year}` and `{month}` in a
/// destination template.
///
/// The result must be a relative path without `..`, so that it stays under
/// the base directory. The modification time is read only when the template
/// needs it.
pub fn render_template(template: &str, entry: &FileRecord) -> Result<PathBuf> {
    let extension = dotted_extension(&entry.path);
    let mut rendered = template
        .replace("{extension}", extension.trim_start_matches('.'))
        .replace("{media_type}", entry.media_type.as_str());

    if rendered.contains("{year}") || rendered.contains("{month}") {
        let modified = modified_time(&entry.path).map_err(|e| DatafluxError::Planning {
            path: entry.path.clone(),
            reason: format!("cannot read modification time: {}", e),
        })?;
        rendered = rendered
            .replace("{year}", &modified.year().to_string())
            .replace("{month}", &format!("{:02}", modified.month()));
    }

    let relative = PathBuf::from(&rendered);
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(DatafluxError::Planning {
            path: entry.path.clone(),
            reason: format!("template '{}' leaves the target directory", template),
        });
    }

    Ok(relative)
}

/// Modification time as local time. A timestamp outside chrono's range is
/// an error rather than a panic.
fn modified_time(path: &Path) -> std::io::Result<DateTime<Local>> {
    let modified = fs::metadata(path)?.modified()?;
    let (secs, nanos) = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => (i64::try_from(after.as_secs()).ok(), after.subsec_nanos()),
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).ok().map(|s| -s);
            match before.subsec_nanos() {
                0 => (secs, 0),
                n => (secs.and_then(|s| s.checked_sub(1)), 1_000_000_000 - n),
            }
        }
    };

    secs.and_then(|secs| Local.timestamp_opt(secs, nanos).single())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("modification time of {} is out of range", path.display()),
            )
        })
}
