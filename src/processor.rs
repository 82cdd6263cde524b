/// Bulk reorganization without rules: flattening a tree and sorting by media type.
///
/// Both operations move files, use the same collision-free naming as the
/// rule engine and honor dry-run. Traversal goes through the
/// [`DirectoryScanner`], so hidden entries and symlinks are skipped the same
/// way a scan skips them.
use crate::cancel::{CancelToken, is_cancelled};
use crate::engine::ErrorRecord;
use crate::error::{DatafluxError, Result};
use crate::file_ops::{execute_operation, resolve_unique_path};
use crate::media_category::{MediaCategory, classify, dotted_extension};
use crate::rules::OperationKind;
use crate::scanner::{DirectoryScanner, ProgressCallback};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Which bulk operation produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    Flatten,
    SortByType,
}

/// One planned or performed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: ProcessKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaCategory>,
    pub timestamp: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessEntry {
    Moved(ProcessRecord),
    Failed(ErrorRecord),
}

/// Outcome of a flatten or sort run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub operations: Vec<ProcessEntry>,
    /// Files per category. Only filled by [`FileProcessor::sort_by_type`].
    pub by_type: BTreeMap<MediaCategory, usize>,
    pub cancelled: bool,
}

/// Runs flatten and sort-by-type operations and keeps a log of every
/// successful move across calls.
#[derive(Debug, Clone)]
pub struct FileProcessor {
    dry_run: bool,
    scanner: DirectoryScanner,
    operations_log: Vec<ProcessRecord>,
}

impl FileProcessor {
    pub fn new(dry_run: bool) -> Self {
        Self::with_scanner(dry_run, DirectoryScanner::new())
    }

    /// Uses `scanner` (and its filters) to enumerate source files.
    pub fn with_scanner(dry_run: bool, scanner: DirectoryScanner) -> Self {
        Self {
            dry_run,
            scanner,
            operations_log: Vec::new(),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Moves every file below `source_dir` directly into `target_dir`.
    ///
    /// With `extensions`, only files whose dotted extension is listed
    /// (case-insensitive) are moved; the rest count as skipped.
    pub fn flatten_directory(
        &mut self,
        source_dir: &Path,
        target_dir: &Path,
        extensions: Option<&[String]>,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> ProcessReport {
        let allowed: Option<HashSet<String>> =
            extensions.map(|list| list.iter().map(|e| normalize_extension(e)).collect());

        self.process(
            source_dir,
            ProcessKind::Flatten,
            on_progress,
            cancel,
            |path| {
                let ext = dotted_extension(path);
                match &allowed {
                    Some(allowed) if !allowed.contains(&ext) => None,
                    _ => Some((target_dir.to_path_buf(), None)),
                }
            },
        )
    }

    /// Moves every file below `source_dir` into `target_base/<media_type>/`.
    pub fn sort_by_type(
        &mut self,
        source_dir: &Path,
        target_base: &Path,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> ProcessReport {
        self.process(
            source_dir,
            ProcessKind::SortByType,
            on_progress,
            cancel,
            |path| {
                let category = classify(&dotted_extension(path));
                Some((target_base.join(category.as_str()), Some(category)))
            },
        )
    }

    /// Successful moves recorded since creation or the last [`clear_log`](Self::clear_log).
    pub fn operations_log(&self) -> &[ProcessRecord] {
        &self.operations_log
    }

    pub fn clear_log(&mut self) {
        self.operations_log.clear();
    }

    /// Shared loop: `destination` returns the target directory for a file,
    /// or `None` to skip it.
    fn process<F>(
        &mut self,
        source_dir: &Path,
        kind: ProcessKind,
        mut on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
        destination: F,
    ) -> ProcessReport
    where
        F: Fn(&Path) -> Option<(PathBuf, Option<MediaCategory>)>,
    {
        let mut report = ProcessReport::default();
        let files = self.scanner.collect_files(source_dir, cancel);
        let total = files.len();
        let mut planned: HashSet<PathBuf> = HashSet::new();

        for (index, path) in files.iter().enumerate() {
            if is_cancelled(cancel) {
                report.cancelled = true;
                break;
            }

            match destination(path) {
                None => report.skipped += 1,
                Some((directory, media_type)) => {
                    match self.move_one(path, &directory, &planned) {
                        Ok(target) => {
                            planned.insert(target.clone());
                            report.processed += 1;
                            if let Some(category) = media_type {
                                *report.by_type.entry(category).or_insert(0) += 1;
                            }
                            let record = ProcessRecord {
                                source: path.clone(),
                                target,
                                kind,
                                media_type,
                                timestamp: Local::now(),
                            };
                            self.operations_log.push(record.clone());
                            report.operations.push(ProcessEntry::Moved(record));
                        }
                        Err(e) => {
                            warn!("{}", e);
                            report.errors += 1;
                            report.operations.push(ProcessEntry::Failed(ErrorRecord {
                                source: path.clone(),
                                rule_id: None,
                                error: e.to_string(),
                            }));
                        }
                    }
                }
            }

            if let Some(callback) = on_progress.as_deref_mut() {
                callback(index + 1, total, path.as_path());
            }
        }

        info!(
            "{:?}{}: {} moved, {} skipped, {} errors",
            kind,
            if self.dry_run { " (dry run)" } else { "" },
            report.processed,
            report.skipped,
            report.errors
        );

        report
    }

    fn move_one(
        &self,
        source: &Path,
        directory: &Path,
        planned: &HashSet<PathBuf>,
    ) -> Result<PathBuf> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DatafluxError::Planning {
                path: source.to_path_buf(),
                reason: "path has no file name".to_string(),
            })?;

        let target = resolve_unique_path(directory, &file_name, planned);
        if !self.dry_run {
            execute_operation(source, &target, OperationKind::Move)?;
        }
        Ok(target)
    }
}

fn normalize_extension(ext: &str) -> String {
    let lower = ext.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}
