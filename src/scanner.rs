//! Recursive, cancellable directory scanning.
//!
//! The scanner walks a tree with an explicit work stack, skips hidden
//! entries and symlinks, classifies every regular file by extension and
//! accumulates [`ScanStats`] per [`MediaCategory`]. Filesystem access
//! errors never escape: an unreadable entry is skipped, an unreadable
//! directory drops its whole subtree.
//!
//! # Examples
//!
//! ```no_run
//! use dataflux::scanner::DirectoryScanner;
//! use std::path::Path;
//!
//! let scanner = DirectoryScanner::new();
//! let result = scanner.scan_directory(Path::new("/media/footage"), None, None);
//! for (category, stats) in result.iter() {
//!     println!("{}: {} files", category, stats.count);
//! }
//! ```

use crate::cancel::{CancelToken, is_cancelled};
use crate::config::CompiledFilters;
use crate::engine::FileRecord;
use crate::error::DatafluxError;
use crate::media_category::{MediaCategory, classify, dotted_extension};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};

/// Progress call-out: `(processed, total, current_path)`.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(usize, usize, &Path);

/// Aggregated statistics for one media category.
///
/// `count`, the histogram total and `file_paths.len()` always agree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    pub count: usize,
    /// Sum of file sizes in bytes at scan time.
    pub total_size: u64,
    /// Dotted, lower-cased extension to file count.
    pub extension_histogram: BTreeMap<String, usize>,
    pub file_paths: Vec<PathBuf>,
}

impl ScanStats {
    fn record(&mut self, path: PathBuf, extension: String, size: u64) {
        self.count += 1;
        self.total_size += size;
        *self.extension_histogram.entry(extension).or_insert(0) += 1;
        self.file_paths.push(path);
    }

    /// Adds another category's stats onto this one.
    pub fn merge(&mut self, other: ScanStats) {
        self.count += other.count;
        self.total_size += other.total_size;
        for (ext, count) in other.extension_histogram {
            *self.extension_histogram.entry(ext).or_insert(0) += count;
        }
        self.file_paths.extend(other.file_paths);
    }
}

/// Per-category scan statistics. Only categories with at least one file
/// are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScanResult {
    categories: BTreeMap<MediaCategory, ScanStats>,
}

impl ScanResult {
    pub fn get(&self, category: MediaCategory) -> Option<&ScanStats> {
        self.categories.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MediaCategory, &ScanStats)> {
        self.categories.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_files(&self) -> usize {
        self.categories.values().map(|s| s.count).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.categories.values().map(|s| s.total_size).sum()
    }

    /// Merges another result additively, category by category.
    pub fn merge(&mut self, other: ScanResult) {
        for (category, stats) in other.categories {
            self.categories.entry(category).or_default().merge(stats);
        }
    }

    /// Builds the rule engine's input from the scanned files.
    ///
    /// Sizes are re-read from disk; files that vanished since the scan are
    /// left out.
    pub fn file_records(&self) -> Vec<FileRecord> {
        self.categories
            .iter()
            .flat_map(|(category, stats)| {
                stats.file_paths.iter().filter_map(move |path| {
                    match fs::symlink_metadata(path) {
                        Ok(metadata) => Some(FileRecord::new(path.clone(), metadata.len(), *category)),
                        Err(e) => {
                            debug!("Dropping {} from records: {}", path.display(), e);
                            None
                        }
                    }
                })
            })
            .collect()
    }

    fn record(&mut self, category: MediaCategory, path: PathBuf, extension: String, size: u64) {
        self.categories
            .entry(category)
            .or_default()
            .record(path, extension, size);
    }
}

/// Makes a scan root absolute so recorded paths are absolute too.
/// Symlinks in the root are left as given.
fn absolute_root(root: &Path) -> PathBuf {
    std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf())
}

/// Returns true for names starting with `.` (this includes `._` resource forks).
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Formats a byte count with binary units and one decimal.
///
/// ```
/// use dataflux::scanner::human_size;
///
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(1536), "1.5 KB");
/// assert_eq!(human_size(150 * 1024 * 1024), "150.0 MB");
/// ```
pub fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else if bytes < GB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    }
}

/// Threads a single monotonic counter through one or more roots.
struct ProgressTracker<'a> {
    callback: ProgressCallback<'a>,
    offset: usize,
    total: usize,
}

impl ProgressTracker<'_> {
    fn report(&mut self, processed: usize, current: &Path) {
        (self.callback)(self.offset + processed, self.total, current);
    }
}

/// Walks directory trees and aggregates [`ScanStats`].
#[derive(Debug, Clone, Default)]
pub struct DirectoryScanner {
    filters: CompiledFilters,
}

impl DirectoryScanner {
    /// A scanner with no filters beyond the hidden-entry rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scanner that additionally drops files rejected by `filters`.
    pub fn with_filters(filters: CompiledFilters) -> Self {
        Self { filters }
    }

    /// Counts eligible files under `root`.
    ///
    /// Used to precompute a progress total. If `cancel` fires, the partial
    /// count gathered so far is returned.
    pub fn count_files(&self, root: &Path, cancel: Option<&CancelToken>) -> usize {
        let mut total = 0;
        self.walk(root, cancel, &mut |_| total += 1);
        total
    }

    /// Collects the paths of all eligible files under `root`, in traversal order.
    pub fn collect_files(&self, root: &Path, cancel: Option<&CancelToken>) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.walk(root, cancel, &mut |entry| files.push(entry.path()));
        files
    }

    /// Scans one directory tree.
    ///
    /// With `on_progress`, the total is counted first and reported as
    /// `(0, total, root)`, then `(processed, total, path)` follows every
    /// classified file. Cancellation returns what was accumulated so far.
    pub fn scan_directory(
        &self,
        root: &Path,
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> ScanResult {
        let mut result = ScanResult::default();
        let root = absolute_root(root);
        let root = root.as_path();
        if !root.is_dir() {
            debug!("Not a directory, nothing to scan: {}", root.display());
            return result;
        }

        match on_progress {
            Some(callback) => {
                let total = self.count_files(root, cancel);
                let mut tracker = ProgressTracker {
                    callback,
                    offset: 0,
                    total,
                };
                tracker.report(0, root);
                if is_cancelled(cancel) {
                    return result;
                }
                self.scan_into(root, &mut result, Some(&mut tracker), cancel);
            }
            None => {
                self.scan_into(root, &mut result, None, cancel);
            }
        }

        result
    }

    /// Scans several roots in sequence and merges their statistics.
    ///
    /// With `on_progress`, a combined total across all roots is counted up
    /// front and one continuous counter spans the whole operation.
    pub fn scan_multiple_directories<P: AsRef<Path>>(
        &self,
        roots: &[P],
        on_progress: Option<ProgressCallback<'_>>,
        cancel: Option<&CancelToken>,
    ) -> ScanResult {
        let mut combined = ScanResult::default();

        let Some(callback) = on_progress else {
            for root in roots {
                if is_cancelled(cancel) {
                    break;
                }
                combined.merge(self.scan_directory(root.as_ref(), None, cancel));
            }
            return combined;
        };

        let mut total = 0;
        for root in roots {
            total += self.count_files(root.as_ref(), cancel);
            if is_cancelled(cancel) {
                return combined;
            }
        }

        let mut tracker = ProgressTracker {
            callback,
            offset: 0,
            total,
        };

        for root in roots {
            let root = absolute_root(root.as_ref());
            let root = root.as_path();
            if is_cancelled(cancel) {
                break;
            }
            if !root.is_dir() {
                continue;
            }

            tracker.report(0, root);
            let mut dir_result = ScanResult::default();
            let processed = self.scan_into(root, &mut dir_result, Some(&mut tracker), cancel);
            tracker.offset += processed;
            combined.merge(dir_result);
        }

        combined
    }

    /// Classifies every eligible file under `root` into `result`.
    /// Returns the number of files recorded.
    fn scan_into(
        &self,
        root: &Path,
        result: &mut ScanResult,
        mut tracker: Option<&mut ProgressTracker<'_>>,
        cancel: Option<&CancelToken>,
    ) -> usize {
        let mut processed = 0;

        self.walk(root, cancel, &mut |entry| {
            let path = entry.path();
            // DirEntry::metadata does not follow symlinks
            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(source) => {
                    debug!("Skipping entry: {}", DatafluxError::Access { path, source });
                    return;
                }
            };

            let extension = dotted_extension(&path);
            let category = classify(&extension);
            result.record(category, path.clone(), extension, size);
            processed += 1;

            if let Some(tracker) = tracker.as_deref_mut() {
                tracker.report(processed, &path);
            }
        });

        processed
    }

    /// Iterative traversal shared by counting, collecting and scanning.
    ///
    /// `visit` is called for every non-hidden regular file that passes the
    /// filters. Cancellation is checked on every directory pop and entry.
    fn walk(&self, root: &Path, cancel: Option<&CancelToken>, visit: &mut dyn FnMut(&DirEntry)) {
        if !root.is_dir() {
            return;
        }

        let mut stack = vec![root.to_path_buf()];

        while let Some(current_dir) = stack.pop() {
            if is_cancelled(cancel) {
                break;
            }

            let entries = match fs::read_dir(&current_dir) {
                Ok(entries) => entries,
                Err(source) => {
                    debug!(
                        "Skipping subtree: {}",
                        DatafluxError::Access {
                            path: current_dir.clone(),
                            source
                        }
                    );
                    continue;
                }
            };

            for entry in entries {
                if is_cancelled(cancel) {
                    break;
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(source) => {
                        debug!(
                            "Skipping entry: {}",
                            DatafluxError::Access {
                                path: current_dir.clone(),
                                source
                            }
                        );
                        continue;
                    }
                };

                if is_hidden(&entry.file_name()) {
                    continue;
                }

                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(source) => {
                        debug!(
                            "Skipping entry: {}",
                            DatafluxError::Access {
                                path: entry.path(),
                                source
                            }
                        );
                        continue;
                    }
                };

                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file() && self.filters.should_include(&entry.path()) {
                    visit(&entry);
                }
            }
        }
    }
}
