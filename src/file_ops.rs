/// Filesystem operations behind rule application.
///
/// This module picks collision-free destination names and carries out the
/// move, copy and link operations, creating destination directories as
/// needed. Nothing here runs in dry-run mode except the read-only path
/// resolution.
use crate::error::{DatafluxError, Result};
use crate::rules::OperationKind;
use log::debug;
use std::collections::HashSet;
use std::fs::{self, File, FileTimes};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Picks a free path for `file_name` inside `directory`.
///
/// Returns `directory/name.ext` when nothing is there, otherwise the first of
/// `name_01.ext`, `name_02.ext`, … that neither exists on disk nor appears in
/// `reserved`. The directory is not created and nothing is written, so two
/// calls without an intervening write return the same path.
///
/// The check is not atomic: a concurrent writer can take the returned name
/// before the caller uses it.
///
/// # Examples
///
/// ```no_run
/// use dataflux::file_ops::resolve_unique_path;
/// use std::collections::HashSet;
/// use std::path::Path;
///
/// let target = resolve_unique_path(Path::new("/out/large_videos"), "clip.mp4", &HashSet::new());
/// println!("{}", target.display());
/// ```
pub fn resolve_unique_path(directory: &Path, file_name: &str, reserved: &HashSet<PathBuf>) -> PathBuf {
    let is_free = |candidate: &Path| !candidate.exists() && !reserved.contains(candidate);

    let base_path = directory.join(file_name);
    if is_free(&base_path) {
        return base_path;
    }

    let as_path = Path::new(file_name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let suffix = match as_path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => String::new(),
    };

    let mut counter: u32 = 1;
    loop {
        let candidate = directory.join(format!("{}_{:02}{}", stem, counter, suffix));
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Performs `operation` from `source` to `target`, creating the target's
/// parent directories first.
///
/// * `Move` renames, falling back to copy-and-delete across filesystems.
/// * `Copy` duplicates content, permission bits and timestamps.
/// * `Link` creates a hard link, or fails with
///   [`DatafluxError::UnsupportedOperation`]; it never falls back to a copy.
pub fn execute_operation(source: &Path, target: &Path, operation: OperationKind) -> Result<()> {
    let op_error = |e: std::io::Error| DatafluxError::Operation {
        operation,
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(op_error)?;
    }

    match operation {
        OperationKind::Move => match fs::rename(source, target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                debug!(
                    "Rename across filesystems, copying {} instead",
                    source.display()
                );
                copy_with_metadata(source, target).map_err(op_error)?;
                fs::remove_file(source).map_err(op_error)
            }
            Err(e) => Err(op_error(e)),
        },
        OperationKind::Copy => copy_with_metadata(source, target).map_err(op_error),
        OperationKind::Link => match fs::hard_link(source, target) {
            Ok(()) => Ok(()),
            Err(e) if matches!(e.kind(), ErrorKind::Unsupported | ErrorKind::CrossesDevices) => {
                Err(DatafluxError::UnsupportedOperation {
                    operation,
                    from: source.to_path_buf(),
                    to: target.to_path_buf(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(op_error(e)),
        },
    }
}

/// Copies content and permissions, then carries over access and
/// modification times.
fn copy_with_metadata(source: &Path, target: &Path) -> std::io::Result<()> {
    fs::copy(source, target)?;

    let metadata = fs::metadata(source)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }

    match File::options().write(true).open(target) {
        Ok(file) => {
            if let Err(e) = file.set_times(times) {
                debug!("Could not preserve timestamps on {}: {}", target.display(), e);
            }
        }
        Err(e) => debug!("Could not preserve timestamps on {}: {}", target.display(), e),
    }

    Ok(())
}
