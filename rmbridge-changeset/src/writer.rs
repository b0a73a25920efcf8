//! Change-set and error-log files.
//!
//! Files are written to `<path>.tmp` and renamed into place. A file whose
//! content already matches is left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use crate::compiler::ChangeSet;
use crate::error::{io_err, SyncError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf },
    /// The file already holds exactly this content.
    Unchanged { path: PathBuf },
    /// `--dry-run`: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

/// `<dir>/<module id>-change-set.yaml`; `/` in ids becomes `~`.
pub fn change_set_path(dir: &Path, module_id: &str) -> PathBuf {
    dir.join(format!("{}-change-set.yaml", module_id.replace('/', "~")))
}

pub fn write_change_set(
    dir: &Path,
    change_set: &ChangeSet,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let content = change_set.to_yaml()?;
    atomic_write(&change_set_path(dir, &change_set.module_id), &content, dry_run)
}

/// Write the error banners of a run; returns `None` when there are none.
pub fn write_error_log(
    path: &Path,
    report: Option<&str>,
    dry_run: bool,
) -> Result<Option<WriteResult>, SyncError> {
    match report {
        Some(report) => atomic_write(path, &format!("{report}\n"), dry_run).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn atomic_write(
    path: &Path,
    content: &str,
    dry_run: bool,
) -> Result<WriteResult, SyncError> {
    let content = content.replace("\r\n", "\n");

    match fs::read_to_string(path) {
        Ok(existing) if existing == content => {
            tracing::debug!("unchanged: {}", path.display());
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }

    if dry_run {
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
        });
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    fs::write(&tmp, &content).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }

    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn slashes_in_module_ids_are_replaced() {
        let path = change_set_path(Path::new("out"), "project/doc");
        assert_eq!(path, PathBuf::from("out/project~doc-change-set.yaml"));
    }

    #[test]
    fn second_identical_write_is_unchanged() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("nested").join("a.yaml");

        let first = atomic_write(&path, "a: 1\n", false).expect("write");
        assert!(matches!(first, WriteResult::Written { .. }));
        let second = atomic_write(&path, "a: 1\r\n", false).expect("write");
        assert!(matches!(second, WriteResult::Unchanged { .. }));
        assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("a.yaml");
        let result = atomic_write(&path, "a: 1\n", true).expect("dry run");
        assert_eq!(result, WriteResult::WouldWrite { path: path.clone() });
        assert!(!path.exists());
    }

    #[test]
    fn no_report_no_error_log() {
        let dir = TempDir::new().expect("tmp");
        let path = dir.path().join("errors.txt");
        assert!(write_error_log(&path, None, false).expect("log").is_none());
        assert!(!path.exists());
    }
}
