//! Post-commit deletion of superseded files.

use crate::ledger::DeletionLedger;
use std::path::PathBuf;
use upload_files::{FilesError, Removal, UploadStore};

/// A ledger entry that could not be deleted. The file is left orphaned on disk.
#[derive(Debug)]
pub struct DeletionFailure {
    pub path: PathBuf,
    pub error: FilesError,
}

/// What happened to each ledger entry during [`Committer::commit`].
#[derive(Debug, Default)]
pub struct CommitReport {
    pub deleted: usize,
    pub already_gone: usize,
    pub failures: Vec<DeletionFailure>,
}

impl CommitReport {
    /// True if nothing was left orphaned.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of ledger entries processed.
    pub fn attempted(&self) -> usize {
        self.deleted + self.already_gone + self.failures.len()
    }
}

/// Executes the deletion ledger once the record store has committed.
///
/// Deletions are best effort. A failure never propagates: the data commit already happened and
/// must not be undone, so each failure is logged at `warn` and collected in the report.
#[derive(Debug, Clone)]
pub struct Committer {
    store: UploadStore,
}

impl Committer {
    pub fn new(store: UploadStore) -> Self {
        Self { store }
    }

    /// Deletes every candidate in `ledger`, in order, leaving the ledger empty.
    pub fn commit(&self, ledger: &mut DeletionLedger) -> CommitReport {
        let mut report = CommitReport::default();

        for path in ledger.drain() {
            match self.store.remove(&path) {
                Ok(Removal::Deleted) => {
                    tracing::debug!(path = %path.display(), "Deleted superseded upload");
                    report.deleted += 1;
                }
                Ok(Removal::AlreadyGone) => {
                    tracing::debug!(path = %path.display(), "Superseded upload already gone");
                    report.already_gone += 1;
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        path = %path.display(),
                        "Failed to delete superseded upload, file left orphaned"
                    );
                    report.failures.push(DeletionFailure { path, error });
                }
            }
        }

        if report.attempted() > 0 {
            tracing::info!(
                deleted = report.deleted,
                already_gone = report.already_gone,
                failed = report.failures.len(),
                "Superseded uploads processed"
            );
        }

        report
    }
}
