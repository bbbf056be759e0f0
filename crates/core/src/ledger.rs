//! Deferred deletions for one transaction.
//!
//! The reference assigner appends the path of every stored file it supersedes; only the
//! committer drains the ledger, and only after the record store has committed. An aborted
//! transaction discards its ledger without touching the filesystem.

use std::path::{Path, PathBuf};

/// Ordered, append-only list of absolute paths to delete after commit.
#[derive(Debug, Default)]
pub struct DeletionLedger {
    candidates: Vec<PathBuf>,
}

impl DeletionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: PathBuf) {
        tracing::debug!(path = %path.display(), "Scheduled for deletion after commit");
        self.candidates.push(path);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.candidates.iter().map(PathBuf::as_path)
    }

    /// Takes every candidate, leaving the ledger empty.
    pub(crate) fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.candidates)
    }

    /// Drops every candidate without deleting anything. Returns how many were dropped.
    pub(crate) fn discard(&mut self) -> usize {
        let discarded = self.candidates.len();
        self.candidates.clear();
        discarded
    }
}
