//! Moving staged bytes into place once the record store has accepted a write.
//!
//! The [`Materializer`] runs per carrier, after that carrier's insert or update succeeded and
//! before the surrounding transaction commits. It is the one phase where a filesystem failure is
//! fatal: a stored file name must never be committed without bytes behind it.
//!
//! Each file it stores is remembered with the staged path it came from until the transaction
//! ends, so an abort can hand the bytes back to staging.

use crate::carrier::report_violation;
use crate::paths::PathNamer;
use crate::{UploadCarrier, UploadError, UploadResult};
use std::path::PathBuf;
use upload_files::{FilesError, UploadStore};

/// A file stored by the current transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaterializedUpload {
    pub stored: PathBuf,
    pub staged: PathBuf,
}

/// A materialized file that could not be moved back to staging. It stays at `stored`.
#[derive(Debug)]
pub struct ReturnFailure {
    pub upload: MaterializedUpload,
    pub error: FilesError,
}

#[derive(Debug)]
pub struct Materializer {
    namer: PathNamer,
    store: UploadStore,
    materialized: Vec<MaterializedUpload>,
}

impl Materializer {
    pub fn new(namer: PathNamer, store: UploadStore) -> Self {
        Self {
            namer,
            store,
            materialized: Vec::new(),
        }
    }

    /// Moves every pending upload on `carrier` to its assigned path and clears it.
    ///
    /// Calling this again without a new pending upload does nothing.
    ///
    /// # Returns
    ///
    /// The number of uploads moved.
    ///
    /// # Errors
    ///
    /// - [`UploadError::UnassignedFileName`] if a pending field has no stored file name
    /// - [`UploadError::Materialization`] if the bytes could not be moved; the pending upload is
    ///   left in place
    /// - [`UploadError::ContractViolation`] for undeclared fields
    pub fn materialize<C>(&mut self, carrier: &mut C) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized,
    {
        let type_name = carrier.type_name().to_owned();
        let pending: Vec<(&'static str, PathBuf)> = carrier
            .file_uploads()
            .map_err(report_violation)?
            .into_iter()
            .map(|(field, upload)| (field, upload.staged_path().to_path_buf()))
            .collect();

        for (field, staged) in &pending {
            let file_name = carrier
                .file_name(field)
                .map_err(report_violation)?
                .filter(|name| !name.is_empty())
                .map(str::to_owned)
                .ok_or_else(|| UploadError::UnassignedFileName {
                    type_name: type_name.clone(),
                    field: (*field).to_owned(),
                })?;

            let directory = self.namer.directory_for(&type_name, field);
            let stored = self
                .store
                .move_into(staged, &directory, &file_name)
                .map_err(|source| UploadError::Materialization {
                    type_name: type_name.clone(),
                    field: (*field).to_owned(),
                    source,
                })?;

            self.materialized.push(MaterializedUpload {
                stored,
                staged: staged.clone(),
            });
            carrier
                .set_file_upload(field, None)
                .map_err(report_violation)?;

            tracing::debug!(
                type_name = %type_name,
                field,
                file_name = %file_name,
                "Materialized upload"
            );
        }

        Ok(pending.len())
    }

    /// Files stored in the current transaction.
    pub fn materialized(&self) -> &[MaterializedUpload] {
        &self.materialized
    }

    /// Keeps everything materialized so far; called after a successful commit.
    pub(crate) fn settle(&mut self) {
        self.materialized.clear();
    }

    /// Moves every file materialized in the current transaction back to its staged path.
    ///
    /// Best effort: a file that cannot be moved back is kept where it is, logged, and returned
    /// as a [`ReturnFailure`].
    pub(crate) fn discard(&mut self) -> (usize, Vec<ReturnFailure>) {
        let mut returned = 0;
        let mut failures = Vec::new();

        for upload in std::mem::take(&mut self.materialized).into_iter().rev() {
            match self.store.move_out(&upload.stored, &upload.staged) {
                Ok(()) => returned += 1,
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        stored = %upload.stored.display(),
                        staged = %upload.staged.display(),
                        "Failed to return upload to staging, keeping stored copy"
                    );
                    failures.push(ReturnFailure { upload, error });
                }
            }
        }

        (returned, failures)
    }
}
