//! Stored file name assignment, run before any write reaches the record store.
//!
//! For every field with a pending upload the assigner:
//!
//! 1. reads the carrier's current stored file name,
//! 2. writes a fresh `<token>.<ext>` name onto the carrier,
//! 3. queues the previous name's full path on the [`DeletionLedger`], if there was one.
//!
//! No filesystem I/O happens here and nothing is deleted.
//!
//! The assigner remembers every name it handed out during the current transaction. That set is
//! used twice: a freshly generated name that clashes with it is regenerated, and a field whose
//! current name came from this same transaction is left alone. The second rule makes the
//! before-insert notification a safe no-op for carriers already prepared by
//! before-commit-prepare.
//!
//! Each assignment also records what it replaced: the previous stored name and the pending
//! upload. [`ReferenceAssigner::restore`] puts both back when the transaction aborts.

use crate::carrier::report_violation;
use crate::constants::MAX_NAME_ATTEMPTS;
use crate::ledger::DeletionLedger;
use crate::paths::PathNamer;
use crate::{PendingUpload, UploadCarrier, UploadError, UploadResult};
use std::collections::HashMap;
use std::path::PathBuf;
use upload_token::FileToken;

/// What one field looked like before this transaction named it.
#[derive(Debug)]
struct Assignment {
    previous: Option<String>,
    upload: PendingUpload,
}

#[derive(Debug)]
pub struct ReferenceAssigner {
    namer: PathNamer,
    /// Keyed by the new stored file name.
    assigned: HashMap<String, Assignment>,
    token_source: fn() -> FileToken,
}

impl ReferenceAssigner {
    pub fn new(namer: PathNamer) -> Self {
        Self {
            namer,
            assigned: HashMap::new(),
            token_source: FileToken::new,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_token_source(namer: PathNamer, token_source: fn() -> FileToken) -> Self {
        Self {
            token_source,
            ..Self::new(namer)
        }
    }

    /// Prepares every carrier in the batch that has at least one pending upload.
    ///
    /// Every carrier receives the base upload path, whether or not it has uploads.
    ///
    /// # Returns
    ///
    /// The number of new stored file names assigned across the batch.
    ///
    /// # Errors
    ///
    /// Stops at the first failing carrier; see [`Self::prepare_one`].
    pub fn prepare_all<'c, C, I>(
        &mut self,
        carriers: I,
        ledger: &mut DeletionLedger,
    ) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized + 'c,
        I: IntoIterator<Item = &'c mut C>,
    {
        let mut assigned = 0;
        for carrier in carriers {
            carrier.set_file_upload_path(self.namer.base_path());
            if carrier.has_file_uploads().map_err(report_violation)? {
                assigned += self.prepare_one(carrier, ledger)?;
            }
        }
        Ok(assigned)
    }

    /// Assigns new stored file names to every pending field of one carrier.
    ///
    /// # Returns
    ///
    /// The number of fields that received a new name. Fields already named by this transaction
    /// are skipped and not counted.
    ///
    /// # Errors
    ///
    /// - [`UploadError::ContractViolation`] if the carrier reports a field it has no accessors for
    /// - [`UploadError::NameExhausted`] if no unique name could be generated
    pub fn prepare_one<C>(
        &mut self,
        carrier: &mut C,
        ledger: &mut DeletionLedger,
    ) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized,
    {
        carrier.set_file_upload_path(self.namer.base_path());

        let type_name = carrier.type_name().to_owned();
        let pending: Vec<(&'static str, PendingUpload)> = carrier
            .file_uploads()
            .map_err(report_violation)?
            .into_iter()
            .map(|(field, upload)| (field, upload.clone()))
            .collect();

        let mut assigned = 0;
        for (field, upload) in pending {
            let previous = carrier
                .file_name(field)
                .map_err(report_violation)?
                .filter(|name| !name.is_empty())
                .map(str::to_owned);

            if previous
                .as_ref()
                .is_some_and(|name| self.assigned.contains_key(name))
            {
                tracing::trace!(
                    type_name = %type_name,
                    field,
                    "Field already prepared in this transaction"
                );
                continue;
            }

            let file_name =
                self.generate_unique(&type_name, field, &upload.hint().extension())?;
            carrier
                .set_file_name(field, Some(file_name.clone()))
                .map_err(report_violation)?;

            if let Some(previous) = &previous {
                ledger.push(self.namer.full_path(&type_name, field, previous));
            }
            self.assigned
                .insert(file_name.clone(), Assignment { previous, upload });
            tracing::debug!(
                type_name = %type_name,
                field,
                file_name = %file_name,
                "Assigned stored file name"
            );
            assigned += 1;
        }

        Ok(assigned)
    }

    /// Puts back the stored file name and pending upload of every field this transaction named.
    ///
    /// Fields whose pending upload was cleared by materialization get it back. `relocated` maps
    /// a staged path to where its bytes are now, for files that could not be returned to
    /// staging.
    ///
    /// # Returns
    ///
    /// The number of fields restored.
    pub(crate) fn restore<C>(
        &self,
        carrier: &mut C,
        relocated: &HashMap<PathBuf, PathBuf>,
    ) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized,
    {
        let fields = carrier.upload_fields().to_vec();

        let mut restored = 0;
        for field in fields {
            let assignment = carrier
                .file_name(field)
                .map_err(report_violation)?
                .and_then(|name| self.assigned.get(name));
            let Some(assignment) = assignment else {
                continue;
            };

            carrier
                .set_file_name(field, assignment.previous.clone())
                .map_err(report_violation)?;
            if carrier.file_upload(field).map_err(report_violation)?.is_none() {
                let upload = match relocated.get(assignment.upload.staged_path()) {
                    Some(current) => {
                        PendingUpload::new(current.clone(), assignment.upload.hint().clone())
                    }
                    None => assignment.upload.clone(),
                };
                carrier
                    .set_file_upload(field, Some(upload))
                    .map_err(report_violation)?;
            }
            restored += 1;
        }

        Ok(restored)
    }

    /// Forgets the names assigned so far; called when a transaction ends.
    pub(crate) fn reset(&mut self) {
        self.assigned.clear();
    }

    fn generate_unique(
        &self,
        type_name: &str,
        field: &str,
        extension: &str,
    ) -> UploadResult<String> {
        for _attempt in 0..MAX_NAME_ATTEMPTS {
            let candidate = (self.token_source)().file_name(extension);
            if !self.assigned.contains_key(&candidate) {
                return Ok(candidate);
            }
            tracing::warn!(
                type_name,
                field,
                candidate = %candidate,
                "Generated file name collided, retrying"
            );
        }

        Err(UploadError::NameExhausted {
            type_name: type_name.to_owned(),
            field: field.to_owned(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}
