//! Persistence lifecycle entry points.
//!
//! [`UploadListener`] holds the configuration shared by every transaction: the path layout and
//! the storage root. It is cheap to clone and holds no per-transaction state.
//!
//! [`UploadListener::begin`] hands out an [`UploadTransaction`], which owns everything scoped to
//! one flush: the deletion ledger, the names assigned so far, and the files materialized so far.
//! The transaction is driven by whatever flushes the record store, in this order:
//!
//! 1. [`UploadTransaction::before_commit_prepare`] with the pending batch
//! 2. [`UploadTransaction::before_insert`] for each new carrier
//! 3. [`UploadTransaction::after_write`] after each successful insert or update
//! 4. [`UploadTransaction::after_commit`] once the store has committed, or
//!    [`UploadTransaction::abort_with`] with the same batch if anything failed
//!
//! [`UnitOfWork`](crate::UnitOfWork) drives this sequence for record stores that implement
//! [`RecordStore`](crate::RecordStore).

use crate::commit::{CommitReport, Committer};
use crate::config::UploadConfig;
use crate::ledger::DeletionLedger;
use crate::materialize::{MaterializedUpload, Materializer, ReturnFailure};
use crate::paths::PathNamer;
use crate::references::ReferenceAssigner;
use crate::{UploadCarrier, UploadResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use upload_files::UploadStore;

#[derive(Clone, Debug)]
pub struct UploadListener {
    namer: PathNamer,
    store: UploadStore,
}

impl UploadListener {
    /// Creates a listener storing uploads under `base_path`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::Files`](crate::UploadError::Files) if `base_path` is relative,
    /// contains `..`, or exists and is not a directory.
    pub fn new(base_path: &Path) -> UploadResult<Self> {
        let store = UploadStore::new(base_path)?;
        Ok(Self {
            namer: PathNamer::new(base_path),
            store,
        })
    }

    /// Creates a listener from resolved configuration.
    ///
    /// Returns `Ok(None)` when no base path is configured; upload handling is then inert and
    /// carriers are persisted without any file handling.
    pub fn from_config(config: &UploadConfig) -> UploadResult<Option<Self>> {
        match config.base_path() {
            Some(base_path) => {
                tracing::info!(base_path = %base_path.display(), "Upload handling enabled");
                Self::new(base_path).map(Some)
            }
            None => {
                tracing::info!("No upload base path configured, upload handling disabled");
                Ok(None)
            }
        }
    }

    pub fn base_path(&self) -> &Path {
        self.namer.base_path()
    }

    pub fn namer(&self) -> &PathNamer {
        &self.namer
    }

    /// Starts a new transaction with an empty ledger.
    pub fn begin(&self) -> UploadTransaction {
        UploadTransaction {
            assigner: ReferenceAssigner::new(self.namer.clone()),
            materializer: Materializer::new(self.namer.clone(), self.store.clone()),
            committer: Committer::new(self.store.clone()),
            ledger: DeletionLedger::new(),
        }
    }
}

/// What [`UploadTransaction::abort_with`] undid.
#[derive(Debug, Default)]
pub struct AbortReport {
    /// Deletion candidates dropped without touching the filesystem.
    pub discarded: usize,
    /// Files materialized by the aborted transaction and moved back to staging.
    pub returned: usize,
    /// Carrier fields whose stored file name and pending upload were put back.
    pub restored: usize,
    /// Files left in the store; their restored uploads point at the stored copy.
    pub failures: Vec<ReturnFailure>,
}

/// Upload state scoped to one record store transaction.
///
/// Dropping a transaction without calling [`after_commit`](Self::after_commit) or
/// [`abort_with`](Self::abort_with) deletes nothing; files it already materialized stay on disk.
#[derive(Debug)]
pub struct UploadTransaction {
    assigner: ReferenceAssigner,
    materializer: Materializer,
    committer: Committer,
    ledger: DeletionLedger,
}

impl UploadTransaction {
    /// Assigns stored file names for every carrier in the pending batch.
    ///
    /// Runs before anything is written to the record store. Carriers without pending uploads
    /// only receive the base path.
    ///
    /// # Errors
    ///
    /// Any error means the flush must not proceed. Call [`abort`](Self::abort).
    pub fn before_commit_prepare<'c, C, I>(&mut self, carriers: I) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized + 'c,
        I: IntoIterator<Item = &'c mut C>,
    {
        self.assigner.prepare_all(carriers, &mut self.ledger)
    }

    /// Assigns names for a carrier about to be inserted.
    ///
    /// Fields already named by [`before_commit_prepare`](Self::before_commit_prepare) are left
    /// unchanged.
    pub fn before_insert<C>(&mut self, carrier: &mut C) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized,
    {
        self.assigner.prepare_one(carrier, &mut self.ledger)
    }

    /// Materializes the carrier's pending uploads after its insert or update succeeded.
    ///
    /// # Errors
    ///
    /// A failure here must abort the transaction; the stored file name would otherwise reference
    /// bytes that do not exist.
    pub fn after_write<C>(&mut self, carrier: &mut C) -> UploadResult<usize>
    where
        C: UploadCarrier + ?Sized,
    {
        self.materializer.materialize(carrier)
    }

    /// Deletes superseded files after the record store committed.
    ///
    /// Never fails; see [`CommitReport`] for what could not be deleted. The transaction can be
    /// reused afterwards.
    pub fn after_commit(&mut self) -> CommitReport {
        let report = self.committer.commit(&mut self.ledger);
        self.materializer.settle();
        self.assigner.reset();
        report
    }

    /// Abandons the transaction and puts `carriers` back the way they were before it.
    ///
    /// The ledger is discarded, so every previously stored file survives. Files materialized by
    /// this transaction move back to their staged paths. Every field this transaction named gets
    /// its previous stored file name and its pending upload back, so flushing the same carriers
    /// again starts over cleanly.
    pub fn abort_with<'c, C, I>(&mut self, carriers: I) -> AbortReport
    where
        C: UploadCarrier + ?Sized + 'c,
        I: IntoIterator<Item = &'c mut C>,
    {
        let discarded = self.ledger.discard();
        let (returned, failures) = self.materializer.discard();
        let relocated: HashMap<PathBuf, PathBuf> = failures
            .iter()
            .map(|failure| (failure.upload.staged.clone(), failure.upload.stored.clone()))
            .collect();

        let mut restored = 0;
        for carrier in carriers {
            match self.assigner.restore(carrier, &relocated) {
                Ok(count) => restored += count,
                Err(error) => {
                    tracing::warn!(error = %error, "Failed to restore carrier after abort");
                }
            }
        }
        self.assigner.reset();

        tracing::info!(
            discarded,
            returned,
            restored,
            failed = failures.len(),
            "Upload transaction aborted"
        );

        AbortReport {
            discarded,
            returned,
            restored,
            failures,
        }
    }

    /// Abandons the transaction without restoring any carrier.
    ///
    /// Files still move back to staging, but carriers keep the names this transaction gave
    /// them. Use [`abort_with`](Self::abort_with) when the batch is still at hand.
    pub fn abort(&mut self) -> AbortReport {
        self.abort_with(std::iter::empty::<&mut dyn UploadCarrier>())
    }

    pub fn ledger(&self) -> &DeletionLedger {
        &self.ledger
    }

    /// Files materialized so far in this transaction.
    pub fn materialized(&self) -> &[MaterializedUpload] {
        self.materializer.materialized()
    }
}

impl Drop for UploadTransaction {
    fn drop(&mut self) {
        if !self.ledger.is_empty() || !self.materializer.materialized().is_empty() {
            tracing::warn!(
                pending_deletions = self.ledger.len(),
                materialized = self.materializer.materialized().len(),
                "Upload transaction dropped without commit or abort"
            );
        }
    }
}
