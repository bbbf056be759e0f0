//! Flush driver tying a record store to the upload lifecycle.
//!
//! A [`UnitOfWork`] receives the explicit batch of pending writes and runs them against a
//! [`RecordStore`] inside one store transaction:
//!
//! 1. assign stored file names for the whole batch (nothing written yet)
//! 2. `begin` the store transaction
//! 3. for each write: assign names (inserts only), write the record, materialize its uploads
//! 4. `commit`, then delete superseded files
//!
//! Any failure in steps 1 to 4 rolls the store back and aborts the upload transaction. The
//! previously stored files survive, files materialized by this flush go back to staging, and
//! every record gets its previous stored file names and pending uploads back, so the same batch
//! can be flushed again. Deletion failures after the commit never fail the flush; they are
//! reported in the [`CommitReport`].

use crate::commit::CommitReport;
use crate::config::UploadConfig;
use crate::listener::{UploadListener, UploadTransaction};
use crate::{UploadCarrier, UploadError, UploadResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

/// One record scheduled for writing in the next flush.
pub struct PendingWrite<'a, R: ?Sized> {
    kind: WriteKind,
    record: &'a mut R,
}

impl<'a, R: ?Sized> PendingWrite<'a, R> {
    pub fn insert(record: &'a mut R) -> Self {
        Self {
            kind: WriteKind::Insert,
            record,
        }
    }

    pub fn update(record: &'a mut R) -> Self {
        Self {
            kind: WriteKind::Update,
            record,
        }
    }

    pub fn kind(&self) -> WriteKind {
        self.kind
    }

    pub fn record(&self) -> &R {
        self.record
    }
}

/// Transactional persistence for records of type `R`.
///
/// Implementations must not make writes visible before [`commit`](Self::commit) returns `Ok`,
/// and [`rollback`](Self::rollback) must discard every write since [`begin`](Self::begin).
pub trait RecordStore<R: ?Sized> {
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin(&mut self) -> Result<(), Self::Error>;

    fn insert(&mut self, record: &R) -> Result<(), Self::Error>;

    fn update(&mut self, record: &R) -> Result<(), Self::Error>;

    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Best effort; called after any failure once `begin` may have run.
    fn rollback(&mut self);
}

#[derive(Debug, thiserror::Error)]
pub enum FlushError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("record store error: {0}")]
    Store(#[source] E),
}

pub struct UnitOfWork<S> {
    store: S,
    uploads: Option<UploadListener>,
}

impl<S> UnitOfWork<S> {
    /// A unit of work without upload handling.
    pub fn new(store: S) -> Self {
        Self {
            store,
            uploads: None,
        }
    }

    pub fn with_uploads(store: S, uploads: UploadListener) -> Self {
        Self {
            store,
            uploads: Some(uploads),
        }
    }

    /// Enables upload handling only if `config` names a base path.
    pub fn from_config(store: S, config: &UploadConfig) -> UploadResult<Self> {
        Ok(Self {
            store,
            uploads: UploadListener::from_config(config)?,
        })
    }

    pub fn uploads(&self) -> Option<&UploadListener> {
        self.uploads.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Writes the batch in one store transaction with upload handling around it.
    ///
    /// # Returns
    ///
    /// The outcome of the post-commit deletions. Empty when upload handling is disabled.
    ///
    /// # Errors
    ///
    /// Returns `FlushError` if name assignment, a store write, materialization, or the store
    /// commit fails. Nothing is committed, no previously stored file is deleted, and the records
    /// in `writes` are left as they were before the flush.
    pub fn flush<R>(
        &mut self,
        writes: &mut [PendingWrite<'_, R>],
    ) -> Result<CommitReport, FlushError<S::Error>>
    where
        S: RecordStore<R>,
        R: UploadCarrier + ?Sized,
    {
        let mut tx = self.uploads.as_ref().map(UploadListener::begin);

        if let Some(tx) = tx.as_mut() {
            let prepared = tx.before_commit_prepare(writes.iter_mut().map(|w| &mut *w.record));
            if let Err(err) = prepared {
                tx.abort_with(writes.iter_mut().map(|w| &mut *w.record));
                return Err(err.into());
            }
        }

        let store = &mut self.store;
        let result = (|| -> Result<(), FlushError<S::Error>> {
            store.begin().map_err(FlushError::Store)?;

            for write in writes.iter_mut() {
                let record = &mut *write.record;
                if let (Some(tx), WriteKind::Insert) = (tx.as_mut(), write.kind) {
                    tx.before_insert(record)?;
                }

                match write.kind {
                    WriteKind::Insert => store.insert(record),
                    WriteKind::Update => store.update(record),
                }
                .map_err(FlushError::Store)?;

                if let Some(tx) = tx.as_mut() {
                    tx.after_write(record)?;
                }
            }

            store.commit().map_err(FlushError::Store)
        })();

        match result {
            Ok(()) => {
                tracing::debug!(writes = writes.len(), "Flush committed");
                Ok(tx.as_mut().map(UploadTransaction::after_commit).unwrap_or_default())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Flush failed, rolling back");
                self.store.rollback();
                if let Some(tx) = tx.as_mut() {
                    tx.abort_with(writes.iter_mut().map(|w| &mut *w.record));
                }
                Err(err)
            }
        }
    }
}
