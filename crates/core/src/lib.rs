//! # Upload Core
//!
//! Lifecycle coordination for file uploads attached to persisted records.
//!
//! This crate decides *when* upload bytes move and *when* superseded files are deleted, relative
//! to the record store's own transaction:
//! - Stored file names are assigned before anything is written to the store
//! - Staged bytes are moved into place only after the carrier's write succeeded
//! - Superseded files are deleted only after the store has committed
//! - An aborted flush deletes nothing that was stored before it
//!
//! Filesystem primitives live in `upload_files`; tokens and stored file names live in
//! `upload_token`. **No upload transport concerns**: receiving bytes and staging them is the
//! caller's job.

pub mod carrier;
pub mod commit;
pub mod config;
pub mod constants;
pub mod error;
pub mod ledger;
pub mod listener;
pub mod materialize;
pub mod paths;
pub mod references;
pub mod unit_of_work;

#[cfg(test)]
pub(crate) mod testing;

pub use carrier::{ExtensionHint, PendingUpload, UploadCarrier};
pub use commit::{CommitReport, Committer, DeletionFailure};
pub use config::UploadConfig;
pub use error::{UploadError, UploadResult};
pub use ledger::DeletionLedger;
pub use listener::{AbortReport, UploadListener, UploadTransaction};
pub use materialize::{MaterializedUpload, Materializer, ReturnFailure};
pub use paths::PathNamer;
pub use references::ReferenceAssigner;
pub use unit_of_work::{FlushError, PendingWrite, RecordStore, UnitOfWork, WriteKind};
