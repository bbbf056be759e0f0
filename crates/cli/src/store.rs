//! JSON-file record store for [`Document`]s.
//!
//! Each record lives at `<dir>/<id>.json`. Writes inside a transaction go to `<id>.json.tmp`
//! and only replace the real file on commit; rollback removes the temporaries.

use crate::document::Document;
use std::fs;
use std::path::{Path, PathBuf};
use upload_core::RecordStore;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(Uuid),
    #[error("record {0} already exists")]
    AlreadyExists(Uuid),
    #[error("no transaction in progress")]
    NoTransaction,
    #[error("failed to create records directory: {0}")]
    DirCreation(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize record: {0}")]
    Deserialization(serde_json::Error),
}

#[derive(Debug)]
pub struct JsonRecordStore {
    dir: PathBuf,
    /// (temporary, final) pairs written in the current transaction.
    staged: Vec<(PathBuf, PathBuf)>,
    active: bool,
}

impl JsonRecordStore {
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).map_err(StoreError::DirCreation)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            staged: Vec::new(),
            active: false,
        })
    }

    /// Where the CLI stages incoming files before a flush.
    pub fn staging_dir(&self) -> PathBuf {
        self.dir.join(".staging")
    }

    pub fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    pub fn load(&self, id: Uuid) -> Result<Document, StoreError> {
        let path = self.record_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id))
            }
            Err(e) => return Err(StoreError::FileRead(e)),
        };
        serde_json::from_str(&contents).map_err(StoreError::Deserialization)
    }

    fn stage(&mut self, record: &Document) -> Result<(), StoreError> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }

        let target = self.record_path(record.id);
        let temporary = self.dir.join(format!("{}.json.tmp", record.id));
        let json = serde_json::to_string_pretty(record).map_err(StoreError::Serialization)?;
        fs::write(&temporary, json).map_err(StoreError::FileWrite)?;

        tracing::debug!(id = %record.id, "Record staged");
        self.staged.push((temporary, target));
        Ok(())
    }
}

impl RecordStore<Document> for JsonRecordStore {
    type Error = StoreError;

    fn begin(&mut self) -> Result<(), Self::Error> {
        self.staged.clear();
        self.active = true;
        Ok(())
    }

    fn insert(&mut self, record: &Document) -> Result<(), Self::Error> {
        if self.record_path(record.id).exists() {
            return Err(StoreError::AlreadyExists(record.id));
        }
        self.stage(record)
    }

    fn update(&mut self, record: &Document) -> Result<(), Self::Error> {
        if !self.record_path(record.id).exists() {
            return Err(StoreError::NotFound(record.id));
        }
        self.stage(record)
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }

        let staged = std::mem::take(&mut self.staged);
        for (i, (temporary, target)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(temporary, target) {
                self.staged = staged[i..].to_vec();
                return Err(StoreError::FileWrite(e));
            }
        }

        self.active = false;
        tracing::debug!(records = staged.len(), "Records committed");
        Ok(())
    }

    fn rollback(&mut self) {
        for (temporary, _) in self.staged.drain(..) {
            if let Err(e) = fs::remove_file(&temporary) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        error = %e,
                        path = %temporary.display(),
                        "Failed to remove staged record"
                    );
                }
            }
        }
        self.active = false;
    }
}
