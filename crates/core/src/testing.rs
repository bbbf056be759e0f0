//! Carriers and a record store shared by the unit tests.

use crate::unit_of_work::{RecordStore, WriteKind};
use crate::{ExtensionHint, PendingUpload, UploadCarrier, UploadError, UploadResult};
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn staged_upload(path: impl Into<PathBuf>, extension: &str) -> PendingUpload {
    PendingUpload::new(path, ExtensionHint::Extension(extension.to_string()))
}

/// Writes `content` to `<dir>/staging/<name>` and returns it as a pending upload.
pub(crate) fn stage_file(dir: &Path, name: &str, content: &[u8], extension: &str) -> PendingUpload {
    let staging = dir.join("staging");
    fs::create_dir_all(&staging).unwrap();
    let path = staging.join(name);
    fs::write(&path, content).unwrap();
    staged_upload(path, extension)
}

#[derive(Debug, Default)]
pub(crate) struct Document {
    pub attachment: Option<String>,
    pub attachment_upload: Option<PendingUpload>,
    pub preview: Option<String>,
    pub preview_upload: Option<PendingUpload>,
    pub upload_root: Option<PathBuf>,
}

impl UploadCarrier for Document {
    fn type_name(&self) -> &str {
        "Document"
    }

    fn upload_fields(&self) -> &[&'static str] {
        &["attachment", "preview"]
    }

    fn set_file_upload_path(&mut self, base_path: &Path) {
        self.upload_root = Some(base_path.to_path_buf());
    }

    fn file_name(&self, field: &str) -> UploadResult<Option<&str>> {
        match field {
            "attachment" => Ok(self.attachment.as_deref()),
            "preview" => Ok(self.preview.as_deref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_name(&mut self, field: &str, file_name: Option<String>) -> UploadResult<()> {
        match field {
            "attachment" => self.attachment = file_name,
            "preview" => self.preview = file_name,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }

    fn file_upload(&self, field: &str) -> UploadResult<Option<&PendingUpload>> {
        match field {
            "attachment" => Ok(self.attachment_upload.as_ref()),
            "preview" => Ok(self.preview_upload.as_ref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_upload(&mut self, field: &str, upload: Option<PendingUpload>) -> UploadResult<()> {
        match field {
            "attachment" => self.attachment_upload = upload,
            "preview" => self.preview_upload = upload,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct Invoice {
    pub attachment: Option<String>,
    pub attachment_upload: Option<PendingUpload>,
}

impl UploadCarrier for Invoice {
    fn type_name(&self) -> &str {
        "Invoice"
    }

    fn upload_fields(&self) -> &[&'static str] {
        &["attachment"]
    }

    fn set_file_upload_path(&mut self, _base_path: &Path) {}

    fn file_name(&self, field: &str) -> UploadResult<Option<&str>> {
        match field {
            "attachment" => Ok(self.attachment.as_deref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_name(&mut self, field: &str, file_name: Option<String>) -> UploadResult<()> {
        match field {
            "attachment" => self.attachment = file_name,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }

    fn file_upload(&self, field: &str) -> UploadResult<Option<&PendingUpload>> {
        match field {
            "attachment" => Ok(self.attachment_upload.as_ref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_upload(&mut self, field: &str, upload: Option<PendingUpload>) -> UploadResult<()> {
        match field {
            "attachment" => self.attachment_upload = upload,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }
}

/// Declares `signature` without handling it in any accessor.
#[derive(Debug, Default)]
pub(crate) struct Broken {
    scan: Option<String>,
    scan_upload: Option<PendingUpload>,
}

impl Broken {
    pub(crate) fn with_upload(path: impl Into<PathBuf>) -> Self {
        Self {
            scan: None,
            scan_upload: Some(staged_upload(path, "pdf")),
        }
    }
}

impl UploadCarrier for Broken {
    fn type_name(&self) -> &str {
        "Broken"
    }

    fn upload_fields(&self) -> &[&'static str] {
        &["scan", "signature"]
    }

    fn set_file_upload_path(&mut self, _base_path: &Path) {}

    fn file_name(&self, field: &str) -> UploadResult<Option<&str>> {
        match field {
            "scan" => Ok(self.scan.as_deref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_name(&mut self, field: &str, file_name: Option<String>) -> UploadResult<()> {
        match field {
            "scan" => self.scan = file_name,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }

    fn file_upload(&self, field: &str) -> UploadResult<Option<&PendingUpload>> {
        match field {
            "scan" => Ok(self.scan_upload.as_ref()),
            other => Err(UploadError::undeclared_field(self.type_name(), other)),
        }
    }

    fn set_file_upload(&mut self, field: &str, upload: Option<PendingUpload>) -> UploadResult<()> {
        match field {
            "scan" => self.scan_upload = upload,
            other => return Err(UploadError::undeclared_field(self.type_name(), other)),
        }
        Ok(())
    }
}

/// A row as the store saw it at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub kind: WriteKind,
    pub type_name: String,
    pub file_names: Vec<Option<String>>,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MemoryStoreError {
    #[error("write {0} rejected")]
    WriteRejected(usize),
    #[error("commit rejected")]
    CommitRejected,
}

/// In-memory transactional store with failure injection.
#[derive(Debug, Default)]
pub(crate) struct MemoryStore {
    pub committed: Vec<Row>,
    pub pending: Vec<Row>,
    /// Index within the transaction of the write that should fail.
    pub fail_write_at: Option<usize>,
    pub fail_commit: bool,
    pub began: usize,
    pub rolled_back: usize,
}

impl MemoryStore {
    fn write<R>(&mut self, kind: WriteKind, record: &R) -> Result<(), MemoryStoreError>
    where
        R: UploadCarrier + ?Sized,
    {
        let index = self.pending.len();
        if self.fail_write_at == Some(index) {
            return Err(MemoryStoreError::WriteRejected(index));
        }

        let file_names = record
            .upload_fields()
            .iter()
            .map(|field| record.file_name(field).ok().flatten().map(str::to_owned))
            .collect();
        self.pending.push(Row {
            kind,
            type_name: record.type_name().to_owned(),
            file_names,
        });
        Ok(())
    }
}

impl<R: UploadCarrier + ?Sized> RecordStore<R> for MemoryStore {
    type Error = MemoryStoreError;

    fn begin(&mut self) -> Result<(), Self::Error> {
        self.began += 1;
        self.pending.clear();
        Ok(())
    }

    fn insert(&mut self, record: &R) -> Result<(), Self::Error> {
        self.write(WriteKind::Insert, record)
    }

    fn update(&mut self, record: &R) -> Result<(), Self::Error> {
        self.write(WriteKind::Update, record)
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        if self.fail_commit {
            return Err(MemoryStoreError::CommitRejected);
        }
        self.committed.append(&mut self.pending);
        Ok(())
    }

    fn rollback(&mut self) {
        self.rolled_back += 1;
        self.pending.clear();
    }
}
