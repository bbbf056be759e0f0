//! The record type the CLI stores: a document with an attachment and a preview image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use upload_core::{PathNamer, PendingUpload, UploadCarrier, UploadError, UploadResult};
use uuid::Uuid;

/// Upload fields declared by [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Field {
    Attachment,
    Preview,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Attachment => "attachment",
            Field::Preview => "preview",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub preview: Option<String>,
    #[serde(skip)]
    attachment_upload: Option<PendingUpload>,
    #[serde(skip)]
    preview_upload: Option<PendingUpload>,
    #[serde(skip)]
    upload_root: Option<PathBuf>,
}

impl Document {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            attachment: None,
            preview: None,
            attachment_upload: None,
            preview_upload: None,
            upload_root: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Base path received during the last flush, if any.
    pub fn upload_root(&self) -> Option<&Path> {
        self.upload_root.as_deref()
    }

    /// Full path of the stored file for `field`, if the document has one.
    pub fn stored_path(&self, namer: &PathNamer, field: Field) -> Option<PathBuf> {
        let name = match field {
            Field::Attachment => self.attachment.as_deref(),
            Field::Preview => self.preview.as_deref(),
        }?;
        Some(namer.full_path(self.type_name(), field.as_str(), name))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use upload_core::ExtensionHint;

    #[test]
    fn pending_uploads_are_not_serialized() {
        let mut doc = Document::new();
        doc.attachment = Some("abc123.pdf".into());
        doc.set_file_upload(
            "preview",
            Some(PendingUpload::new(
                "/tmp/staged",
                ExtensionHint::Extension("png".into()),
            )),
        )
        .unwrap();

        let json = serde_json::to_string(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();

        assert_eq!(back.id, doc.id);
        assert_eq!(back.attachment.as_deref(), Some("abc123.pdf"));
        assert!(!back.has_file_uploads().unwrap());
    }

    #[test]
    fn stored_path_uses_layout() {
        let mut doc = Document::new();
        doc.attachment = Some("abc123.pdf".into());
        let namer = PathNamer::new("/data/uploads");

        assert_eq!(
            doc.stored_path(&namer, Field::Attachment),
            Some(PathBuf::from("/data/uploads/document/attachment/abc123.pdf"))
        );
        assert_eq!(doc.stored_path(&namer, Field::Preview), None);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let doc = Document::new();
        assert!(matches!(
            doc.file_name("thumbnail"),
            Err(UploadError::ContractViolation { .. })
        ));
    }
}
