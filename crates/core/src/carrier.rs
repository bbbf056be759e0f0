//! The capability contract a domain object implements to take part in upload handling.
//!
//! Any persisted type can opt in by implementing [`UploadCarrier`]. Each declared upload field
//! has two slots on the carrier:
//!
//! - the **stored file name**: a plain `String` that is persisted with the record and names the
//!   file under `<base>/<lowercased type>/<field>/`
//! - the **pending upload**: staged, not-yet-durable bytes waiting to be moved into place
//!
//! Accessors take the field name and dispatch with an ordinary `match`. A field name that has no
//! arm is a programming error and must be reported as [`UploadError::ContractViolation`] (use
//! [`UploadError::undeclared_field`]), never silently ignored.
//!
//! ```
//! use std::path::{Path, PathBuf};
//! use upload_core::{PendingUpload, UploadCarrier, UploadError, UploadResult};
//!
//! #[derive(Default)]
//! struct Document {
//!     attachment: Option<String>,
//!     attachment_upload: Option<PendingUpload>,
//!     upload_root: Option<PathBuf>,
//! }
//!
//! impl UploadCarrier for Document {
//!     fn type_name(&self) -> &str {
//!         "Document"
//!     }
//!
//!     fn upload_fields(&self) -> &[&'static str] {
//!         &["attachment"]
//!     }
//!
//!     fn set_file_upload_path(&mut self, base_path: &Path) {
//!         self.upload_root = Some(base_path.to_path_buf());
//!     }
//!
//!     fn file_name(&self, field: &str) -> UploadResult<Option<&str>> {
//!         match field {
//!             "attachment" => Ok(self.attachment.as_deref()),
//!             other => Err(UploadError::undeclared_field(self.type_name(), other)),
//!         }
//!     }
//!
//!     fn set_file_name(&mut self, field: &str, file_name: Option<String>) -> UploadResult<()> {
//!         match field {
//!             "attachment" => self.attachment = file_name,
//!             other => return Err(UploadError::undeclared_field(self.type_name(), other)),
//!         }
//!         Ok(())
//!     }
//!
//!     fn file_upload(&self, field: &str) -> UploadResult<Option<&PendingUpload>> {
//!         match field {
//!             "attachment" => Ok(self.attachment_upload.as_ref()),
//!             other => Err(UploadError::undeclared_field(self.type_name(), other)),
//!         }
//!     }
//!
//!     fn set_file_upload(&mut self, field: &str, upload: Option<PendingUpload>) -> UploadResult<()> {
//!         match field {
//!             "attachment" => self.attachment_upload = upload,
//!             other => return Err(UploadError::undeclared_field(self.type_name(), other)),
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use crate::constants::FALLBACK_EXTENSION;
use crate::{UploadError, UploadResult};
use std::path::{Path, PathBuf};
use upload_token::normalise_extension;

/// Where the stored file name's suffix comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtensionHint {
    /// The extension of the client's original file name, e.g. `"PDF"` or `".png"`.
    Extension(String),
    /// A declared media type, e.g. `"application/pdf"`.
    MediaType(String),
}

impl ExtensionHint {
    /// Hint taken from the extension of an original file name, if it has one.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| Self::Extension(ext.to_string()))
    }

    /// Resolves the hint to a normalised extension.
    ///
    /// Returns `None` when the hint is unusable; callers fall back to
    /// [`FALLBACK_EXTENSION`](crate::constants::FALLBACK_EXTENSION).
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::Extension(ext) => normalise_extension(ext),
            Self::MediaType(media_type) => extension_for_media_type(media_type),
        }
    }

    /// Resolves the hint, falling back to `bin` (and logging) when it is unusable.
    pub fn extension(&self) -> String {
        self.resolve().unwrap_or_else(|| {
            tracing::warn!(hint = ?self, "Unusable extension hint, using fallback extension");
            FALLBACK_EXTENSION.to_string()
        })
    }
}

fn extension_for_media_type(media_type: &str) -> Option<String> {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    // mime_guess lists extensions alphabetically; these are the conventional picks.
    let preferred = match essence.as_str() {
        "image/jpeg" => Some("jpg"),
        "image/tiff" => Some("tif"),
        "text/plain" => Some("txt"),
        "audio/mpeg" => Some("mp3"),
        "video/mpeg" => Some("mpg"),
        _ => None,
    };
    if let Some(ext) = preferred {
        return Some(ext.to_string());
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|extensions| extensions.first())
        .and_then(|ext| normalise_extension(ext))
}

/// Staged upload bytes for one field of one carrier.
///
/// Created by whatever received the upload; consumed once by the materializer, which moves the
/// staged file and then clears the carrier's pending slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingUpload {
    staged_path: PathBuf,
    hint: ExtensionHint,
}

impl PendingUpload {
    pub fn new(staged_path: impl Into<PathBuf>, hint: ExtensionHint) -> Self {
        Self {
            staged_path: staged_path.into(),
            hint,
        }
    }

    pub fn staged_path(&self) -> &Path {
        &self.staged_path
    }

    pub fn hint(&self) -> &ExtensionHint {
        &self.hint
    }
}

/// Capability interface for objects that carry file uploads.
///
/// The trait is object safe; the coordinator accepts both concrete types and
/// `dyn UploadCarrier`.
pub trait UploadCarrier {
    /// Runtime type name. Its lowercased form is the first path segment under the base path.
    fn type_name(&self) -> &str;

    /// Names of every upload field this type declares.
    fn upload_fields(&self) -> &[&'static str];

    /// Receives the base upload storage path when the carrier is prepared.
    fn set_file_upload_path(&mut self, base_path: &Path);

    /// Current stored file name for `field`.
    fn file_name(&self, field: &str) -> UploadResult<Option<&str>>;

    /// Sets or clears the stored file name for `field`. Clearing only happens when an aborted
    /// transaction restores a field that had no name before.
    fn set_file_name(&mut self, field: &str, file_name: Option<String>) -> UploadResult<()>;

    /// Pending upload for `field`, if one is staged.
    fn file_upload(&self, field: &str) -> UploadResult<Option<&PendingUpload>>;

    fn set_file_upload(&mut self, field: &str, upload: Option<PendingUpload>)
        -> UploadResult<()>;

    /// Every declared field that currently has a pending upload, in declaration order.
    fn file_uploads(&self) -> UploadResult<Vec<(&'static str, &PendingUpload)>> {
        let mut uploads = Vec::new();
        for &field in self.upload_fields() {
            if let Some(upload) = self.file_upload(field)? {
                uploads.push((field, upload));
            }
        }
        Ok(uploads)
    }

    fn has_file_uploads(&self) -> UploadResult<bool> {
        Ok(!self.file_uploads()?.is_empty())
    }
}

/// Logs a contract violation at `error` before it propagates.
pub(crate) fn report_violation(err: UploadError) -> UploadError {
    if let UploadError::ContractViolation { type_name, field } = &err {
        tracing::error!(
            type_name = %type_name,
            field = %field,
            "Upload carrier contract violation"
        );
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Broken, Document};

    #[test]
    fn extension_hint_normalises_extensions() {
        assert_eq!(
            ExtensionHint::Extension(".PDF".into()).resolve(),
            Some("pdf".to_string())
        );
        assert_eq!(ExtensionHint::Extension("tar.gz".into()).resolve(), None);
    }

    #[test]
    fn extension_hint_maps_media_types() {
        let resolve = |mt: &str| ExtensionHint::MediaType(mt.into()).resolve();

        assert_eq!(resolve("application/pdf"), Some("pdf".to_string()));
        assert_eq!(resolve("image/png"), Some("png".to_string()));
        assert_eq!(resolve("image/jpeg"), Some("jpg".to_string()));
        assert_eq!(resolve("Text/Plain; charset=utf-8"), Some("txt".to_string()));
        assert_eq!(resolve("application/x-unknown-thing"), None);
    }

    #[test]
    fn extension_falls_back_to_bin() {
        assert_eq!(ExtensionHint::Extension("".into()).extension(), "bin");
        assert_eq!(ExtensionHint::Extension("png".into()).extension(), "png");
    }

    #[test]
    fn extension_hint_from_file_name() {
        assert_eq!(
            ExtensionHint::from_file_name("report.final.PDF"),
            Some(ExtensionHint::Extension("PDF".into()))
        );
        assert_eq!(ExtensionHint::from_file_name("README"), None);
    }

    #[test]
    fn file_uploads_lists_only_pending_fields() {
        let mut doc = Document::default();
        assert!(!doc.has_file_uploads().unwrap());

        doc.preview_upload = Some(PendingUpload::new(
            "/tmp/staged",
            ExtensionHint::Extension("png".into()),
        ));
        let uploads = doc.file_uploads().unwrap();

        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].0, "preview");
        assert!(doc.has_file_uploads().unwrap());
    }

    #[test]
    fn undeclared_field_is_a_contract_violation() {
        let carrier = Broken::with_upload("/tmp/staged");
        let err = carrier.file_uploads().unwrap_err();

        assert!(matches!(
            err,
            UploadError::ContractViolation { ref field, .. } if field == "signature"
        ));
    }
}
