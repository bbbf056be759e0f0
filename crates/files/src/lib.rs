//! Upload File Storage
//!
//! This crate provides the filesystem primitives the upload lifecycle coordinator builds on.
//!
//! ## Design Principles
//!
//! - Every operation is scoped to one upload root; nothing is written or removed outside it
//! - Stored files are never overwritten (a new upload always gets a new name)
//! - Moves create the target with a hard link, or copy into a new file across filesystems
//! - Removing a file that is already gone is not an error
//!
//! ## Storage Layout
//!
//! The coordinator decides directory names; this crate only enforces that they stay under the
//! root:
//!
//! ```text
//! <root>/
//! └── <type-name>/
//!     └── <field-name>/
//!         └── 9f1c0d4b…2a10.pdf
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use upload_files::UploadStore;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UploadStore::new(Path::new("/data/uploads"))?;
//! let stored = store.move_into(
//!     Path::new("/tmp/staging/upload-1"),
//!     Path::new("/data/uploads/document/attachment"),
//!     "9f1c0d4be2a84c3f8a71b54e0c6d2a10.pdf",
//! )?;
//! # let _ = stored;
//! # Ok(())
//! # }
//! ```

mod store;

pub use store::{Removal, UploadStore};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root path exists but is not a directory, or is unusable
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (outside the root, traversal, or not a plain file name)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Target file already exists (stored files are never overwritten)
    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
