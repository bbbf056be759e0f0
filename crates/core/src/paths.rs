//! On-disk layout for stored uploads.
//!
//! ```text
//! <base_path>/
//! └── <lowercased type name>/
//!     └── <field name>/
//!         └── <token>.<ext>
//! ```
//!
//! This layout must be reproduced exactly; existing stored data depends on it.

use std::path::{Path, PathBuf};

/// Pure mapping from (type, field, file name) to paths under the base upload path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathNamer {
    base_path: PathBuf,
}

impl PathNamer {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<base>/<lowercase(type_name)>/<field>`
    pub fn directory_for(&self, type_name: &str, field: &str) -> PathBuf {
        self.base_path.join(type_name.to_lowercase()).join(field)
    }

    /// `<base>/<lowercase(type_name)>/<field>/<stored_file_name>`
    pub fn full_path(&self, type_name: &str, field: &str, stored_file_name: &str) -> PathBuf {
        self.directory_for(type_name, field).join(stored_file_name)
    }
}
