//! Root-scoped upload storage.
//!
//! [`UploadStore`] owns one upload root and performs the only two filesystem mutations the
//! coordinator needs: moving staged bytes into their final location, and removing superseded
//! files after a commit.
//!
//! # Security Model
//!
//! - Target directories must lie under the root (checked lexically, component by component)
//! - Paths containing `..` are rejected outright
//! - Stored file names must be a single plain path component
//! - Existing files are never overwritten
//!
//! Checks are lexical rather than canonicalising, because the files involved may not exist yet
//! (moves) or may already be gone (removals).

use crate::FilesError;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Component, Path, PathBuf};

/// Outcome of [`UploadStore::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The file existed and was removed.
    Deleted,
    /// There was nothing to remove.
    AlreadyGone,
}

/// Filesystem access scoped to a single upload root.
///
/// The root does not have to exist yet; directories are created on the first move into them.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    /// Creates a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if:
    /// - `root` is not absolute or contains `..`
    /// - `root` exists but is not a directory
    pub fn new(root: &Path) -> Result<Self, FilesError> {
        if !root.is_absolute() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Upload root must be absolute: {}",
                root.display()
            )));
        }

        if has_parent_component(root) {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Upload root must not contain '..': {}",
                root.display()
            )));
        }

        if root.exists() && !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Returns the upload root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns true if `path` lies under the upload root and has no `..` components.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && !has_parent_component(path)
    }

    /// Moves a staged file to `directory/file_name`, creating `directory` as needed.
    ///
    /// The target is created with a hard link when source and target share a filesystem, and
    /// by copying into a newly created file otherwise; the staged source is removed afterwards.
    /// Both ways fail if the target already exists, so a stored file is never replaced even when
    /// another writer races for the same name.
    ///
    /// # Returns
    ///
    /// The full path of the stored file.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `directory` is outside the root or `file_name` is not a plain file name (`InvalidPath`)
    /// - a file already exists at the target (`FileAlreadyExists`)
    /// - the staged source is missing, or directory creation or copying fails (`Io`)
    pub fn move_into(
        &self,
        staged: &Path,
        directory: &Path,
        file_name: &str,
    ) -> Result<PathBuf, FilesError> {
        if !self.contains(directory) {
            return Err(FilesError::InvalidPath(format!(
                "Target directory {} is outside upload root {}",
                directory.display(),
                self.root.display()
            )));
        }
        validate_file_name(file_name)?;

        let target = directory.join(file_name);
        if target.symlink_metadata().is_ok() {
            return Err(FilesError::FileAlreadyExists(target.display().to_string()));
        }

        fs::create_dir_all(directory).map_err(|e| {
            io_context(
                e,
                format!("Failed to create storage directory {}", directory.display()),
            )
        })?;

        place(staged, &target)?;
        tracing::debug!(
            staged = %staged.display(),
            path = %target.display(),
            "Upload stored"
        );
        Ok(target)
    }

    /// Moves a stored file back out of the root to `staged`, undoing [`Self::move_into`].
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `stored` is outside the root (`InvalidPath`); nothing is touched
    /// - a file already exists at `staged` (`FileAlreadyExists`)
    /// - the stored file is missing or copying fails (`Io`)
    pub fn move_out(&self, stored: &Path, staged: &Path) -> Result<(), FilesError> {
        if !self.contains(stored) {
            return Err(FilesError::InvalidPath(format!(
                "Refusing to move {} from outside upload root {}",
                stored.display(),
                self.root.display()
            )));
        }

        if let Some(parent) = staged.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                io_context(
                    e,
                    format!("Failed to create staging directory {}", parent.display()),
                )
            })?;
        }

        place(stored, staged)?;
        tracing::debug!(
            path = %stored.display(),
            staged = %staged.display(),
            "Upload returned to staging"
        );
        Ok(())
    }

    /// Removes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `path` is outside the root (`InvalidPath`); nothing is touched
    /// - removal fails for any reason other than the file being absent (`Io`)
    pub fn remove(&self, path: &Path) -> Result<Removal, FilesError> {
        if !self.contains(path) {
            return Err(FilesError::InvalidPath(format!(
                "Refusing to remove {} outside upload root {}",
                path.display(),
                self.root.display()
            )));
        }

        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "File removed");
                Ok(Removal::Deleted)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::AlreadyGone),
            Err(e) => Err(io_context(
                e,
                format!("Failed to remove file {}", path.display()),
            )),
        }
    }
}

/// Creates `target` with the contents of `source`, then removes `source`.
///
/// Never replaces an existing `target`: the hard link and the `create_new` open both fail
/// atomically if it exists.
fn place(source: &Path, target: &Path) -> Result<(), FilesError> {
    match fs::hard_link(source, target) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(FilesError::FileAlreadyExists(target.display().to_string()));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(io_context(
                e,
                format!("Source file not found {}", source.display()),
            ));
        }
        Err(link_error) => {
            tracing::debug!(
                error = %link_error,
                source = %source.display(),
                "Hard link failed, falling back to copy"
            );
            copy_new(source, target)?;
        }
    }

    // The bytes are durable at the target; a leftover source is only wasted space.
    if let Err(e) = fs::remove_file(source) {
        tracing::warn!(
            error = %e,
            source = %source.display(),
            "Failed to remove source after placing file"
        );
    }
    Ok(())
}

/// Copies `source` into a file that must not exist yet. A partial target is removed on failure.
fn copy_new(source: &Path, target: &Path) -> Result<(), FilesError> {
    let mut reader = File::open(source).map_err(|e| {
        io_context(e, format!("Failed to open source file {}", source.display()))
    })?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(FilesError::FileAlreadyExists(target.display().to_string()));
        }
        Err(e) => {
            return Err(io_context(
                e,
                format!("Failed to create {}", target.display()),
            ))
        }
    };

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if let Err(e) = copied {
        drop(writer);
        if let Err(remove_error) = fs::remove_file(target) {
            tracing::warn!(
                error = %remove_error,
                target = %target.display(),
                "Failed to remove partial copy"
            );
        }
        return Err(io_context(
            e,
            format!(
                "Failed to copy {} to {}",
                source.display(),
                target.display()
            ),
        ));
    }
    Ok(())
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn validate_file_name(file_name: &str) -> Result<(), FilesError> {
    let mut components = Path::new(file_name).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );

    if !single_normal || file_name.contains(|c: char| c == '/' || c == '\\') {
        return Err(FilesError::InvalidPath(format!(
            "Not a plain file name: '{}'",
            file_name
        )));
    }
    Ok(())
}

fn io_context(e: std::io::Error, context: String) -> FilesError {
    FilesError::Io(std::io::Error::new(e.kind(), format!("{}: {}", context, e)))
}
