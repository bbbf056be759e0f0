//! Upload subsystem configuration.
//!
//! The only setting is the base upload storage path. It is resolved once at process startup and
//! then handed to [`UploadListener::from_config`](crate::UploadListener::from_config); nothing in
//! the core reads environment variables while a transaction is running.
//!
//! When no base path is configured the subsystem is inert: no listener is created and flushes
//! run without any upload handling.

use crate::constants::CONFIG_ROOT_KEY;
use crate::{UploadError, UploadResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Upload configuration resolved at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadConfig {
    base_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    file_upload: Option<FileUploadSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileUploadSection {
    #[serde(default)]
    path: Option<String>,
}

impl UploadConfig {
    /// Create a new `UploadConfig`.
    ///
    /// `None` yields an inert configuration. A supplied path must be absolute, because deletion
    /// candidates are recorded as absolute paths.
    pub fn new(base_path: Option<PathBuf>) -> UploadResult<Self> {
        if let Some(path) = &base_path {
            if path.as_os_str().is_empty() {
                return Err(UploadError::InvalidConfig(
                    "upload base path cannot be empty".into(),
                ));
            }
            if !path.is_absolute() {
                return Err(UploadError::InvalidConfig(format!(
                    "upload base path must be absolute, got {}",
                    path.display()
                )));
            }
        }

        Ok(Self { base_path })
    }

    /// Configuration with uploads disabled.
    pub fn inert() -> Self {
        Self::default()
    }

    /// Parse the base path from an optional environment value.
    ///
    /// `None` or an empty/whitespace value yields an inert configuration.
    pub fn from_env_value(value: Option<String>) -> UploadResult<Self> {
        Self::new(env_path(value))
    }

    /// Like [`from_env_value`](Self::from_env_value), but a relative value is joined onto
    /// `base_dir` first.
    pub fn from_env_value_relative_to(value: Option<String>, base_dir: &Path) -> UploadResult<Self> {
        let path = env_path(value).map(|path| {
            if path.is_absolute() {
                path
            } else {
                base_dir.join(path)
            }
        });
        Self::new(path)
    }

    /// Parse the `file_upload` section of a YAML document.
    ///
    /// ```yaml
    /// file_upload:
    ///   path: /data/uploads
    /// ```
    ///
    /// A missing section, missing `path`, or empty document yields an inert configuration.
    pub fn from_yaml_str(yaml: &str) -> UploadResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::inert());
        }

        let file: ConfigFile = serde_yaml::from_str(yaml).map_err(UploadError::ConfigYaml)?;
        let path = file
            .file_upload
            .and_then(|section| section.path)
            .map(|p| p.trim().to_string());

        match path {
            Some(p) if p.is_empty() => Err(UploadError::InvalidConfig(format!(
                "{}.path cannot be empty",
                CONFIG_ROOT_KEY
            ))),
            Some(p) => Self::new(Some(PathBuf::from(p))),
            None => Ok(Self::inert()),
        }
    }

    /// Read and parse a YAML configuration file.
    pub fn from_yaml_file(path: &Path) -> UploadResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(UploadError::ConfigRead)?;
        Self::from_yaml_str(&contents)
    }

    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.base_path.is_some()
    }
}

fn env_path(value: Option<String>) -> Option<PathBuf> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_absolute_path() {
        let config = UploadConfig::new(Some(PathBuf::from("/data/uploads"))).unwrap();
        assert_eq!(config.base_path(), Some(Path::new("/data/uploads")));
        assert!(config.is_enabled());
    }

    #[test]
    fn new_rejects_relative_path() {
        let err = UploadConfig::new(Some(PathBuf::from("uploads"))).unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfig(_)));
    }

    #[test]
    fn new_rejects_empty_path() {
        let err = UploadConfig::new(Some(PathBuf::new())).unwrap_err();
        assert!(matches!(err, UploadError::InvalidConfig(_)));
    }

    #[test]
    fn env_value_absent_or_blank_is_inert() {
        assert!(!UploadConfig::from_env_value(None).unwrap().is_enabled());
        assert!(!UploadConfig::from_env_value(Some("   ".into()))
            .unwrap()
            .is_enabled());
    }

    #[test]
    fn env_value_is_trimmed() {
        let config = UploadConfig::from_env_value(Some(" /data/uploads \n".into())).unwrap();
        assert_eq!(config.base_path(), Some(Path::new("/data/uploads")));
    }

    #[test]
    fn relative_env_value_is_joined_onto_base_dir() {
        let base = Path::new("/srv/app");

        let relative =
            UploadConfig::from_env_value_relative_to(Some(" var/uploads ".into()), base).unwrap();
        let absolute =
            UploadConfig::from_env_value_relative_to(Some("/data/uploads".into()), base).unwrap();
        let blank = UploadConfig::from_env_value_relative_to(Some("  ".into()), base).unwrap();

        assert_eq!(relative.base_path(), Some(Path::new("/srv/app/var/uploads")));
        assert_eq!(absolute.base_path(), Some(Path::new("/data/uploads")));
        assert!(!blank.is_enabled());
    }

    #[test]
    fn yaml_with_path() {
        let config = UploadConfig::from_yaml_str("file_upload:\n  path: /data/uploads\n").unwrap();
        assert_eq!(config.base_path(), Some(Path::new("/data/uploads")));
    }

    #[test]
    fn yaml_without_section_is_inert() {
        let config = UploadConfig::from_yaml_str("other_bundle:\n  enabled: true\n").unwrap();
        assert!(!config.is_enabled());
        assert!(!UploadConfig::from_yaml_str("").unwrap().is_enabled());
        assert!(!UploadConfig::from_yaml_str("file_upload: {}\n")
            .unwrap()
            .is_enabled());
    }

    #[test]
    fn yaml_rejects_unknown_keys_and_empty_path() {
        assert!(matches!(
            UploadConfig::from_yaml_str("file_upload:\n  pth: /data\n"),
            Err(UploadError::ConfigYaml(_))
        ));
        assert!(matches!(
            UploadConfig::from_yaml_str("file_upload:\n  path: \"\"\n"),
            Err(UploadError::InvalidConfig(_))
        ));
    }

    #[test]
    fn yaml_file_read_error() {
        let err = UploadConfig::from_yaml_file(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, UploadError::ConfigRead(_)));
    }
}
