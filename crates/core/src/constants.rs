//! Constants used throughout the upload core crate.

/// Environment variable holding the base upload storage path.
pub const UPLOAD_BASE_PATH_ENV: &str = "UPLOAD_BASE_PATH";

/// Root key of the upload section in YAML configuration files.
pub const CONFIG_ROOT_KEY: &str = "file_upload";

/// Extension used when an upload's hint resolves to nothing usable.
pub const FALLBACK_EXTENSION: &str = "bin";

/// How many fresh tokens the reference assigner tries before giving up on a field.
pub const MAX_NAME_ATTEMPTS: usize = 5;
