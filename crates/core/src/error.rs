use upload_files::FilesError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{type_name} has no upload accessors for field '{field}'")]
    ContractViolation { type_name: String, field: String },
    #[error("no stored file name assigned to {type_name}.{field} before materialization")]
    UnassignedFileName { type_name: String, field: String },
    #[error("could not generate a unique file name for {type_name}.{field} after {attempts} attempts")]
    NameExhausted {
        type_name: String,
        field: String,
        attempts: usize,
    },
    #[error("failed to materialize upload for {type_name}.{field}: {source}")]
    Materialization {
        type_name: String,
        field: String,
        #[source]
        source: FilesError,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to deserialize YAML configuration: {0}")]
    ConfigYaml(serde_yaml::Error),
    #[error("file storage error: {0}")]
    Files(#[from] FilesError),
}

impl UploadError {
    /// Builds the [`UploadError::ContractViolation`] a carrier returns for a field it does not
    /// declare.
    pub fn undeclared_field(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ContractViolation {
            type_name: type_name.into(),
            field: field.into(),
        }
    }
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
