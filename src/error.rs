use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapdexError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid schema: {0}")]
    Schema(String),
    #[error("Type mismatch for property '{property}' (field '{field}'): expected {expected}, found {found}")]
    TypeMismatch {
        property: String,
        field: String,
        expected: &'static str,
        found: String,
    },
    #[error("Type error for property '{property}' (field '{field}'): {message}")]
    Type {
        property: String,
        field: String,
        message: String,
    },
    #[error("Duplicate initiative uri '{uri}' in dataset '{dataset}'")]
    DuplicateUri { uri: String, dataset: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reported by a loader. Only a `Dataset` error can be attributed to
/// one dataset; an `Unscoped` error aborts the whole orchestration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Dataset '{dataset_id}' failed to load: {message}")]
    Dataset { dataset_id: String, message: String },
    #[error("Load failed: {0}")]
    Unscoped(String),
}

impl LoadError {
    pub fn dataset(dataset_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dataset {
            dataset_id: dataset_id.into(),
            message: message.into(),
        }
    }
    /// A consumer refused a batch. The aggregate can no longer be trusted, so
    /// this is never attributed to a single dataset.
    pub fn rejected(error: &MapdexError) -> Self {
        Self::Unscoped(format!("batch rejected: {error}"))
    }
    pub fn dataset_id(&self) -> Option<&str> {
        match self {
            Self::Dataset { dataset_id, .. } => Some(dataset_id),
            Self::Unscoped(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MapdexError>;

// Helper conversions
impl From<config::ConfigError> for MapdexError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for MapdexError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
