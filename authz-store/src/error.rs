use authz_core::AppError;

/// Errors surfaced by the storage layer. Kept distinct from [`AppError`] so
/// callers can match on storage-specific variants before the eventual
/// conversion at the HTTP boundary.
#[derive(Debug)]
pub enum DataError {
    NotFound(String),
    PartitionMissing { realm: String, resource_type: String },
    Database(Box<dyn std::error::Error + Send + Sync>),
    Other(String),
}

impl DataError {
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::NotFound(msg) => write!(f, "not found: {msg}"),
            DataError::PartitionMissing { realm, resource_type } => {
                write!(f, "partition missing for realm {realm:?} resource type {resource_type:?}")
            }
            DataError::Database(err) => write!(f, "database error: {err}"),
            DataError::Other(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => AppError::NotFound(msg),
            DataError::PartitionMissing { realm, resource_type } => {
                AppError::PartitionMissing { realm, resource_type }
            }
            DataError::Database(e) => AppError::Internal(e.to_string()),
            DataError::Other(msg) => AppError::Internal(msg),
        }
    }
}

/// Extension trait bridging `sqlx::Error` into [`DataError`]. A free
/// function would do too, but this reads better at call sites chained off
/// of `.await`.
pub trait SqlxErrorExt {
    fn into_data_error(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self) -> DataError {
        match &self {
            sqlx::Error::RowNotFound => DataError::NotFound("row not found".into()),
            _ => DataError::database(self),
        }
    }
}

pub type StoreResult<T> = Result<T, DataError>;
