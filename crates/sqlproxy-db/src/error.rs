use sqlproxy_core::AppError;

/// Driver-layer error taxonomy. Bridged into [`AppError`] at the handler
/// boundary; never shown to a client in its `Display` form.
#[derive(Debug)]
pub enum DataError {
    /// No driver is registered, or the registered driver could not be reached.
    Unavailable(String),
    /// The query did not complete within the resolved timeout.
    Timeout,
    /// The driver rejected the statement or a bind value.
    Query(String),
    /// A `JSONColumns` cell failed to parse as JSON.
    JsonColumn { column: String, detail: String },
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Unavailable(name) => write!(f, "database connection unavailable: {name}"),
            DataError::Timeout => write!(f, "query timed out"),
            DataError::Query(detail) => write!(f, "query execution failed: {detail}"),
            DataError::JsonColumn { column, detail } => {
                write!(f, "json column '{column}' failed to parse: {detail}")
            }
        }
    }
}

impl std::error::Error for DataError {}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Unavailable(name) => AppError::DriverUnavailable(name),
            DataError::Timeout => AppError::QueryTimeout { seconds: 0 },
            DataError::Query(detail) => AppError::QueryFailed(detail),
            DataError::JsonColumn { column, detail } => {
                AppError::QueryFailed(format!("json column '{column}': {detail}"))
            }
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        DataError::Query(err.to_string())
    }
}

#[cfg(feature = "mssql")]
impl From<tiberius::error::Error> for DataError {
    fn from(err: tiberius::error::Error) -> Self {
        DataError::Query(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DataError>;
