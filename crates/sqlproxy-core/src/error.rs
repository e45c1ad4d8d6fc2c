use std::fmt;

/// HTTP status family an [`AppError`] maps onto.
///
/// Kept as a small closed set rather than depending on `http::StatusCode`
/// here — `sqlproxy-core` has no HTTP-framework dependency. The transport
/// boundary (`apps/sqlproxy-server`) converts this into the real status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    BadRequest,
    MethodNotAllowed,
    TooManyRequests,
    Internal,
    GatewayTimeout,
}

impl StatusFamily {
    /// The numeric HTTP status code for this family.
    pub fn code(self) -> u16 {
        match self {
            StatusFamily::BadRequest => 400,
            StatusFamily::MethodNotAllowed => 405,
            StatusFamily::TooManyRequests => 429,
            StatusFamily::Internal => 500,
            StatusFamily::GatewayTimeout => 504,
        }
    }
}

/// The proxy's error taxonomy (spec §7).
///
/// Each variant corresponds to one row of the error-kind table: the
/// `Display` message is what the client sees in the `error` field of the
/// JSON envelope, while the full detail (when different) is logged by the
/// caller via `tracing` before the error is converted to a response.
#[derive(Debug)]
pub enum AppError {
    /// Config failed validation at load time (fails startup, never surfaced to a client).
    ConfigInvalid(String),
    /// A required parameter was absent.
    ParamMissing(String),
    /// A parameter value failed type conversion or validation.
    ParamInvalid { name: String, detail: String },
    /// The request declared `Content-Type: application/json` but the body did not parse.
    MalformedBody,
    /// Request method didn't match the endpoint's configured method.
    MethodNotAllowed,
    /// The named database driver could not be reached.
    DriverUnavailable(String),
    /// The resolved per-request timeout elapsed before the query completed.
    QueryTimeout { seconds: u64 },
    /// The driver reported a query failure; `detail` is logged, never returned verbatim.
    QueryFailed(String),
}

impl AppError {
    pub fn status(&self) -> StatusFamily {
        match self {
            AppError::ConfigInvalid(_) => StatusFamily::Internal,
            AppError::ParamMissing(_) | AppError::ParamInvalid { .. } | AppError::MalformedBody => StatusFamily::BadRequest,
            AppError::MethodNotAllowed => StatusFamily::MethodNotAllowed,
            AppError::DriverUnavailable(_) => StatusFamily::Internal,
            AppError::QueryTimeout { .. } => StatusFamily::GatewayTimeout,
            AppError::QueryFailed(_) => StatusFamily::Internal,
        }
    }

    /// The message that is safe to put in the client-facing `error` field.
    ///
    /// Driver-originated detail (`QueryFailed`, `DriverUnavailable`) is
    /// intentionally not included here — callers log the full `Display`
    /// themselves and surface only this generic message, per spec §7's
    /// propagation policy ("nothing beyond driver boundaries surfaces raw
    /// vendor strings to the client").
    pub fn client_message(&self) -> String {
        match self {
            AppError::ConfigInvalid(msg) => msg.clone(),
            AppError::ParamMissing(name) => format!("missing required parameter: {name}"),
            AppError::ParamInvalid { name, detail } => {
                format!("invalid value for parameter {name}: {detail}")
            }
            AppError::MethodNotAllowed => String::new(),
            AppError::DriverUnavailable(_) => "database connection unavailable".to_string(),
            AppError::QueryTimeout { seconds } => format!("query timed out after {seconds} seconds"),
            AppError::QueryFailed(_) => "query execution failed".to_string(),
            AppError::MalformedBody => "request body is not valid JSON".to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ConfigInvalid(msg) => write!(f, "config invalid: {msg}"),
            AppError::ParamMissing(name) => write!(f, "missing required parameter: {name}"),
            AppError::ParamInvalid { name, detail } => {
                write!(f, "invalid value for parameter {name}: {detail}")
            }
            AppError::MethodNotAllowed => write!(f, "method not allowed"),
            AppError::DriverUnavailable(name) => write!(f, "database connection unavailable: {name}"),
            AppError::QueryTimeout { seconds } => write!(f, "query timed out after {seconds} seconds"),
            AppError::QueryFailed(detail) => write!(f, "query execution failed: {detail}"),
            AppError::MalformedBody => write!(f, "request body is not valid JSON"),
        }
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_missing_message() {
        let err = AppError::ParamMissing("status".into());
        assert_eq!(err.client_message(), "missing required parameter: status");
        assert_eq!(err.status().code(), 400);
    }

    #[test]
    fn query_failed_hides_detail() {
        let err = AppError::QueryFailed("syntax error near FROM".into());
        assert_eq!(err.client_message(), "query execution failed");
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn query_timeout_message() {
        let err = AppError::QueryTimeout { seconds: 5 };
        assert_eq!(err.client_message(), "query timed out after 5 seconds");
        assert_eq!(err.status().code(), 504);
    }
}
