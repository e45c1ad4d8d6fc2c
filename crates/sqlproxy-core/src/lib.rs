//! Shared primitives for the SQL proxy workspace: the error taxonomy,
//! request-id generation/sanitisation, the wide-event log record, and the
//! dynamically typed row/parameter value.
//!
//! This crate has no HTTP-framework or database-driver dependency, the same
//! layering discipline `r2e-data` applies to its abstraction layer.

pub mod error;
pub mod request_id;
pub mod value;
pub mod wide_event;

pub use error::{AppError, StatusFamily};
pub use request_id::RequestId;
pub use value::{row_to_json, Row, RowValue};
pub use wide_event::WideEvent;

/// Reserved request parameters that never reach the SQL binding layer (spec §1/§6).
pub const RESERVED_PARAM_TIMEOUT: &str = "_timeout";
pub const RESERVED_PARAM_NOCACHE: &str = "_nocache";
