//! Per-request state machine (spec §4.5): resolves a request id, checks the
//! endpoint's method, parses parameters, resolves the effective timeout,
//! consults the result cache, runs the query, and assembles the response —
//! framework-free so `apps/sqlproxy-server` is the only place that knows
//! about the HTTP crate in use.

mod ctx;
mod defaults;
mod pipeline;

pub use pipeline::HandlerCore;
pub use ctx::{HandlerOutcome, RequestCtx};
pub use defaults::ServerDefaults;
