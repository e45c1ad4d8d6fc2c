//! OpenAPI descriptor generation (spec §2: "interface only" — no docs UI,
//! no route registration; `build_spec` returns a JSON document a caller can
//! serve however it likes).

mod builder;

pub use builder::{build_spec, OpenApiConfig};
