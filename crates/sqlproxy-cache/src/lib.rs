//! Process-wide, size-bounded result cache shared by every endpoint (spec §4.3).

mod entry;
mod keytemplate;
mod store;

pub use entry::CacheEntry;
pub use keytemplate::build_key;
pub use store::ResultCache;
