// shopsign-api: contracts for the collaborators the status engine consumes.
//
// The engine itself lives in shopsign-core. This crate defines the two
// boundaries it talks across: the durable record store (conditional
// version-guarded writes, bulk reads by owner) and the push-based
// location source. `MemoryStore` is a reference store implementation
// used by tests and in-process embedders.

pub mod error;
pub mod location;
pub mod memory;
pub mod records;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{SourceError, StoreError};
pub use location::{LocationFix, SourceEvent};
pub use memory::MemoryStore;
pub use records::{SiteRecord, StatusWrite};
pub use store::RecordStore;
