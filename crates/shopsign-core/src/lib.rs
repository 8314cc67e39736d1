// shopsign-core: proximity-based status reconciliation between a
// device location stream and durable site records.
//
// A `MonitoringSession` owns the registry of an owner's sites,
// consumes location fixes and periodic ticks, and drives every status
// change — automatic or manual — through one version-guarded commit
// path per site.

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod geo;
pub mod model;
pub mod registry;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{RetryPolicy, SessionConfig};
pub use coordinator::UpdateCoordinator;
pub use error::CoreError;
pub use geo::{GeoPoint, distance_meters};
pub use registry::SiteRegistry;
pub use session::{MonitoringSession, SessionState};
pub use stream::SiteStream;

// Re-export model types at the crate root for ergonomics.
pub use model::{ChangeCause, LocationSample, Site, SiteId, Status, StatusIntent};
