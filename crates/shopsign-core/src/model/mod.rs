// ── Domain model ──

pub mod intent;
pub mod sample;
pub mod site;

pub use intent::{ChangeCause, StatusIntent};
pub use sample::LocationSample;
pub use site::{Site, SiteId, Status};
