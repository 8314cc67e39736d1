// ── Status change intents ──
//
// An intent is a proposed, not-yet-committed status change. Intents
// are ephemeral: produced by the reconciliation engine under the
// site's lock and consumed exactly once by the update coordinator.

use uuid::Uuid;

use super::site::{SiteId, Status};

/// What caused a proposed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// Proximity evaluation against a location sample.
    Automatic,
    /// An explicit user action (toggle). Committing a manual intent
    /// pins the override flag.
    Manual,
}

/// A proposed status transition for a single site.
#[derive(Debug, Clone)]
pub struct StatusIntent {
    /// Correlation id for tracing a single intent through commit,
    /// retry, and stale-rejection logs.
    pub intent_id: Uuid,
    pub site_id: SiteId,
    pub from_status: Status,
    pub to_status: Status,
    pub cause: ChangeCause,
    /// The site version this decision was computed against. The
    /// coordinator refuses to commit if the store has moved past it.
    pub based_on_version: u64,
    /// Whether the committed record should carry an active override.
    /// True only for manual toggles; false for automatic changes and
    /// for override-clearing writes.
    pub override_active: bool,
}

impl StatusIntent {
    pub fn new(
        site_id: SiteId,
        from_status: Status,
        to_status: Status,
        cause: ChangeCause,
        based_on_version: u64,
    ) -> Self {
        Self {
            intent_id: Uuid::new_v4(),
            site_id,
            from_status,
            to_status,
            cause,
            based_on_version,
            override_active: cause == ChangeCause::Manual,
        }
    }
}
