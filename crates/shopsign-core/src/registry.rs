// ── Site registry ──
//
// One monitoring session's view of its owner's sites. Two structures
// side by side:
//
//   * `slots` — one async-locked slot per site. Every decision path
//     (sample evaluation, timer pass, manual action) locks the slot
//     for the whole evaluate+commit sequence, which is what makes
//     per-site writes single-writer.
//   * `published` — the last committed copy of each site, feeding a
//     lock-free snapshot for observers via a `watch` channel.
//
// Observers read `published`; decisions read and write through the
// slot lock. Nothing mutates a site outside it.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, watch};

use crate::model::{Site, SiteId};

/// Per-site mutable state, guarded by the slot mutex.
pub(crate) struct SiteState {
    pub site: Site,
}

/// A lockable slot owning one site's state.
pub(crate) struct SiteSlot {
    pub state: Mutex<SiteState>,
}

/// Registry of all sites owned by one session.
pub struct SiteRegistry {
    slots: DashMap<SiteId, Arc<SiteSlot>>,
    published: DashMap<SiteId, Site>,
    /// Full snapshot, rebuilt on every publish.
    snapshot: watch::Sender<Arc<Vec<Site>>>,
    /// Mutation counter, bumped on every publish.
    version: watch::Sender<u64>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (version, _) = watch::channel(0u64);
        Self {
            slots: DashMap::new(),
            published: DashMap::new(),
            snapshot,
            version,
        }
    }

    /// Insert a site, replacing any slot with the same id.
    pub fn insert(&self, site: Site) {
        let id = site.id.clone();
        self.slots.insert(
            id.clone(),
            Arc::new(SiteSlot {
                state: Mutex::new(SiteState { site: site.clone() }),
            }),
        );
        self.publish(site);
    }

    /// Remove a site. Returns the last published copy if it existed.
    pub fn remove(&self, id: &SiteId) -> Option<Site> {
        self.slots.remove(id);
        let removed = self.published.remove(id).map(|(_, s)| s);
        if removed.is_some() {
            self.rebuild_snapshot();
            self.bump_version();
        }
        removed
    }

    /// Remove all sites.
    pub fn clear(&self) {
        self.slots.clear();
        self.published.clear();
        self.rebuild_snapshot();
        self.bump_version();
    }

    pub(crate) fn slot(&self, id: &SiteId) -> Option<Arc<SiteSlot>> {
        self.slots.get(id).map(|r| Arc::clone(r.value()))
    }

    /// All slots, for a full reconciliation pass.
    pub(crate) fn all_slots(&self) -> Vec<(SiteId, Arc<SiteSlot>)> {
        self.slots
            .iter()
            .map(|r| (r.key().clone(), Arc::clone(r.value())))
            .collect()
    }

    /// Last committed copy of a single site.
    pub fn get(&self, id: &SiteId) -> Option<Site> {
        self.published.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn site_ids(&self) -> Vec<SiteId> {
        self.slots.iter().map(|r| r.key().clone()).collect()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Site>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Site>>> {
        self.snapshot.subscribe()
    }

    /// Publish a committed site state to observers.
    ///
    /// Called after a successful commit, while the caller still holds
    /// the slot lock — publishing never locks slots itself.
    pub(crate) fn publish(&self, site: Site) {
        // A commit can still be in flight when its site is removed or
        // the registry is cleared; a publish with no backing slot is
        // dropped rather than resurrecting the site for observers.
        if !self.slots.contains_key(&site.id) {
            return;
        }
        self.published.insert(site.id.clone(), site);
        self.rebuild_snapshot();
        self.bump_version();
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        let mut sites: Vec<Site> = self.published.iter().map(|r| r.value().clone()).collect();
        sites.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(sites));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}
