// ── In-process reference store ──
//
// Dashmap-backed `RecordStore` used by the test suites and by
// embedders that keep records locally. Also the conformance model
// for real store implementations: the conditional update here is
// atomic per record because the write happens under the DashMap
// shard guard.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::error::StoreError;
use crate::records::{SiteRecord, StatusWrite};
use crate::store::RecordStore;

/// In-memory record store with deterministic failure injection.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<String, SiteRecord>,
    /// Number of upcoming `conditional_update` calls that fail with
    /// `Transient` before reaching the record. Used by tests to
    /// exercise the coordinator's retry path.
    transient_failures: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, replacing any existing one with the same id.
    pub fn seed(&self, record: SiteRecord) {
        self.records.insert(record.id.clone(), record);
    }

    /// Make the next `n` conditional updates fail with a transient error.
    pub fn fail_transient(&self, n: u32) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    /// Apply a write as an external writer would (another device or
    /// session): bypasses nothing — the version guard still applies —
    /// but takes the write directly rather than through an engine.
    pub fn external_write(&self, site_id: &str, write: StatusWrite) -> Result<SiteRecord, StoreError> {
        self.apply_conditional(site_id, &write)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn apply_conditional(&self, site_id: &str, write: &StatusWrite) -> Result<SiteRecord, StoreError> {
        let mut entry = self
            .records
            .get_mut(site_id)
            .ok_or_else(|| StoreError::NotFound {
                site_id: site_id.to_owned(),
            })?;

        if entry.version != write.based_on_version {
            return Err(StoreError::VersionMismatch {
                stored_version: entry.version,
            });
        }

        entry.status = write.status.clone();
        entry.override_active = write.override_active;
        entry.version = write.based_on_version + 1;
        entry.last_change_at = write.changed_at;
        Ok(entry.clone())
    }
}

impl RecordStore for MemoryStore {
    async fn load_sites(&self, owner_id: &str) -> Result<Vec<SiteRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .map(|r| r.value().clone())
            .collect())
    }

    async fn get_site(&self, site_id: &str) -> Result<SiteRecord, StoreError> {
        self.records
            .get(site_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| StoreError::NotFound {
                site_id: site_id.to_owned(),
            })
    }

    async fn conditional_update(
        &self,
        site_id: &str,
        write: StatusWrite,
    ) -> Result<SiteRecord, StoreError> {
        if self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            debug!(site_id, "injected transient failure");
            return Err(StoreError::Transient {
                message: "injected failure".into(),
            });
        }

        self.apply_conditional(site_id, &write)
    }

    async fn create_site(&self, record: SiteRecord) -> Result<SiteRecord, StoreError> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete_site(&self, site_id: &str) -> Result<(), StoreError> {
        self.records.remove(site_id);
        Ok(())
    }
}
