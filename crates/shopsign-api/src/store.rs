// ── Record store trait ──
//
// The durable store is the source of truth for cross-device
// consistency. The engine needs exactly three capabilities from it:
// bulk-read by owner, single read, and conditional update-by-version.
// Change-notification streams for UI refresh are a collaborator
// concern and deliberately absent here.

use std::future::Future;

use crate::error::StoreError;
use crate::records::{SiteRecord, StatusWrite};

/// Durable storage for site records.
///
/// Methods return `Send` futures so sessions can drive them from
/// spawned tasks. Implementations must apply `conditional_update`
/// atomically with respect to concurrent writers: the version guard
/// check and the write are one indivisible step.
pub trait RecordStore: Send + Sync + 'static {
    /// Read all site records registered to an owner.
    fn load_sites(
        &self,
        owner_id: &str,
    ) -> impl Future<Output = Result<Vec<SiteRecord>, StoreError>> + Send;

    /// Read a single site record.
    fn get_site(
        &self,
        site_id: &str,
    ) -> impl Future<Output = Result<SiteRecord, StoreError>> + Send;

    /// Apply a status write only if the stored version matches
    /// `write.based_on_version`. On success the returned record has
    /// `version == based_on_version + 1`. On guard failure returns
    /// [`StoreError::VersionMismatch`] and leaves the record untouched.
    fn conditional_update(
        &self,
        site_id: &str,
        write: StatusWrite,
    ) -> impl Future<Output = Result<SiteRecord, StoreError>> + Send;

    /// Create a record for a newly registered place.
    fn create_site(
        &self,
        record: SiteRecord,
    ) -> impl Future<Output = Result<SiteRecord, StoreError>> + Send;

    /// Delete a record when the owner deregisters the place.
    fn delete_site(&self, site_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}
