// ── Update coordinator ──
//
// Turns status intents into durable, version-guarded writes and keeps
// the in-memory site in sync with what actually landed. Every
// mutation of a site — automatic or manual — funnels through
// `commit`, which is only ever called with that site's slot lock
// held; the store-side version guard is the second line of defense
// against writers outside this session.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use shopsign_api::{RecordStore, StoreError};

use crate::config::RetryPolicy;
use crate::convert::{site_from_record, write_from_intent};
use crate::engine;
use crate::error::CoreError;
use crate::geo::GeoPoint;
use crate::model::{Site, StatusIntent};
use crate::registry::{SiteRegistry, SiteState};

/// Serialization point for all site writes.
pub struct UpdateCoordinator<S: RecordStore> {
    store: Arc<S>,
    registry: Arc<SiteRegistry>,
    retry: RetryPolicy,
}

impl<S: RecordStore> UpdateCoordinator<S> {
    pub(crate) fn new(store: Arc<S>, registry: Arc<SiteRegistry>, retry: RetryPolicy) -> Self {
        Self {
            store,
            registry,
            retry,
        }
    }

    /// Commit an intent. Caller holds the site's slot lock.
    ///
    /// Returns the committed site, or `None` when the intent was
    /// dropped without a write: superseded by a newer version that
    /// already matches the desired state, or cancelled mid-retry.
    ///
    /// * Version mismatch: drop the intent, re-read the record,
    ///   refresh the local copy, re-evaluate against `last_known`,
    ///   and commit the fresh intent if one is still warranted.
    ///   Never overwrites a record newer than the intent's basis.
    /// * Transient failure: exponential backoff, bounded by the retry
    ///   budget; the sleep races the cancellation token so shutdown
    ///   aborts in-flight retries.
    pub(crate) async fn commit(
        &self,
        state: &mut SiteState,
        intent: StatusIntent,
        last_known: Option<GeoPoint>,
        cancel: &CancellationToken,
    ) -> Result<Option<Site>, CoreError> {
        let mut intent = intent;
        let mut attempt: u32 = 0;

        loop {
            let site_id = intent.site_id.clone();
            let write = write_from_intent(&intent);
            match self.store.conditional_update(site_id.as_str(), write).await {
                Ok(record) => {
                    let committed = site_from_record(&record)?;
                    debug!(
                        site_id = %site_id,
                        intent_id = %intent.intent_id,
                        from = %intent.from_status,
                        to = %intent.to_status,
                        version = committed.version,
                        "status committed"
                    );
                    state.site = committed.clone();
                    self.registry.publish(committed.clone());
                    return Ok(Some(committed));
                }

                Err(StoreError::VersionMismatch { stored_version }) => {
                    // Someone else advanced the record (cross-device
                    // write, or a race this session's lock cannot
                    // cover). Discard the stale intent and decide
                    // again from the fresh truth.
                    warn!(
                        site_id = %site_id,
                        intent_id = %intent.intent_id,
                        based_on = intent.based_on_version,
                        stored = stored_version,
                        "stale write rejected; re-reading"
                    );
                    let record = self.store.get_site(site_id.as_str()).await?;
                    let fresh = site_from_record(&record)?;
                    state.site = fresh.clone();
                    self.registry.publish(fresh.clone());

                    let Some(location) = last_known else {
                        return Ok(None);
                    };
                    match engine::evaluate(&fresh, location) {
                        Some(next) => {
                            attempt += 1;
                            if attempt >= self.retry.max_attempts {
                                return Err(CoreError::RetriesExhausted { attempts: attempt });
                            }
                            intent = next;
                        }
                        // Fresh state already matches the desired
                        // status (or an override landed) — no write.
                        None => return Ok(None),
                    }
                }

                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.retry.max_attempts {
                        warn!(
                            site_id = %site_id,
                            intent_id = %intent.intent_id,
                            attempts = attempt,
                            "retry budget exhausted; dropping intent"
                        );
                        return Err(CoreError::RetriesExhausted { attempts: attempt });
                    }
                    let delay = self.retry.delay_for(attempt - 1);
                    debug!(
                        site_id = %site_id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient store failure; backing off"
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            debug!(site_id = %site_id, "cancelled during backoff; intent dropped");
                            return Ok(None);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }

                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tokio::sync::Mutex;

    use shopsign_api::{MemoryStore, SiteRecord, StatusWrite};

    use super::*;
    use crate::model::{ChangeCause, SiteId, Status};

    fn seed_record(status: &str, version: u64) -> SiteRecord {
        SiteRecord {
            id: "site-a".into(),
            owner_id: "owner-1".into(),
            latitude: 37.7749,
            longitude: -122.4194,
            radius_meters: 50.0,
            status: status.into(),
            override_active: false,
            version,
            last_change_at: Utc::now(),
        }
    }

    fn setup(status: &str, version: u64) -> (Arc<MemoryStore>, UpdateCoordinator<MemoryStore>, Mutex<SiteState>) {
        let store = Arc::new(MemoryStore::new());
        let record = seed_record(status, version);
        store.seed(record.clone());

        let registry = Arc::new(SiteRegistry::new());
        let site = site_from_record(&record).unwrap();
        registry.insert(site.clone());

        let coordinator =
            UpdateCoordinator::new(Arc::clone(&store), registry, RetryPolicy::default());
        let state = Mutex::new(SiteState { site });
        (store, coordinator, state)
    }

    fn open_intent(site: &Site) -> StatusIntent {
        StatusIntent::new(
            site.id.clone(),
            site.status,
            Status::Open,
            ChangeCause::Automatic,
            site.version,
        )
    }

    #[tokio::test]
    async fn successful_commit_bumps_version_and_publishes() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;

        let intent = open_intent(&guard.site);
        let committed = coordinator
            .commit(&mut guard, intent, None, &cancel)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(committed.status, Status::Open);
        assert_eq!(committed.version, 1);
        assert_eq!(guard.site.version, 1);

        let stored = store.get_site("site-a").await.unwrap();
        assert_eq!(stored.status, "OPEN");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn stale_intent_is_discarded_when_fresh_state_matches() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = open_intent(&guard.site);

        // External writer beat us to it and already set OPEN.
        store
            .external_write(
                "site-a",
                StatusWrite {
                    status: "OPEN".into(),
                    override_active: false,
                    based_on_version: 0,
                    changed_at: Utc::now(),
                },
            )
            .unwrap();

        let location = crate::geo::GeoPoint::new(37.7749, -122.4194).unwrap();
        let outcome = coordinator
            .commit(&mut guard, intent, Some(location), &cancel)
            .await
            .unwrap();

        // No further write: the re-evaluation found nothing to change.
        assert!(outcome.is_none());
        assert_eq!(guard.site.status, Status::Open);
        assert_eq!(guard.site.version, 1);
        assert_eq!(store.get_site("site-a").await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn stale_intent_recommits_when_change_still_warranted() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = open_intent(&guard.site);

        // External writer set CLOSED; we are standing at the center,
        // so the re-evaluation still wants OPEN — based on the fresh
        // version this time.
        store
            .external_write(
                "site-a",
                StatusWrite {
                    status: "CLOSED".into(),
                    override_active: false,
                    based_on_version: 0,
                    changed_at: Utc::now(),
                },
            )
            .unwrap();

        let location = crate::geo::GeoPoint::new(37.7749, -122.4194).unwrap();
        let committed = coordinator
            .commit(&mut guard, intent, Some(location), &cancel)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(committed.status, Status::Open);
        assert_eq!(committed.version, 2);
    }

    #[tokio::test]
    async fn stale_manual_intent_respects_newer_override() {
        let (store, coordinator, state) = setup("CLOSED", 3);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = StatusIntent::new(
            SiteId::new("site-a"),
            Status::Closed,
            Status::Open,
            ChangeCause::Manual,
            3,
        );

        // A cross-device manual toggle landed first and pinned an
        // override. Our stale manual intent must not overwrite it.
        store
            .external_write(
                "site-a",
                StatusWrite {
                    status: "OPEN".into(),
                    override_active: true,
                    based_on_version: 3,
                    changed_at: Utc::now(),
                },
            )
            .unwrap();

        let location = crate::geo::GeoPoint::new(37.77944, -122.4194).unwrap();
        let outcome = coordinator
            .commit(&mut guard, intent, Some(location), &cancel)
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert!(guard.site.override_active);
        assert_eq!(store.get_site("site-a").await.unwrap().version, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_with_backoff() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = open_intent(&guard.site);

        store.fail_transient(2);

        let committed = coordinator
            .commit(&mut guard, intent, None, &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(committed.version, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_budget_exhaustion_surfaces() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = open_intent(&guard.site);

        store.fail_transient(10);

        let err = coordinator
            .commit(&mut guard, intent, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::RetriesExhausted { .. }));

        // Nothing landed; the next pass will converge.
        assert_eq!(store.get_site("site-a").await.unwrap().version, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_drops_the_intent_mid_backoff() {
        let (store, coordinator, state) = setup("UNKNOWN", 0);
        let cancel = CancellationToken::new();
        let mut guard = state.lock().await;
        let intent = open_intent(&guard.site);

        store.fail_transient(10);
        cancel.cancel();

        let outcome = coordinator
            .commit(&mut guard, intent, None, &cancel)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(store.get_site("site-a").await.unwrap().version, 0);
    }
}
