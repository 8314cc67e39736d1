// ── Monitoring session ──
//
// Full lifecycle management for one owner's proximity monitoring.
// Loads the owner's sites, consumes the location stream and a
// periodic timer, and exposes the manual-action surface. Cheaply
// cloneable via `Arc<SessionInner>`.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::join_all;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use shopsign_api::{LocationFix, RecordStore, SiteRecord, SourceEvent};

use crate::config::SessionConfig;
use crate::convert::{sample_from_fix, site_from_record};
use crate::coordinator::UpdateCoordinator;
use crate::engine;
use crate::error::CoreError;
use crate::model::{LocationSample, Site, SiteId};
use crate::registry::{SiteRegistry, SiteSlot};
use crate::stream::SiteStream;

// ── SessionState ─────────────────────────────────────────────────────

/// Session lifecycle state observable by consumers.
///
/// `Starting` exists only to guard against concurrent `start()`
/// calls. `Degraded` means the location source terminated: evaluation
/// stalls on the last known sample until the source is resumed, but
/// the timer and manual actions keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Starting,
    Active,
    Degraded,
}

// ── MonitoringSession ────────────────────────────────────────────────

/// The main entry point for consumers.
pub struct MonitoringSession<S: RecordStore> {
    inner: Arc<SessionInner<S>>,
}

impl<S: RecordStore> Clone for MonitoringSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct SessionInner<S: RecordStore> {
    config: SessionConfig,
    store: Arc<S>,
    registry: Arc<SiteRegistry>,
    coordinator: UpdateCoordinator<S>,
    state: watch::Sender<SessionState>,
    /// Single most recent trusted sample. Lock-free reads from the
    /// reconcile pass; samples are never retained beyond this cell.
    last_sample: ArcSwapOption<LocationSample>,
    cancel: CancellationToken,
    /// Child token for the current run — cancelled on stop, replaced
    /// on the next start (avoids permanent cancellation).
    cancel_child: Mutex<CancellationToken>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Background-path failures recorded for observability; they are
    /// never surfaced as errors, the next pass self-heals.
    warnings: Mutex<Vec<String>>,
}

impl<S: RecordStore> MonitoringSession<S> {
    /// Create a session. Does NOT load anything or spawn tasks --
    /// call [`start()`](Self::start) for that.
    pub fn new(config: SessionConfig, store: Arc<S>) -> Self {
        let registry = Arc::new(SiteRegistry::new());
        let coordinator =
            UpdateCoordinator::new(Arc::clone(&store), Arc::clone(&registry), config.retry);
        let (state, _) = watch::channel(SessionState::Stopped);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(SessionInner {
                config,
                store,
                registry,
                coordinator,
                state,
                last_sample: ArcSwapOption::empty(),
                cancel,
                cancel_child: Mutex::new(cancel_child),
                task_handles: Mutex::new(Vec::new()),
                warnings: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start monitoring: load the owner's sites, attach the location
    /// source, and spawn the sample intake and reconcile timer tasks.
    ///
    /// A `start()` while the session is already starting or active is
    /// a no-op.
    pub async fn start(
        &self,
        owner_id: &str,
        source: mpsc::Receiver<SourceEvent>,
    ) -> Result<(), CoreError> {
        // Atomically claim the Stopped -> Starting edge.
        let mut claimed = false;
        self.inner.state.send_if_modified(|s| {
            if *s == SessionState::Stopped {
                *s = SessionState::Starting;
                claimed = true;
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!("start() ignored: session already starting or active");
            return Ok(());
        }

        // Fresh child token for this run (supports stop/re-start).
        let child = self.inner.cancel.child_token();
        *self.inner.cancel_child.lock().await = child.clone();

        // Bulk-read the owner's sites into the registry.
        // State transitions use `send_replace`: it stores the value
        // even with zero receivers, and nothing obliges a consumer to
        // hold a `state()` subscription.
        let records = match self.inner.store.load_sites(owner_id).await {
            Ok(records) => records,
            Err(e) => {
                self.inner.state.send_replace(SessionState::Stopped);
                return Err(e.into());
            }
        };
        for record in &records {
            match site_from_record(record) {
                Ok(site) => self.inner.registry.insert(site),
                Err(e) => {
                    self.inner.registry.clear();
                    self.inner.state.send_replace(SessionState::Stopped);
                    return Err(e);
                }
            }
        }
        info!(owner_id, sites = self.inner.registry.len(), "sites loaded");

        let mut handles = self.inner.task_handles.lock().await;

        {
            let session = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(sample_intake_task(session, source, cancel)));
        }
        {
            let session = self.clone();
            let cancel = child.clone();
            handles.push(tokio::spawn(reconcile_timer_task(session, cancel)));
        }
        drop(handles);

        self.inner.state.send_replace(SessionState::Active);
        info!(owner_id, "monitoring session active");
        Ok(())
    }

    /// Stop monitoring. Cancels in-flight work (including coordinator
    /// backoff loops — uncommitted intents are dropped), joins the
    /// background tasks, and clears the registry. Idempotent.
    pub async fn stop(&self) {
        if *self.inner.state.borrow() == SessionState::Stopped {
            return;
        }

        self.inner.cancel_child.lock().await.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        // Stopped first, so new manual actions fail fast while we
        // wait out the in-flight ones below.
        self.inner.state.send_replace(SessionState::Stopped);

        // A manual action holds its site's slot lock across the store
        // write; taking every lock here waits out those commits so
        // none of them republishes into the cleared registry.
        for (_, slot) in self.inner.registry.all_slots() {
            drop(slot.state.lock().await);
        }

        self.inner.registry.clear();
        self.inner.last_sample.store(None);
        debug!("monitoring session stopped");
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Run one reconciliation pass over all sites using the last
    /// known sample. This is the entry point the background scheduler
    /// invokes when the process is not foregrounded; the periodic
    /// timer calls it too.
    ///
    /// Sites are evaluated concurrently with each other; within one
    /// site the slot lock serializes against samples and manual
    /// actions. Failures are recorded as warnings, never raised.
    pub async fn run_reconcile_pass(&self) {
        let Some(sample) = self.inner.last_sample.load_full() else {
            debug!("reconcile pass skipped: no location sample yet");
            return;
        };

        let cancel = self.inner.cancel_child.lock().await.clone();
        let slots = self.inner.registry.all_slots();
        let passes = slots
            .iter()
            .map(|(id, slot)| self.reconcile_site(id, slot, *sample, &cancel));
        join_all(passes).await;
    }

    /// Evaluate and, if warranted, commit one site against a sample.
    async fn reconcile_site(
        &self,
        id: &SiteId,
        slot: &Arc<SiteSlot>,
        sample: LocationSample,
        cancel: &CancellationToken,
    ) {
        let mut state = slot.state.lock().await;
        let Some(intent) = engine::evaluate(&state.site, sample.point) else {
            return;
        };

        let result = self
            .inner
            .coordinator
            .commit(&mut state, intent, Some(sample.point), cancel)
            .await;
        if let Err(e) = result {
            self.record_warning(format!("automatic update for {id} failed: {e}"))
                .await;
        }
    }

    /// Ingest one raw location fix: validate, gate on accuracy,
    /// remember it as the last known sample, and reconcile all sites.
    async fn handle_fix(&self, fix: LocationFix) {
        let sample = match sample_from_fix(&fix) {
            Ok(sample) => sample,
            Err(e) => {
                self.record_warning(format!("rejected malformed location fix: {e}"))
                    .await;
                return;
            }
        };
        if !engine::sample_trusted(&sample, self.inner.config.max_accuracy_meters) {
            debug!(
                accuracy_m = sample.accuracy_meters,
                threshold_m = self.inner.config.max_accuracy_meters,
                "sample too coarse; skipping evaluation"
            );
            return;
        }

        self.inner.last_sample.store(Some(Arc::new(sample)));
        self.run_reconcile_pass().await;
    }

    // ── Manual-action surface ────────────────────────────────────────

    /// Flip a site's status and pin the manual override. Always
    /// writes — an explicit user action is never a no-op.
    pub async fn toggle_status(&self, site_id: &SiteId) -> Result<Site, CoreError> {
        self.require_running()?;
        let slot = self
            .inner
            .registry
            .slot(site_id)
            .ok_or_else(|| CoreError::SiteNotFound {
                site_id: site_id.to_string(),
            })?;
        let cancel = self.inner.cancel_child.lock().await.clone();

        let mut state = slot.state.lock().await;
        let intent = engine::plan_toggle(&state.site);
        info!(site_id = %site_id, from = %intent.from_status, to = %intent.to_status, "manual toggle");

        let last_known = self.inner.last_sample.load_full().map(|s| s.point);
        self.inner
            .coordinator
            .commit(&mut state, intent, last_known, &cancel)
            .await?;
        Ok(state.site.clone())
    }

    /// Clear the manual override and converge back to the automatic
    /// status. With no location known yet, the status stays put; the
    /// next trusted sample or timer pass converges it, since clearing
    /// the flag re-arms automatic evaluation. Clearing a site with no
    /// active override is a no-op.
    pub async fn clear_override(&self, site_id: &SiteId) -> Result<Site, CoreError> {
        self.require_running()?;
        let slot = self
            .inner
            .registry
            .slot(site_id)
            .ok_or_else(|| CoreError::SiteNotFound {
                site_id: site_id.to_string(),
            })?;
        let cancel = self.inner.cancel_child.lock().await.clone();

        let mut state = slot.state.lock().await;
        if !state.site.override_active {
            return Ok(state.site.clone());
        }

        let last_known = self.inner.last_sample.load_full().map(|s| s.point);
        let intent = engine::plan_clear_override(&state.site, last_known);
        info!(site_id = %site_id, to = %intent.to_status, deferred = last_known.is_none(), "override cleared");

        self.inner
            .coordinator
            .commit(&mut state, intent, last_known, &cancel)
            .await?;
        Ok(state.site.clone())
    }

    // ── Site registration ────────────────────────────────────────────

    /// Register a new place: create its durable record and start
    /// monitoring it within this session.
    pub async fn register_site(&self, record: SiteRecord) -> Result<Site, CoreError> {
        self.require_running()?;
        // Validate before writing anything.
        let site = site_from_record(&record)?;
        self.inner.store.create_site(record).await?;
        self.inner.registry.insert(site.clone());
        info!(site_id = %site.id, "site registered");
        Ok(site)
    }

    /// Deregister a place: drop it from this session and delete its
    /// durable record.
    pub async fn deregister_site(&self, site_id: &SiteId) -> Result<(), CoreError> {
        self.require_running()?;
        if self.inner.registry.slot(site_id).is_none() {
            return Err(CoreError::SiteNotFound {
                site_id: site_id.to_string(),
            });
        }
        self.inner.store.delete_site(site_id.as_str()).await?;
        self.inner.registry.remove(site_id);
        info!(site_id = %site_id, "site deregistered");
        Ok(())
    }

    // ── State observation ────────────────────────────────────────────

    /// Read-only snapshot of all sites (the UI layer's read path).
    pub fn snapshot(&self) -> Arc<Vec<Site>> {
        self.inner.registry.snapshot()
    }

    /// Last committed copy of a single site.
    pub fn site(&self, site_id: &SiteId) -> Option<Site> {
        self.inner.registry.get(site_id)
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> SiteStream {
        SiteStream::new(self.inner.registry.subscribe())
    }

    /// Subscribe to session lifecycle changes.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Drain warnings recorded on background paths.
    pub async fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.warnings.lock().await)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn require_running(&self) -> Result<(), CoreError> {
        match *self.inner.state.borrow() {
            SessionState::Active | SessionState::Degraded => Ok(()),
            SessionState::Stopped | SessionState::Starting => Err(CoreError::SessionNotActive),
        }
    }

    async fn record_warning(&self, message: String) {
        warn!("{message}");
        self.inner.warnings.lock().await.push(message);
    }

    fn mark_degraded(&self) {
        self.inner.state.send_if_modified(|s| {
            if *s == SessionState::Active {
                *s = SessionState::Degraded;
                true
            } else {
                false
            }
        });
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Consume the location stream until cancellation or termination.
async fn sample_intake_task<S: RecordStore>(
    session: MonitoringSession<S>,
    mut source: mpsc::Receiver<SourceEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = source.recv() => {
                match event {
                    Some(SourceEvent::Fix(fix)) => session.handle_fix(fix).await,
                    Some(SourceEvent::Ended(err)) => {
                        warn!(error = %err, "location source terminated; session degraded");
                        session.mark_degraded();
                        break;
                    }
                    None => {
                        debug!("location channel closed; session degraded");
                        session.mark_degraded();
                        break;
                    }
                }
            }
        }
    }
}

/// Periodic reconciliation on the last known sample. Covers the gap
/// when the process was suspended between samples, and converges
/// sites flagged by a deferred override clear.
async fn reconcile_timer_task<S: RecordStore>(
    session: MonitoringSession<S>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(session.inner.config.reconcile_interval);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                session.run_reconcile_pass().await;
            }
        }
    }
}
