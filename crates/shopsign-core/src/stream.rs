// ── Reactive site snapshots ──
//
// Subscription type for consuming registry changes (the UI layer's
// read path).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Site;

/// A subscription to the session's site snapshots.
///
/// Provides both point-in-time snapshot access and change
/// notification via `changed()` or by converting into a `Stream`.
pub struct SiteStream {
    current: Arc<Vec<Site>>,
    receiver: watch::Receiver<Arc<Vec<Site>>>,
}

impl SiteStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Site>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at subscription time.
    pub fn current(&self) -> &Arc<Vec<Site>> {
        &self.current
    }

    /// The latest snapshot (may have changed since subscription).
    pub fn latest(&self) -> Arc<Vec<Site>> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the session has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Vec<Site>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SiteWatchStream {
        SiteWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by the registry's `watch` channel.
pub struct SiteWatchStream {
    inner: WatchStream<Arc<Vec<Site>>>,
}

impl Stream for SiteWatchStream {
    type Item = Arc<Vec<Site>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
