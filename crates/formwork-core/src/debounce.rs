//! Debounce windows
//!
//! Coalesces bursts of change notifications into one deferred action: each
//! call bumps a generation counter, and only the task holding the latest
//! generation runs after its delay. Used for validation scheduling and
//! storage persistence.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

#[derive(Debug, Default)]
pub(crate) struct Debouncer {
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Schedule `make` to run after `delay` unless superseded
    ///
    /// Returns `false` when no tokio runtime is available; the caller decides
    /// on a synchronous fallback.
    pub(crate) fn schedule<F, Fut>(&self, delay: Duration, make: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let latest = Arc::clone(&self.generation);
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            if latest.load(Ordering::SeqCst) == generation {
                make().await;
            }
        });
        true
    }

    /// Invalidate all scheduled runs
    pub(crate) fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn only_latest_generation_runs() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            debouncer.schedule(Duration::from_millis(10), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_runs() {
        let debouncer = Debouncer::new();
        let runs = Arc::new(AtomicUsize::new(0));
        {
            let runs = Arc::clone(&runs);
            debouncer.schedule(Duration::from_millis(10), move || async move {
                runs.fetch_add(1, Ordering::SeqCst);
            });
        }
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
