//! Cooperative cancellation of a running pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use leadconsole_shared::Result;

use crate::session::PipelineSessionState;

/// Stop flag shared between the executor and whoever requests a stop.
///
/// The flag is mirrored in the session store so that a stop requested from
/// another process (a second CLI invocation) is observed by the executor.
/// [`raise`](Self::raise) only flips the in-memory flag and is safe to call
/// from synchronous callbacks.
#[derive(Clone)]
pub struct CancellationSignal {
    local: Arc<AtomicBool>,
    wake: Arc<Notify>,
    state: PipelineSessionState,
}

impl CancellationSignal {
    pub fn new(state: PipelineSessionState) -> Self {
        Self {
            local: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            state,
        }
    }

    /// Set the in-process flag only, waking any pending [`raised`](Self::raised).
    pub fn raise(&self) {
        self.local.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Resolves once the in-process flag is set.
    ///
    /// Stops stored by another process are not observed here.
    pub async fn raised(&self) {
        let notified = self.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.local.load(Ordering::SeqCst) {
            return;
        }
        notified.await;
    }

    /// Set the flag both in-process and in the session store.
    pub async fn request_stop(&self) -> Result<()> {
        self.raise();
        self.state.set_cancel_requested(true).await
    }

    pub async fn is_set(&self) -> Result<bool> {
        if self.local.load(Ordering::SeqCst) {
            return Ok(true);
        }
        self.state.cancel_requested().await
    }

    pub async fn clear(&self) -> Result<()> {
        self.local.store(false, Ordering::SeqCst);
        self.state.set_cancel_requested(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadconsole_storage::Storage;
    use uuid::Uuid;

    async fn test_state() -> PipelineSessionState {
        let tmp = std::env::temp_dir().join(format!("lc_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open test db");
        PipelineSessionState::new(Arc::new(storage), "test")
    }

    #[tokio::test]
    async fn raise_is_local_only() {
        let state = test_state().await;
        let signal = CancellationSignal::new(state.clone());
        signal.raise();
        assert!(signal.is_set().await.unwrap());
        assert!(!state.cancel_requested().await.unwrap());
    }

    #[tokio::test]
    async fn raised_wakes_on_raise() {
        let state = test_state().await;
        let signal = CancellationSignal::new(state);
        let waiter = signal.clone();

        let (woke, ()) = tokio::join!(
            tokio::time::timeout(std::time::Duration::from_secs(2), waiter.raised()),
            async { signal.raise() }
        );
        assert!(woke.is_ok());

        // Already raised: resolves immediately.
        tokio::time::timeout(std::time::Duration::from_millis(50), signal.raised())
            .await
            .expect("raised returns at once when the flag is set");
    }

    #[tokio::test]
    async fn stored_flag_is_seen_by_other_handles() {
        let state = test_state().await;
        let runner = CancellationSignal::new(state.clone());
        let stopper = CancellationSignal::new(state.clone());
        assert!(!runner.is_set().await.unwrap());

        stopper.request_stop().await.unwrap();
        assert!(runner.is_set().await.unwrap());

        runner.clear().await.unwrap();
        assert!(!runner.is_set().await.unwrap());
        assert!(!state.cancel_requested().await.unwrap());
    }
}
