// Package deployment provides the single-assignment deployment future.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;

use super::result::DeploymentResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deployment future is already resolved")]
pub struct AlreadyResolvedError;

struct Inner {
    slot: Mutex<Option<DeploymentResult>>,
    cond: Condvar,
    notify: Notify,
}

/// DeploymentFuture is written once by the orchestrator and read by any number of
/// callers, either blocking or async.
#[derive(Clone)]
pub struct DeploymentFuture {
    inner: Arc<Inner>,
}

impl DeploymentFuture {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(None),
                cond: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Stores the result. A second write is rejected and the first value stays.
    pub(crate) fn resolve(&self, result: DeploymentResult) -> Result<(), AlreadyResolvedError> {
        {
            let mut slot = self.inner.slot.lock();
            if slot.is_some() {
                return Err(AlreadyResolvedError);
            }
            *slot = Some(result);
            self.inner.cond.notify_all();
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    pub fn is_done(&self) -> bool {
        self.inner.slot.lock().is_some()
    }

    /// Gets the result if it is already there.
    pub fn try_result(&self) -> Option<DeploymentResult> {
        self.inner.slot.lock().clone()
    }

    /// Blocks the current thread until the result is available.
    ///
    /// Must not be called from an async worker thread; use [`DeploymentFuture::wait`] there.
    pub fn get(&self) -> DeploymentResult {
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            self.inner.cond.wait(&mut slot);
        }
    }

    /// Blocks for at most `timeout`. Returns None if the result did not arrive in time;
    /// the deployment itself keeps going.
    pub fn get_timeout(&self, timeout: Duration) -> Option<DeploymentResult> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.slot.lock();
        loop {
            if let Some(result) = slot.as_ref() {
                return Some(result.clone());
            }
            if self.inner.cond.wait_until(&mut slot, deadline).timed_out() {
                return slot.clone();
            }
        }
    }

    /// Waits asynchronously for the result.
    pub async fn wait(&self) -> DeploymentResult {
        loop {
            // Registered before the check so a resolve in between is not missed.
            let notified = self.inner.notify.notified();
            if let Some(result) = self.try_result() {
                return result;
            }
            notified.await;
        }
    }
}
