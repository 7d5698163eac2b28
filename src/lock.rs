use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Non-reentrant FIFO mutual exclusion for the single engine handle.
///
/// Waiters are granted the lock strictly in the order `acquire` was called. Acquiring twice
/// from the same logical holder deadlocks, so code that already holds a [`LockRelease`]
/// must run against the engine directly.
#[derive(Clone, Default)]
pub struct AsyncExclusiveLock {
    inner: Arc<Mutex<()>>,
}

/// Capability returned by [`AsyncExclusiveLock::acquire`].
///
/// Whoever owns an unreleased capability owns the engine handle. Calling
/// [`LockRelease::release`] (or dropping the value) hands the lock to the next waiter.
pub struct LockRelease {
    _guard: OwnedMutexGuard<()>,
}

impl AsyncExclusiveLock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until every earlier request has been released, then take the lock.
    pub async fn acquire(&self) -> LockRelease {
        LockRelease {
            _guard: Arc::clone(&self.inner).lock_owned().await,
        }
    }

    /// Take the lock only if nobody holds it and nobody is queued ahead.
    #[must_use]
    pub fn try_acquire(&self) -> Option<LockRelease> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .ok()
            .map(|guard| LockRelease { _guard: guard })
    }
}

impl LockRelease {
    /// Release the lock to the next queued caller.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for AsyncExclusiveLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncExclusiveLock")
            .field("locked", &self.inner.try_lock().is_err())
            .finish()
    }
}

impl fmt::Debug for LockRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockRelease").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquire_waits_for_release() {
        let lock = AsyncExclusiveLock::new();
        let held = lock.acquire().await;
        assert!(lock.try_acquire().is_none());

        let waiter = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        held.release();
        let next = waiter.await.expect("waiter task");
        assert!(lock.try_acquire().is_none());
        next.release();
        assert!(lock.try_acquire().is_some());
    }
}
