//! Process-wide ingestion lock: exclusive,
//! fail-fast (rate-limit) on HTTP entry, block-and-hold for the
//! administrative batch driver.

use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct IngestionLock(Mutex<()>);

pub struct IngestionGuard<'a>(#[allow(dead_code)] MutexGuard<'a, ()>);

impl IngestionLock {
    pub fn new() -> Self {
        Self(Mutex::new(()))
    }

    /// HTTP entry point: fail fast with `None` rather than queue behind
    /// an in-progress ingestion.
    pub fn try_acquire(&self) -> Option<IngestionGuard<'_>> {
        self.0.try_lock().ok().map(IngestionGuard)
    }

    /// Administrative batch driver: block until the lock is free.
    pub async fn acquire(&self) -> IngestionGuard<'_> {
        IngestionGuard(self.0.lock().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_try_acquire_only_one_succeeds() {
        let lock = IngestionLock::new();
        let first = lock.try_acquire();
        assert!(first.is_some());

        let second = lock.try_acquire();
        assert!(second.is_none(), "a held lock must reject a concurrent try_acquire");

        drop(first);
        assert!(lock.try_acquire().is_some());
    }
}
