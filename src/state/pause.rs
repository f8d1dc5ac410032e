//! Cooperative pause/resume gate
//!
//! Any number of independent callers may hold a pause. The scan stays paused
//! until every holder has resumed. The driver only stops at its own
//! suspension points, so an in-flight page or module always completes.

use crate::audit::Spider;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

pub struct PauseCoordinator {
    holders: Mutex<HashSet<String>>,
    paused_tx: watch::Sender<bool>,
    spider: Arc<dyn Spider>,
}

impl PauseCoordinator {
    pub fn new(spider: Arc<dyn Spider>) -> Self {
        let (paused_tx, _) = watch::channel(false);
        Self {
            holders: Mutex::new(HashSet::new()),
            paused_tx,
            spider,
        }
    }

    /// Registers a pause request for `caller`
    ///
    /// Returns false if `caller` already held a pause.
    pub fn pause(&self, caller: &str) -> bool {
        let inserted = {
            let mut holders = self.lock_holders();
            let inserted = holders.insert(caller.to_string());
            self.paused_tx.send_replace(!holders.is_empty());
            inserted
        };

        self.spider.pause();
        if inserted {
            tracing::info!("Scan paused by '{}'", caller);
        }
        inserted
    }

    /// Drops the pause request held by `caller`
    ///
    /// Returns false (and changes nothing) if `caller` held no pause.
    pub fn resume(&self, caller: &str) -> bool {
        let (removed, still_paused) = {
            let mut holders = self.lock_holders();
            let removed = holders.remove(caller);
            let still_paused = !holders.is_empty();
            self.paused_tx.send_replace(still_paused);
            (removed, still_paused)
        };

        if !removed {
            return false;
        }

        if still_paused {
            tracing::info!("'{}' resumed, scan still held by other callers", caller);
        } else {
            self.spider.resume();
            tracing::info!("Scan resumed by '{}'", caller);
        }
        true
    }

    pub fn is_paused(&self) -> bool {
        !self.lock_holders().is_empty()
    }

    /// Callers currently holding a pause, sorted
    pub fn holders(&self) -> Vec<String> {
        let mut holders: Vec<String> = self.lock_holders().iter().cloned().collect();
        holders.sort();
        holders
    }

    /// Suspension point: returns once no pause is held
    pub async fn wait_if_paused(&self) {
        let mut rx = self.paused_tx.subscribe();
        if !*rx.borrow_and_update() {
            return;
        }

        tracing::debug!("Waiting for resume");
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// Drops every pause request
    pub fn clear(&self) {
        let mut holders = self.lock_holders();
        holders.clear();
        self.paused_tx.send_replace(false);
    }

    fn lock_holders(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned set is still a valid set of strings
        self.holders.lock().unwrap_or_else(|e| e.into_inner())
    }
}
