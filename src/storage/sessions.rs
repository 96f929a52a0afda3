//! In-memory registry of download sessions.
//!
//! Each session id maps to its latest progress record. The record lives inside
//! a `watch` channel, so stream endpoints are woken on every replacement
//! instead of polling, and a subscriber that arrives late still sees the most
//! recent (possibly terminal) record.

use crate::download::progress::ProgressRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct SessionEntry {
    tx: watch::Sender<ProgressRecord>,
    updated_at: Instant,
}

/// Shared handle to the session registry. Cloning is cheap.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        // A panic while holding the lock cannot leave a half-written entry
        // behind, so a poisoned map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new session with a `starting` record and returns its id.
    pub fn create(&self) -> String {
        let mut sessions = self.lock();
        let mut id = uuid::Uuid::new_v4().to_string();
        while sessions.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let (tx, _rx) = watch::channel(ProgressRecord::starting());
        sessions.insert(
            id.clone(),
            SessionEntry {
                tx,
                updated_at: Instant::now(),
            },
        );
        log::debug!("Session {} created ({} active)", id, sessions.len());
        id
    }

    /// Latest record of the session, if it is still registered.
    pub fn get(&self, id: &str) -> Option<ProgressRecord> {
        self.lock().get(id).map(|entry| entry.tx.borrow().clone())
    }

    /// Replaces the session's record and notifies subscribers.
    ///
    /// Returns `false` when the session no longer exists.
    pub fn set(&self, id: &str, record: ProgressRecord) -> bool {
        let mut sessions = self.lock();
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.tx.send_replace(record);
                entry.updated_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Removes the session, returning its last record.
    ///
    /// Live subscribers keep the last value they saw and observe the channel
    /// as closed.
    pub fn delete(&self, id: &str) -> Option<ProgressRecord> {
        let removed = self.lock().remove(id);
        removed.map(|entry| {
            log::debug!("Session {} removed", id);
            entry.tx.borrow().clone()
        })
    }

    /// Receiver that is notified on every `set` for this session.
    pub fn subscribe(&self, id: &str) -> Option<watch::Receiver<ProgressRecord>> {
        self.lock().get(id).map(|entry| entry.tx.subscribe())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops terminal sessions nobody is streaming that have not changed for `ttl`.
    ///
    /// Sessions still in progress are never reaped. Returns how many were removed.
    pub fn reap_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| {
            let expired = now.duration_since(entry.updated_at) >= ttl;
            let terminal = entry.tx.borrow().is_terminal();
            !(expired && terminal && entry.tx.receiver_count() == 0)
        });
        before - sessions.len()
    }

    /// Runs `reap_expired` every `interval` for the life of the process.
    pub fn spawn_reaper(&self, interval: Duration, ttl: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reaped = store.reap_expired(ttl);
                if reaped > 0 {
                    log::info!("Reaped {} expired download session(s)", reaped);
                }
            }
        })
    }
}
