use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::error::{ConflictSnafu, Result};
use crate::database::Thing;

/// Per-record async locks serializing read-modify-write sequences.
///
/// Locks are always taken in the order of the record ids' string form, so two requests touching
/// an overlapping set of records cannot deadlock.
#[derive(Debug, Clone)]
pub struct Locks {
    entries: Arc<DashMap<Thing, Arc<Mutex<()>>>>,
    timeout: Duration,
}

/// Held locks, released on drop.
#[derive(Debug)]
pub struct Held {
    guards: Vec<OwnedMutexGuard<()>>,
    ids: Vec<Thing>,
    entries: Arc<DashMap<Thing, Arc<Mutex<()>>>>,
}

impl Drop for Held {
    fn drop(&mut self) {
        self.guards.clear();
        prune(&self.entries, &self.ids);
    }
}

/// Forgets the mutexes of records nobody holds or waits for.
fn prune(entries: &DashMap<Thing, Arc<Mutex<()>>>, ids: &[Thing]) {
    for id in ids {
        entries.remove_if(id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

impl Locks {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: Arc::default(),
            timeout,
        }
    }

    fn entry(&self, id: &Thing) -> Arc<Mutex<()>> {
        self.entries.entry(id.clone()).or_default().clone()
    }

    /// Locks every record, giving up with a conflict once the timeout passes.
    pub async fn lock_all(&self, ids: &[&Thing]) -> Result<Held> {
        let mut ids: Vec<Thing> = ids.iter().map(|id| (*id).clone()).collect();
        ids.sort_by_cached_key(|id| id.to_string());
        ids.dedup();

        let mutexes: Vec<_> = ids.iter().map(|id| self.entry(id)).collect();
        let acquire = async {
            let mut guards = Vec::with_capacity(mutexes.len());
            for mutex in mutexes {
                guards.push(mutex.lock_owned().await);
            }
            guards
        };

        match tokio::time::timeout(self.timeout, acquire).await {
            Ok(guards) => Ok(Held {
                guards,
                ids,
                entries: self.entries.clone(),
            }),
            Err(_) => {
                prune(&self.entries, &ids);
                tracing::warn!(records = ?ids, timeout = ?self.timeout, "gave up waiting for record locks");
                ConflictSnafu {
                    message: format!("{} record(s) are being modified by another request", ids.len()),
                }
                .fail()
            }
        }
    }

    pub async fn lock(&self, id: &Thing) -> Result<Held> {
        self.lock_all(&[id]).await
    }
}
