use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per alert rule id.
///
/// Holding a rule's guard across read-cooldown, evaluate and persist keeps two
/// workers from triggering the same rule twice.
#[derive(Default)]
pub struct RuleLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RuleLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn acquire(&self, rule_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(rule_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Forget locks for rules no longer in `active`. Locks currently held are kept.
    pub fn retain_active<'a>(&self, active: impl IntoIterator<Item = &'a str>) {
        let keep: std::collections::HashSet<&str> = active.into_iter().collect();
        self.locks
            .retain(|id, lock| keep.contains(id.as_str()) || Arc::strong_count(lock) > 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
