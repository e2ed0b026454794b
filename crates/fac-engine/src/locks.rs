use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per key (profile id or employee id).
///
/// Only serializes writers inside this process. Cross-process correctness
/// comes from the store's version check.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: Uuid) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            // drop idle slots so the map does not grow with every key ever seen
            slots.retain(|k, m| *k == key || Arc::strong_count(m) > 1);
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }
}
