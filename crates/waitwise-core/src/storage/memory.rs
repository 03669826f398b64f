use std::sync::{Arc, Mutex, MutexGuard};

use super::DecisionStore;
use crate::decision::Decision;
use crate::error::PersistenceError;

/// In-process store. Nothing outlives the process.
///
/// The slot holds the serialized record so it goes through the same JSON path
/// as the on-disk store. Clones share the slot, which lets a test keep a
/// handle after handing the store to an engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slot().is_none()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DecisionStore for MemoryStore {
    fn save(&self, decision: &Decision) -> Result<(), PersistenceError> {
        let json = serde_json::to_string(decision)?;
        *self.slot() = Some(json);
        Ok(())
    }

    fn load(&self) -> Result<Option<Decision>, PersistenceError> {
        match self.slot().as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{Commitment, DecisionType};
    use chrono::{TimeZone, Utc};

    #[test]
    fn round_trip_and_clear() {
        let store = MemoryStore::new();
        let t0 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut d = Decision::draft(t0);
        d.begin_wait(Commitment::new(DecisionType::Feeling, "quit my job", 60), t0);

        store.save(&d).unwrap();
        assert_eq!(store.load().unwrap(), Some(d));

        let handle = store.clone();
        store.clear().unwrap();
        assert!(handle.is_empty());
        assert_eq!(handle.load().unwrap(), None);
    }
}
