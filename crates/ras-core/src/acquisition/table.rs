//! Lock table
//!
//! Concurrent map from resource key to the single live lock on it. Backed by
//! a sharded `DashMap`, so contention is per shard and independent keys
//! proceed in parallel. An absent key means the resource is unlocked.

use std::hash::Hash;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::scheduler::ExpiryHandle;
use super::types::AcquiredResource;

/// The live lock on one resource
#[derive(Debug)]
pub struct LockEntry {
    current: AcquiredResource,
    expiry: Option<Box<dyn ExpiryHandle>>,
}

impl LockEntry {
    /// Create an entry; `expiry` is `None` for locks that never expire
    pub fn new(current: AcquiredResource, expiry: Option<Box<dyn ExpiryHandle>>) -> Self {
        Self { current, expiry }
    }

    pub fn current(&self) -> &AcquiredResource {
        &self.current
    }

    pub fn has_expiry(&self) -> bool {
        self.expiry.is_some()
    }

    /// Best-effort cancel of the pending auto-unlock
    pub fn cancel_expiry(&self) {
        if let Some(handle) = &self.expiry {
            handle.cancel();
        }
    }
}

/// Thread-safe store holding at most one `LockEntry` per key
#[derive(Debug)]
pub struct LockTable<K>
where
    K: Eq + Hash,
{
    entries: DashMap<K, LockEntry>,
}

impl<K> Default for LockTable<K>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<K> LockTable<K>
where
    K: Eq + Hash,
{
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K> LockTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current lock on `key`, if any
    pub fn get(&self, key: &K) -> Option<AcquiredResource> {
        self.entries.get(key).map(|entry| entry.current.clone())
    }

    /// Insert or replace the entry for `key`, returning the replaced one
    pub fn put(&self, key: K, entry: LockEntry) -> Option<LockEntry> {
        self.entries.insert(key, entry)
    }

    /// Remove the entry for `key` only if `predicate` accepts it.
    ///
    /// The check and the removal happen under the same shard lock.
    pub fn remove_if<F>(&self, key: &K, predicate: F) -> Option<LockEntry>
    where
        F: FnOnce(&LockEntry) -> bool,
    {
        self.entries
            .remove_if(key, |_, entry| predicate(entry))
            .map(|(_, entry)| entry)
    }

    /// Remove the entry for `key` only if it still holds acquisition `id`
    pub fn remove_acquisition(&self, key: &K, id: Uuid) -> Option<LockEntry> {
        self.remove_if(key, |entry| entry.current.id() == id)
    }

    /// Attach the auto-unlock handle to acquisition `id`.
    ///
    /// Hands the handle back if `key` no longer holds that acquisition.
    pub fn attach_expiry(
        &self,
        key: &K,
        id: Uuid,
        handle: Box<dyn ExpiryHandle>,
    ) -> Result<(), Box<dyn ExpiryHandle>> {
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.current.id() == id => {
                entry.expiry = Some(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Exclusive access to the slot for `key` (holds the shard lock)
    pub(crate) fn entry(&self, key: K) -> Entry<'_, K, LockEntry> {
        self.entries.entry(key)
    }

    /// All live entries, in no particular order
    pub fn snapshot(&self) -> Vec<(K, AcquiredResource)> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().current.clone()))
            .collect()
    }

    /// Remove every entry, returning them
    pub fn drain(&self) -> Vec<(K, LockEntry)> {
        let keys: Vec<K> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::types::LockTimeout;

    fn entry_for(owner: &str) -> LockEntry {
        LockEntry::new(AcquiredResource::locked(owner, LockTimeout::default()), None)
    }

    #[test]
    fn test_get_missing_key() {
        let table: LockTable<String> = LockTable::new();
        assert!(table.get(&"R1".to_string()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_put_replaces_entry() {
        let table = LockTable::new();
        assert!(table.put("R1", entry_for("U1")).is_none());

        let replaced = table.put("R1", entry_for("U2")).expect("previous entry");
        assert_eq!(replaced.current().owner(), "U1");
        assert_eq!(table.get(&"R1").unwrap().owner(), "U2");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_if_checks_predicate() {
        let table = LockTable::new();
        table.put("R1", entry_for("U1"));

        assert!(table.remove_if(&"R1", |e| e.current().owner() == "U2").is_none());
        assert!(table.get(&"R1").is_some());

        assert!(table.remove_if(&"R1", |e| e.current().owner() == "U1").is_some());
        assert!(table.get(&"R1").is_none());
    }

    #[test]
    fn test_remove_acquisition_ignores_value_equal_replacement() {
        let table = LockTable::new();
        let first = AcquiredResource::locked("U1", LockTimeout::default());
        let first_id = first.id();
        table.put("R1", LockEntry::new(first, None));

        let second = AcquiredResource::locked("U1", LockTimeout::default());
        let second_id = second.id();
        table.put("R1", LockEntry::new(second, None));

        // Same owner and state, different acquisition
        assert!(table.remove_acquisition(&"R1", first_id).is_none());
        assert_eq!(table.get(&"R1").unwrap().id(), second_id);

        assert!(table.remove_acquisition(&"R1", second_id).is_some());
        assert!(table.is_empty());
    }

    #[derive(Debug)]
    struct NoopHandle;

    impl ExpiryHandle for NoopHandle {
        fn cancel(&self) {}
    }

    #[test]
    fn test_attach_expiry_requires_matching_acquisition() {
        let table = LockTable::new();
        let current = AcquiredResource::locked("U1", LockTimeout::default());
        let current_id = current.id();
        table.put("R1", LockEntry::new(current, None));

        assert!(table.attach_expiry(&"R1", Uuid::new_v4(), Box::new(NoopHandle)).is_err());
        assert!(table.attach_expiry(&"R2", current_id, Box::new(NoopHandle)).is_err());

        assert!(table.attach_expiry(&"R1", current_id, Box::new(NoopHandle)).is_ok());
        let entry = table.remove_acquisition(&"R1", current_id).unwrap();
        assert!(entry.has_expiry());
    }

    #[test]
    fn test_snapshot_and_drain() {
        let table = LockTable::new();
        table.put("R1", entry_for("U1"));
        table.put("R2", entry_for("U2"));

        let mut snapshot = table.snapshot();
        snapshot.sort_by_key(|(key, _)| *key);
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0, "R1");
        assert_eq!(snapshot[1].1.owner(), "U2");

        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
    }
}
