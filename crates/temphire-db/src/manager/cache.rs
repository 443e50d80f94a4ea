//! # Entity Cache
//!
//! The tracked-entity store behind an [`EntityManager`](super::EntityManager).
//!
//! Each entry keeps the current values, the last persisted values and the
//! lifecycle state. Entries are grouped by entity type and ordered by key,
//! so local queries return a stable order.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use temphire_core::{EntityKey, EntityState, Predicate};

use crate::data_service::EntityChange;

// =============================================================================
// Tracked Entity
// =============================================================================

/// One entity as the cache sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub entity_type: String,
    pub key: EntityKey,
    /// Values including pending edits.
    pub current: Value,
    /// Last persisted values. `None` for entities never persisted.
    pub original: Option<Value>,
    pub state: EntityState,
}

impl TrackedEntity {
    /// An entity matching its persisted values.
    pub fn unchanged(entity_type: impl Into<String>, key: EntityKey, values: Value) -> Self {
        TrackedEntity {
            entity_type: entity_type.into(),
            key,
            original: Some(values.clone()),
            current: values,
            state: EntityState::Unchanged,
        }
    }

    /// A new entity pending insertion.
    pub fn added(entity_type: impl Into<String>, key: EntityKey, values: Value) -> Self {
        TrackedEntity {
            entity_type: entity_type.into(),
            key,
            current: values,
            original: None,
            state: EntityState::Added,
        }
    }
}

// =============================================================================
// Entity Cache
// =============================================================================

/// Tracked entities grouped by entity type name.
#[derive(Debug, Default, Clone)]
pub struct EntityCache {
    entries: HashMap<String, BTreeMap<EntityKey, TrackedEntity>>,
}

impl EntityCache {
    pub fn new() -> Self {
        EntityCache::default()
    }

    pub fn get(&self, entity_type: &str, key: &EntityKey) -> Option<&TrackedEntity> {
        self.entries.get(entity_type)?.get(key)
    }

    pub fn get_mut(&mut self, entity_type: &str, key: &EntityKey) -> Option<&mut TrackedEntity> {
        self.entries.get_mut(entity_type)?.get_mut(key)
    }

    /// Inserts an entry, returning the one it replaced.
    pub fn insert(&mut self, tracked: TrackedEntity) -> Option<TrackedEntity> {
        self.entries
            .entry(tracked.entity_type.clone())
            .or_default()
            .insert(tracked.key.clone(), tracked)
    }

    pub fn remove(&mut self, entity_type: &str, key: &EntityKey) -> Option<TrackedEntity> {
        let by_key = self.entries.get_mut(entity_type)?;
        let removed = by_key.remove(key);
        if by_key.is_empty() {
            self.entries.remove(entity_type);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True if any entry is Added, Modified or Deleted.
    pub fn has_changes(&self) -> bool {
        self.iter().any(|tracked| tracked.state.is_pending())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entries.values().flat_map(BTreeMap::values)
    }

    /// Entries with pending changes, ordered by type name then key.
    pub fn pending(&self) -> Vec<&TrackedEntity> {
        let mut pending: Vec<&TrackedEntity> =
            self.iter().filter(|tracked| tracked.state.is_pending()).collect();
        pending.sort_by(|a, b| (&a.entity_type, &a.key).cmp(&(&b.entity_type, &b.key)));
        pending
    }

    /// Current values of the non-deleted entities of one type matching
    /// `predicate`, ordered by key.
    pub fn query(&self, entity_type: &str, predicate: &Predicate) -> Vec<Value> {
        self.entries
            .get(entity_type)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter(|tracked| !tracked.state.is_deleted())
            .filter(|tracked| predicate.matches(&tracked.current))
            .map(|tracked| tracked.current.clone())
            .collect()
    }

    /// Merges values received from the data service, preserving pending
    /// local changes.
    ///
    /// ## Merge Rules
    /// ```text
    /// not tracked   → tracked as Unchanged
    /// Unchanged     → current and original replaced
    /// Modified      → original replaced, local edits kept
    /// Deleted       → original replaced, still Deleted
    /// Added         → left alone
    /// ```
    pub fn merge_remote(&mut self, entity_type: &str, key: EntityKey, remote: Value) -> &TrackedEntity {
        let by_key = self.entries.entry(entity_type.to_string()).or_default();

        match by_key.entry(key) {
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(TrackedEntity::unchanged(entity_type, key, remote))
            }
            Entry::Occupied(slot) => {
                let tracked = slot.into_mut();
                match tracked.state {
                    EntityState::Unchanged | EntityState::Detached => {
                        tracked.original = Some(remote.clone());
                        tracked.current = remote;
                        tracked.state = EntityState::Unchanged;
                    }
                    EntityState::Modified | EntityState::Deleted => {
                        tracked.original = Some(remote);
                    }
                    EntityState::Added => {}
                }
                tracked
            }
        }
    }

    /// Marks one saved change as persisted.
    ///
    /// Applied only if the entry still has the state and values that were
    /// saved; an entry edited while the save was in flight stays pending.
    /// Returns whether the entry was promoted.
    pub fn accept(&mut self, change: &EntityChange) -> bool {
        let Some(tracked) = self.get_mut(&change.entity_type, &change.key) else {
            return false;
        };
        if tracked.state != change.state || tracked.current != change.values {
            return false;
        }

        let state = tracked.state;
        match state {
            EntityState::Added | EntityState::Modified => {
                tracked.original = Some(tracked.current.clone());
                tracked.state = EntityState::Unchanged;
            }
            EntityState::Deleted => {
                self.remove(&change.entity_type, &change.key);
            }
            EntityState::Unchanged | EntityState::Detached => return false,
        }
        true
    }

    /// Discards every pending change. Returns the number of entries reverted.
    pub fn reject_changes(&mut self) -> usize {
        let mut reverted = 0;

        for by_key in self.entries.values_mut() {
            by_key.retain(|_, tracked| match tracked.state {
                EntityState::Added => {
                    reverted += 1;
                    false
                }
                EntityState::Modified | EntityState::Deleted => {
                    if let Some(original) = &tracked.original {
                        tracked.current = original.clone();
                    }
                    tracked.state = EntityState::Unchanged;
                    reverted += 1;
                    true
                }
                EntityState::Unchanged | EntityState::Detached => true,
            });
        }
        self.entries.retain(|_, by_key| !by_key.is_empty());

        reverted
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(k: &str) -> EntityKey {
        EntityKey::new(k)
    }

    #[test]
    fn test_merge_remote_preserves_pending_edits() {
        let mut cache = EntityCache::new();
        cache.merge_remote("Person", key("1"), json!({ "id": "1", "name": "Ann" }));

        let tracked = cache.get_mut("Person", &key("1")).unwrap();
        tracked.current = json!({ "id": "1", "name": "Anne" });
        tracked.state = EntityState::Modified;

        let merged = cache.merge_remote("Person", key("1"), json!({ "id": "1", "name": "Ann B" }));
        assert_eq!(merged.state, EntityState::Modified);
        assert_eq!(merged.current["name"], "Anne");
        assert_eq!(merged.original.as_ref().unwrap()["name"], "Ann B");
    }

    #[test]
    fn test_merge_remote_refreshes_unchanged() {
        let mut cache = EntityCache::new();
        cache.merge_remote("Person", key("1"), json!({ "id": "1", "name": "Ann" }));
        let merged = cache.merge_remote("Person", key("1"), json!({ "id": "1", "name": "Bea" }));

        assert_eq!(merged.state, EntityState::Unchanged);
        assert_eq!(merged.current["name"], "Bea");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_query_skips_deleted_and_orders_by_key() {
        let mut cache = EntityCache::new();
        cache.insert(TrackedEntity::unchanged("Person", key("b"), json!({ "id": "b" })));
        cache.insert(TrackedEntity::added("Person", key("a"), json!({ "id": "a" })));
        let mut gone = TrackedEntity::unchanged("Person", key("c"), json!({ "id": "c" }));
        gone.state = EntityState::Deleted;
        cache.insert(gone);

        let ids: Vec<Value> = cache
            .query("Person", &Predicate::True)
            .into_iter()
            .map(|v| v["id"].clone())
            .collect();
        assert_eq!(ids, vec![json!("a"), json!("b")]);
        assert!(cache.query("Company", &Predicate::True).is_empty());
    }

    #[test]
    fn test_reject_changes() {
        let mut cache = EntityCache::new();
        cache.insert(TrackedEntity::added("Person", key("new"), json!({ "id": "new" })));
        let mut edited = TrackedEntity::unchanged("Person", key("1"), json!({ "id": "1", "n": 1 }));
        edited.current = json!({ "id": "1", "n": 2 });
        edited.state = EntityState::Modified;
        cache.insert(edited);

        assert!(cache.has_changes());
        assert_eq!(cache.reject_changes(), 2);
        assert!(!cache.has_changes());
        assert!(cache.get("Person", &key("new")).is_none());
        assert_eq!(cache.get("Person", &key("1")).unwrap().current["n"], 1);
    }

    #[test]
    fn test_accept_skips_entries_edited_after_snapshot() {
        let mut cache = EntityCache::new();
        cache.insert(TrackedEntity::added("Person", key("1"), json!({ "id": "1", "n": 1 })));
        let change = EntityChange {
            entity_type: "Person".to_string(),
            resource_name: "People".to_string(),
            key: key("1"),
            state: EntityState::Added,
            values: json!({ "id": "1", "n": 1 }),
        };

        cache.get_mut("Person", &key("1")).unwrap().current = json!({ "id": "1", "n": 2 });
        assert!(!cache.accept(&change));
        assert_eq!(cache.get("Person", &key("1")).unwrap().state, EntityState::Added);

        cache.get_mut("Person", &key("1")).unwrap().current = json!({ "id": "1", "n": 1 });
        assert!(cache.accept(&change));
        assert_eq!(cache.get("Person", &key("1")).unwrap().state, EntityState::Unchanged);
    }
}
