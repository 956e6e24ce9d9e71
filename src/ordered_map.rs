//! Insertion-ordered map for collections iterated inside replayed code.
//!
//! `HashMap` iteration order depends on the hasher's random seed, so a
//! handler that iterates one can take a different path on replay than it did
//! on the first execution. [`OrderedMap`] iterates strictly in insertion
//! order: two maps built from the same sequence of `set`/`delete` calls
//! always iterate identically, in any process.
//!
//! Ordering rules:
//! - `set` on a new key appends it.
//! - `set` on an existing key replaces the value and keeps the position.
//! - `delete` forgets the position; setting the key again appends it.
//!
//! The map can be shared between invocations. A single reader/writer lock
//! guards each instance: readers proceed concurrently, writers are exclusive.
//!
//! ```rust
//! use durable_guards::OrderedMap;
//!
//! let map = OrderedMap::new();
//! map.set("a", 1);
//! map.set("b", 2);
//! map.set("c", 3);
//! map.set("a", 10);
//!
//! assert_eq!(map.keys(), vec!["a", "b", "c"]);
//! assert_eq!(map.get(&"a"), Some(10));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

struct Entries<K, V> {
    items: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Entries<K, V> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

/// Map with deterministic, insertion-ordered iteration.
pub struct OrderedMap<K, V> {
    inner: RwLock<Entries<K, V>>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Entries::default()),
        }
    }
}

impl<K, V> OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries<K, V>> {
        // Every write leaves the entries consistent, so a poisoned lock is still usable.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries<K, V>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or updates `key`. An update keeps the key's original position.
    pub fn set(&self, key: K, value: V) {
        let mut entries = self.write();
        if let Some(&pos) = entries.index.get(&key) {
            entries.items[pos].1 = value;
            return;
        }
        let pos = entries.items.len();
        entries.index.insert(key.clone(), pos);
        entries.items.push((key, value));
    }

    /// Returns a clone of the value for `key`, or `None` if absent.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let entries = self.read();
        entries
            .index
            .get(key)
            .map(|&pos| entries.items[pos].1.clone())
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &K) -> bool {
        self.read().index.contains_key(key)
    }

    /// Removes `key` and forgets its position. Returns true if it was present.
    pub fn delete(&self, key: &K) -> bool {
        let mut entries = self.write();
        let Some(pos) = entries.index.remove(key) else {
            return false;
        };
        entries.items.remove(pos);
        for slot in entries.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        true
    }

    /// Calls `f` for every entry in insertion order, stopping when it returns false.
    ///
    /// The read lock is held for the whole walk, so `f` must not write to this map.
    pub fn range<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        let entries = self.read();
        for (key, value) in entries.items.iter() {
            if !f(key, value) {
                break;
            }
        }
    }

    /// Returns the keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.read().items.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Returns the values in insertion order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.read().items.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Returns the entries in insertion order.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        V: Clone,
    {
        self.read().items.clone()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    /// Returns true if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry.
    pub fn clear(&self) {
        let mut entries = self.write();
        entries.items.clear();
        entries.index.clear();
    }
}

impl<K, V> Clone for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn clone(&self) -> Self {
        self.entries().into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = Self::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

impl<K, V> PartialEq for OrderedMap<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq,
{
    /// Two maps are equal when they iterate the same entries in the same order.
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let left = self.read();
        let right = other.read();
        left.items == right.items
    }
}

impl<K, V> fmt::Debug for OrderedMap<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_map()
            .entries(entries.items.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

impl<K, V> Serialize for OrderedMap<K, V>
where
    K: Serialize + Eq + Hash + Clone,
    V: Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.read();
        let mut map = serializer.serialize_map(Some(entries.items.len()))?;
        for (k, v) in entries.items.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct OrderedMapVisitor<K, V>(PhantomData<(K, V)>);

impl<'de, K, V> Visitor<'de> for OrderedMapVisitor<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone,
    V: Deserialize<'de>,
{
    type Value = OrderedMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let map = OrderedMap::new();
        while let Some((k, v)) = access.next_entry()? {
            map.set(k, v);
        }
        Ok(map)
    }
}

impl<'de, K, V> Deserialize<'de> for OrderedMap<K, V>
where
    K: Deserialize<'de> + Eq + Hash + Clone,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8, u32),
        Delete(u8),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..16, any::<u32>()).prop_map(|(k, v)| Op::Set(k, v)),
            (0u8..16).prop_map(Op::Delete),
        ]
    }

    /// Reference model: a plain Vec of pairs.
    fn apply_model(ops: &[Op]) -> Vec<(u8, u32)> {
        let mut model: Vec<(u8, u32)> = Vec::new();
        for op in ops {
            match op {
                Op::Set(k, v) => match model.iter_mut().find(|(mk, _)| mk == k) {
                    Some(entry) => entry.1 = *v,
                    None => model.push((*k, *v)),
                },
                Op::Delete(k) => model.retain(|(mk, _)| mk != k),
            }
        }
        model
    }

    fn apply_map(ops: &[Op]) -> OrderedMap<u8, u32> {
        let map = OrderedMap::new();
        for op in ops {
            match op {
                Op::Set(k, v) => map.set(*k, *v),
                Op::Delete(k) => {
                    map.delete(k);
                }
            }
        }
        map
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The same operation sequence always yields the same iteration order,
        /// and that order matches the insertion-order model.
        #[test]
        fn prop_iteration_matches_model(ops in prop::collection::vec(op_strategy(), 0..64)) {
            let first = apply_map(&ops);
            let second = apply_map(&ops);

            prop_assert_eq!(first.entries(), second.entries());
            prop_assert_eq!(first.entries(), apply_model(&ops));

            for (k, v) in apply_model(&ops) {
                prop_assert_eq!(first.get(&k), Some(v));
            }
        }
    }
}
