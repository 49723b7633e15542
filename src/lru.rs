use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;

use linked_hash_map::LinkedHashMap;

pub type Evictable<K, V> = Box<dyn Fn(&K, &V) -> bool + Send + Sync + 'static>;

/// Recency-ordered map with predicate-restricted eviction.
///
/// Entries are kept oldest to newest. Eviction only removes entries the `evictable` predicate agrees to drop, so the
/// capacity is a target rather than a hard limit: entries that must stay, stay.
pub struct Lru<K, V>
where
    K: Hash + Eq,
{
    capacity:  usize,
    evictable: Evictable<K, V>,
    entries:   LinkedHashMap<K, V>,
}

impl<K, V> Lru<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self::with_evictable(capacity, |_, _| true)
    }

    pub fn with_evictable<F>(capacity: usize, evictable: F) -> Self
    where
        F: Fn(&K, &V) -> bool + Send + Sync + 'static,
    {
        Self {
            capacity,
            evictable: Box::new(evictable),
            entries: LinkedHashMap::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// With `touch` the key becomes the most recently used one. Without it the recency order is left alone.
    pub fn get<Q>(&mut self, key: &Q, touch: bool) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if touch {
            self.entries.get_refresh(key).map(|v| &*v)
        }
        else {
            self.entries.get(key)
        }
    }

    pub fn get_mut<Q>(&mut self, key: &Q, touch: bool) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if touch {
            self.entries.get_refresh(key)
        }
        else {
            self.entries.get_mut(key)
        }
    }

    /// Inserts or replaces the value, making the key the newest. Returns the replaced value, if any.
    pub fn set(&mut self, key: K, value: V) -> Option<V> {
        let old = self.entries.remove(&key);
        self.entries.insert(key, value);
        old
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> linked_hash_map::Iter<'_, K, V> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> linked_hash_map::IterMut<'_, K, V> {
        self.entries.iter_mut()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops evictable entries, oldest first, until the map fits its capacity or no evictable entries remain. Returns
    /// the number of evicted entries.
    pub fn evict_old(&mut self) -> usize {
        let len = self.entries.len();
        if len <= self.capacity {
            return 0;
        }

        let victims = self
            .entries
            .iter()
            .filter(|(k, v)| (self.evictable)(*k, *v))
            .map(|(k, _)| k.clone())
            .take(len - self.capacity)
            .collect::<Vec<_>>();

        for key in &victims {
            self.entries.remove(key);
        }

        victims.len()
    }
}

impl<K, V> Debug for Lru<K, V>
where
    K: Hash + Eq + Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lru")
            .field("capacity", &self.capacity)
            .field("entries", &self.entries)
            .finish()
    }
}
