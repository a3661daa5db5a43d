//! Memoization of values derived from rating tables.
//!
//! Rating tables change when contacts happen and when windows end, so a
//! value computed from them is only valid for the simulated time and the
//! table versions it was computed with. [`Cache`] keeps that token next to
//! the values:
//!
//! * the whole cache is dropped when the time moves forward or when the
//!   version of the owner's tables changes ([`Cache::validate`]);
//! * each entry also remembers a stamp (typically the version of a
//!   neighbour's tables) and is recomputed when the stamp differs.

use crate::time::SimTime;
use std::{collections::HashMap, hash::Hash};

#[derive(Debug, Clone)]
pub struct Cache<K, V> {
    time: SimTime,
    version: u64,
    values: HashMap<K, (u64, V)>,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self {
            time: SimTime::ZERO,
            version: 0,
            values: HashMap::new(),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
    V: Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// drop every value computed before `now` or for another `version`
    pub fn validate(&mut self, now: SimTime, version: u64) {
        if now != self.time || version != self.version {
            self.values.clear();
            self.time = now;
            self.version = version;
        }
    }

    /// the value cached for `key` with the given `stamp`, if any
    pub fn get(&self, key: &K, stamp: u64) -> Option<V> {
        self.values
            .get(key)
            .filter(|(cached, _)| *cached == stamp)
            .map(|(_, value)| *value)
    }

    /// the value cached for `key`, computing it with `compute` if it is
    /// missing or was cached for another `stamp`
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        stamp: u64,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key, stamp) {
            return Ok(value);
        }
        let value = compute()?;
        self.values.insert(key, (stamp, value));
        Ok(value)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(cache: &mut Cache<&'static str, f64>, key: &'static str, stamp: u64, value: f64) -> f64 {
        cache
            .get_or_try_insert_with(key, stamp, || Ok::<_, ()>(value))
            .unwrap()
    }

    #[test]
    fn values_are_reused() {
        let mut cache = Cache::new();
        cache.validate(SimTime::from_secs(1.0), 3);

        assert_eq!(fill(&mut cache, "M1", 0, 0.25), 0.25);
        assert_eq!(fill(&mut cache, "M1", 0, 0.75), 0.25);
    }

    #[test]
    fn time_invalidates() {
        let mut cache = Cache::new();
        cache.validate(SimTime::from_secs(1.0), 3);
        fill(&mut cache, "M1", 0, 0.25);

        cache.validate(SimTime::from_secs(1.0), 3);
        assert_eq!(cache.len(), 1);

        cache.validate(SimTime::from_secs(2.0), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn version_invalidates() {
        let mut cache = Cache::new();
        cache.validate(SimTime::from_secs(1.0), 3);
        fill(&mut cache, "M1", 0, 0.25);

        cache.validate(SimTime::from_secs(1.0), 4);
        assert_eq!(fill(&mut cache, "M1", 0, 0.75), 0.75);
    }

    #[test]
    fn stamp_invalidates_one_entry() {
        let mut cache = Cache::new();
        fill(&mut cache, "M1", 7, 0.25);
        fill(&mut cache, "M2", 7, 0.5);

        assert_eq!(fill(&mut cache, "M1", 8, 0.75), 0.75);
        assert_eq!(cache.get(&"M2", 7), Some(0.5));
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache: Cache<&str, f64> = Cache::new();
        let result = cache.get_or_try_insert_with("M1", 0, || Err("undefined"));

        assert_eq!(result, Err("undefined"));
        assert!(cache.is_empty());
    }
}
