//! Concurrent per-price storage
//!
//! [`PriceMap`] is a sharded map keyed by exact tick price. Every write goes
//! through a per-key read-modify-write under the shard lock, so a reader on
//! another thread sees either the old or the new value for a price, never a
//! partial one.
//!
//! [`VolumeLedger`] pairs a `PriceMap<TimeStamped>` with a scalar total and
//! is the only way to mutate either, which keeps `sum(map) == total` after
//! every call.

use crate::data::TimeStamped;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};

/// Sharded map from price to `V`
#[derive(Debug)]
pub struct PriceMap<V> {
    inner: DashMap<Decimal, V>,
}

impl<V: Clone> PriceMap<V> {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn get(&self, price: &Decimal) -> Option<V> {
        self.inner.get(price).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, price: &Decimal) -> bool {
        self.inner.contains_key(price)
    }

    /// Atomically inserts `insert` for a new price, or replaces the existing
    /// value with `merge(existing)`. Returns the stored value.
    pub fn upsert<F>(&self, price: Decimal, insert: V, merge: F) -> V
    where
        F: FnOnce(&V) -> V,
    {
        match self.inner.entry(price) {
            Entry::Occupied(mut entry) => {
                let next = merge(entry.get());
                entry.insert(next.clone());
                next
            }
            Entry::Vacant(entry) => {
                entry.insert(insert.clone());
                insert
            }
        }
    }

    /// Replaces the value at `price`, returning the previous one
    pub fn insert(&self, price: Decimal, value: V) -> Option<V> {
        self.inner.insert(price, value)
    }

    pub fn remove(&self, price: &Decimal) -> Option<V> {
        self.inner.remove(price).map(|(_, value)| value)
    }

    /// Removes the entry only if `predicate` holds for its current value
    pub fn remove_if<F>(&self, price: &Decimal, predicate: F) -> Option<V>
    where
        F: FnOnce(&V) -> bool,
    {
        self.inner
            .remove_if(price, |_, value| predicate(value))
            .map(|(_, value)| value)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of the keys currently present
    pub fn prices(&self) -> Vec<Decimal> {
        self.inner.iter().map(|entry| *entry.key()).collect()
    }

    /// Folds over all values without cloning them
    pub fn fold<A, F>(&self, init: A, mut f: F) -> A
    where
        F: FnMut(A, &Decimal, &V) -> A,
    {
        self.inner
            .iter()
            .fold(init, |acc, entry| f(acc, entry.key(), entry.value()))
    }
}

impl<V: Clone> Default for PriceMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceMap<i64> {
    pub fn value_or_zero(&self, price: &Decimal) -> i64 {
        self.get(price).unwrap_or(0)
    }

    pub fn sum(&self) -> i64 {
        self.fold(0, |acc, _, v| acc + *v)
    }

    pub fn max_value(&self) -> i64 {
        self.fold(0, |acc, _, v| acc.max(*v))
    }

    /// Stores `size` if it exceeds the current value
    pub fn raise_to(&self, price: Decimal, size: i64) -> i64 {
        self.upsert(price, size, |current| (*current).max(size))
    }
}

/// Whether `time` lies strictly more than `window` before `now`
pub(crate) fn is_expired(now: DateTime<Utc>, time: DateTime<Utc>, window: Duration) -> bool {
    now - time > window
}

/// Per-price accumulated volume with a matching scalar total
#[derive(Debug, Default)]
pub struct VolumeLedger {
    levels: PriceMap<TimeStamped>,
    total: AtomicI64,
}

impl VolumeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `size` at `price` and stamps the level with `time`.
    /// Returns the accumulated size at that price.
    pub fn accumulate(&self, price: Decimal, size: i64, time: DateTime<Utc>) -> i64 {
        let stored = self.levels.upsert(price, TimeStamped { size, time }, |old| TimeStamped {
            size: old.size + size,
            time,
        });
        self.total.fetch_add(size, Ordering::AcqRel);
        stored.size
    }

    /// Removes every level last touched more than `window` before `now`.
    /// Returns the volume removed.
    pub fn evict_older_than(&self, now: DateTime<Utc>, window: Duration) -> i64 {
        let mut evicted = 0;
        for price in self.levels.prices() {
            if let Some(level) = self
                .levels
                .remove_if(&price, |level| is_expired(now, level.time, window))
            {
                self.total.fetch_sub(level.size, Ordering::AcqRel);
                evicted += level.size;
            }
        }
        evicted
    }

    pub fn clear(&self) {
        self.levels.clear();
        self.total.store(0, Ordering::Release);
    }

    pub fn size_at(&self, price: &Decimal) -> i64 {
        self.levels.get(price).map(|level| level.size).unwrap_or(0)
    }

    pub fn level(&self, price: &Decimal) -> Option<TimeStamped> {
        self.levels.get(price)
    }

    pub fn total(&self) -> i64 {
        self.total.load(Ordering::Acquire)
    }

    /// Recomputes the total from the map; used to check the ledger invariant
    pub fn sum_of_levels(&self) -> i64 {
        self.levels.fold(0, |acc, _, level| acc + level.size)
    }

    pub fn largest(&self) -> i64 {
        self.levels.fold(0, |acc, _, level| acc.max(level.size))
    }

    /// Largest level strictly inside `(lower, upper)`
    pub fn largest_between(&self, lower: Decimal, upper: Decimal) -> i64 {
        self.levels.fold(0, |acc, price, level| {
            if *price > lower && *price < upper {
                acc.max(level.size)
            } else {
                acc
            }
        })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_upsert_inserts_then_merges() {
        let map: PriceMap<i64> = PriceMap::new();
        assert_eq!(map.upsert(dec!(100), 5, |old| old + 5), 5);
        assert_eq!(map.upsert(dec!(100), 5, |old| old + 5), 10);
        assert_eq!(map.value_or_zero(&dec!(100)), 10);
        assert_eq!(map.value_or_zero(&dec!(101)), 0);
    }

    #[test]
    fn test_keys_are_exact_decimals() {
        let map: PriceMap<i64> = PriceMap::new();
        map.insert(dec!(100.25), 1);
        // Same value with a different scale is the same key
        assert_eq!(map.get(&dec!(100.250)), Some(1));
        assert_eq!(map.get(&dec!(100.2500001)), None);
    }

    #[test]
    fn test_raise_to_is_monotonic() {
        let map: PriceMap<i64> = PriceMap::new();
        map.raise_to(dec!(1), 7);
        map.raise_to(dec!(1), 3);
        assert_eq!(map.value_or_zero(&dec!(1)), 7);
        map.raise_to(dec!(1), 9);
        assert_eq!(map.max_value(), 9);
    }

    #[test]
    fn test_ledger_tracks_total() {
        let ledger = VolumeLedger::new();
        let t0 = Utc::now();
        ledger.accumulate(dec!(10), 4, t0);
        ledger.accumulate(dec!(10), 6, t0 + Duration::seconds(5));
        ledger.accumulate(dec!(11), 3, t0);

        assert_eq!(ledger.size_at(&dec!(10)), 10);
        assert_eq!(ledger.total(), 13);
        assert_eq!(ledger.sum_of_levels(), 13);
        assert_eq!(ledger.largest(), 10);
        assert_eq!(ledger.level(&dec!(10)).unwrap().time, t0 + Duration::seconds(5));
    }

    #[test]
    fn test_ledger_eviction_is_strict() {
        let ledger = VolumeLedger::new();
        let t0 = Utc::now();
        ledger.accumulate(dec!(10), 4, t0);
        ledger.accumulate(dec!(11), 3, t0 + Duration::seconds(1));

        // Exactly the window old is kept
        assert_eq!(ledger.evict_older_than(t0 + Duration::seconds(30), Duration::seconds(30)), 0);
        assert_eq!(ledger.evict_older_than(t0 + Duration::seconds(31), Duration::seconds(30)), 4);
        assert_eq!(ledger.total(), 3);
        assert_eq!(ledger.size_at(&dec!(10)), 0);
        assert_eq!(ledger.sum_of_levels(), ledger.total());
    }

    #[test]
    fn test_largest_between_is_exclusive() {
        let ledger = VolumeLedger::new();
        let t0 = Utc::now();
        ledger.accumulate(dec!(10), 50, t0);
        ledger.accumulate(dec!(11), 20, t0);
        ledger.accumulate(dec!(12), 30, t0);
        assert_eq!(ledger.largest_between(dec!(10), dec!(13)), 30);
        assert_eq!(ledger.largest_between(dec!(9), dec!(13)), 50);
    }
}
