//! Count-Min Sketch with a companion top-K heap
//!
//! The heap only ever holds keys this instance has been asked to increment,
//! so [`top_k`](HeavyHitters::top_k) ranks observed keys, not the whole key
//! space. Ranking uses the sketch's estimates, which can overstate counts.

use super::CountMinSketch;
use crate::error::{ConfigError, MergeError};
use crate::traits::{FrequencySketch, HeavyHitters, Sketch};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Count-Min Sketch that also tracks its `capacity` highest-estimate keys
///
/// Every increment refreshes the key's estimate and offers it to a bounded
/// min-heap; a new key displaces the current minimum only if its estimate is
/// strictly larger.
///
/// # Example
///
/// ```
/// use streamstats::frequency::TopKCountMin;
/// use streamstats::traits::HeavyHitters;
///
/// let mut paths = TopKCountMin::new(2000, 5, 0, 3).unwrap();
/// for _ in 0..50 { paths.increment("/login", 1); }
/// for _ in 0..20 { paths.increment("/search", 1); }
/// paths.increment("/favicon.ico", 1);
///
/// let top = paths.top_k(2);
/// assert_eq!(top[0].0, "/login");
/// assert_eq!(top[1].0, "/search");
/// ```
#[derive(Clone, Debug)]
pub struct TopKCountMin {
    sketch: CountMinSketch,
    capacity: usize,
    /// Latest estimate recorded for each tracked key
    tracked: HashMap<String, u64>,
    /// Min-heap of (estimate, key); entries disagreeing with `tracked` are stale
    heap: BinaryHeap<Reverse<(u64, String)>>,
}

impl TopKCountMin {
    /// Create a sketch of `width × depth` counters tracking `capacity` keys
    pub fn new(width: usize, depth: usize, seed: u64, capacity: usize) -> Result<Self, ConfigError> {
        Self::from_sketch(CountMinSketch::new(width, depth, seed)?, capacity)
    }

    /// Attach a top-K tracker to an existing sketch
    ///
    /// Keys counted before this call are unknown to the tracker.
    pub fn from_sketch(sketch: CountMinSketch, capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroTopK);
        }
        Ok(Self {
            sketch,
            capacity,
            tracked: HashMap::with_capacity(capacity.min(1024)),
            heap: BinaryHeap::with_capacity(capacity.min(1024)),
        })
    }

    /// Number of keys the tracker holds at most
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The underlying counter table
    pub fn sketch(&self) -> &CountMinSketch {
        &self.sketch
    }

    pub fn total_count(&self) -> u64 {
        self.sketch.total_count()
    }

    /// Number of keys currently tracked
    pub fn num_tracked(&self) -> usize {
        self.tracked.len()
    }

    pub fn increment(&mut self, key: &str, count: u64) {
        self.sketch.increment(key, count);
        let estimate = self.sketch.estimate(key);
        self.offer(key, estimate);
    }

    pub fn estimate(&self, key: &str) -> u64 {
        self.sketch.estimate(key)
    }

    fn offer(&mut self, key: &str, estimate: u64) {
        if let Some(current) = self.tracked.get_mut(key) {
            *current = estimate;
            self.heap.push(Reverse((estimate, key.to_owned())));
            self.compact_heap();
            return;
        }

        if self.tracked.len() < self.capacity {
            self.tracked.insert(key.to_owned(), estimate);
            self.heap.push(Reverse((estimate, key.to_owned())));
            return;
        }

        self.drop_stale();
        let Some(Reverse((min_estimate, _))) = self.heap.peek() else {
            return;
        };
        if estimate <= *min_estimate {
            return;
        }

        if let Some(Reverse((_, evicted))) = self.heap.pop() {
            self.tracked.remove(&evicted);
        }
        self.tracked.insert(key.to_owned(), estimate);
        self.heap.push(Reverse((estimate, key.to_owned())));
    }

    /// Pop heap entries superseded by a later estimate or an eviction
    fn drop_stale(&mut self) {
        while let Some(Reverse((estimate, key))) = self.heap.peek() {
            if self.tracked.get(key) == Some(estimate) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Rebuild the heap once stale entries dominate it
    fn compact_heap(&mut self) {
        if self.heap.len() > self.capacity.saturating_mul(4).saturating_add(16) {
            self.rebuild_heap();
        }
    }

    fn rebuild_heap(&mut self) {
        self.heap = self
            .tracked
            .iter()
            .map(|(key, &estimate)| Reverse((estimate, key.clone())))
            .collect();
    }

    /// Tracked keys with fresh estimates, highest first, ties by key
    fn ranked(&self) -> Vec<(String, u64)> {
        let mut items: Vec<(String, u64)> = self
            .tracked
            .keys()
            .map(|key| (key.clone(), self.sketch.estimate(key)))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        items
    }
}

impl Sketch for TopKCountMin {
    type Item = str;

    fn update(&mut self, item: &str) {
        self.increment(item, 1);
    }

    /// Merges the counters, then re-ranks the union of both candidate sets
    /// against the merged table and keeps `self.capacity()` of them.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.sketch.merge(&other.sketch)?;

        let mut candidates: Vec<(String, u64)> = self
            .tracked
            .keys()
            .chain(other.tracked.keys().filter(|k| !self.tracked.contains_key(*k)))
            .map(|key| (key.clone(), self.sketch.estimate(key)))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        candidates.truncate(self.capacity);

        self.tracked = candidates.into_iter().collect();
        self.rebuild_heap();
        Ok(())
    }

    fn clear(&mut self) {
        self.sketch.clear();
        self.tracked.clear();
        self.heap.clear();
    }

    fn size_bytes(&self) -> usize {
        let keys: usize = self.tracked.keys().map(|k| k.capacity()).sum();
        self.sketch.size_bytes()
            + keys * 2
            + self.tracked.capacity() * core::mem::size_of::<(String, u64)>()
            + self.heap.capacity() * core::mem::size_of::<(u64, String)>()
    }

    fn count(&self) -> u64 {
        self.sketch.count()
    }
}

impl FrequencySketch for TopKCountMin {
    fn estimate_frequency(&self, item: &str) -> u64 {
        self.sketch.estimate(item)
    }
}

impl HeavyHitters for TopKCountMin {
    type Key = String;

    fn heavy_hitters(&self, threshold: f64) -> Vec<(String, u64)> {
        let min_count = (threshold * self.sketch.total_count() as f64).ceil() as u64;
        self.ranked()
            .into_iter()
            .filter(|(_, estimate)| *estimate >= min_count)
            .collect()
    }

    fn top_k(&self, k: usize) -> Vec<(String, u64)> {
        let mut items = self.ranked();
        items.truncate(k);
        items
    }
}
