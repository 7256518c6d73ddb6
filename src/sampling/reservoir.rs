//! Reservoir sampling for uniform random sampling from streams
//!
//! Keeps a fixed-size sample of a stream of unknown length such that every
//! item seen so far is equally likely to be in it.

use crate::error::MergeError;
use crate::traits::{SamplingSketch, Sketch};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Reservoir sampler using Algorithm R
///
/// After `n` items have been offered, each of them is in the sample with
/// probability `min(1, max_size / n)`.
///
/// 1. The first `max_size` items are always kept
/// 2. Item `i` (1-indexed, `i > max_size`) draws `j` uniformly from `[0, i)`
///    and replaces slot `j` if `j < max_size`; otherwise it is discarded
///
/// A sampler with `max_size = 0` discards everything but still counts.
///
/// The numeric helpers ([`mean`](Self::mean), [`std`](Self::std),
/// [`percentile`](Self::percentile)) describe the current sample only, not
/// the whole stream.
///
/// # Example
///
/// ```
/// use streamstats::sampling::ReservoirSampler;
///
/// let mut sampler = ReservoirSampler::<f64>::with_seed(5, 7);
/// for ms in 0..100 {
///     sampler.add(ms as f64);
/// }
///
/// let rows = sampler.get_samples();
/// assert_eq!(rows.len(), 5);
/// assert!(sampler.mean().is_some());
/// ```
#[derive(Clone, Debug)]
pub struct ReservoirSampler<T> {
    max_size: usize,
    reservoir: Vec<T>,
    /// Items offered, including discarded ones
    count: u64,
    rng: StdRng,
}

impl<T> ReservoirSampler<T> {
    /// Create a sampler seeded from system entropy
    pub fn new(max_size: usize) -> Self {
        Self::with_rng(max_size, StdRng::from_entropy())
    }

    /// Create a sampler with a fixed seed, for reproducible samples
    pub fn with_seed(max_size: usize, seed: u64) -> Self {
        Self::with_rng(max_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(max_size: usize, rng: StdRng) -> Self {
        Self {
            max_size,
            reservoir: Vec::with_capacity(max_size.min(4096)),
            count: 0,
            rng,
        }
    }

    pub fn add(&mut self, item: T) {
        self.count += 1;

        if self.reservoir.len() < self.max_size {
            self.reservoir.push(item);
            return;
        }
        if self.max_size == 0 {
            return;
        }

        let j = self.rng.gen_range(0..self.count);
        if j < self.max_size as u64 {
            self.reservoir[j as usize] = item;
        }
    }

    /// Borrow the current sample
    pub fn sample(&self) -> &[T] {
        &self.reservoir
    }

    /// Consume the sampler and return the sample
    pub fn into_sample(self) -> Vec<T> {
        self.reservoir
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Current sample size, `min(max_size, items_seen)`
    pub fn len(&self) -> usize {
        self.reservoir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservoir.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.reservoir.len() >= self.max_size
    }

    /// Items offered so far
    pub fn items_seen(&self) -> u64 {
        self.count
    }

    /// Probability that any given offered item is in the current sample
    pub fn sampling_probability(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.max_size as f64 / self.count as f64).min(1.0)
        }
    }
}

impl<T: Clone> ReservoirSampler<T> {
    pub fn add_batch(&mut self, items: &[T]) {
        for item in items {
            self.add(item.clone());
        }
    }

    /// Copy of the current sample; later updates do not affect it
    pub fn get_samples(&self) -> Vec<T> {
        self.reservoir.clone()
    }
}

impl<T: Copy + Into<f64>> ReservoirSampler<T> {
    fn values(&self) -> Vec<f64> {
        self.reservoir.iter().map(|&v| v.into()).collect()
    }

    /// Mean of the sampled values; `None` when the sample is empty
    pub fn mean(&self) -> Option<f64> {
        if self.reservoir.is_empty() {
            return None;
        }
        let values = self.values();
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Population standard deviation of the sampled values
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let values = self.values();
        let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
        Some(var.sqrt())
    }

    /// Percentile `p` (0 to 100) of the sampled values
    ///
    /// Linear interpolation between the two nearest ranks at position
    /// `p / 100 * (n - 1)`. `None` when the sample is empty or `p` is NaN.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.reservoir.is_empty() || p.is_nan() {
            return None;
        }

        let mut values = self.values();
        values.sort_by(|a, b| a.total_cmp(b));

        let pos = p.clamp(0.0, 100.0) / 100.0 * (values.len() - 1) as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        let frac = pos - lo as f64;
        Some(values[lo] + (values[hi] - values[lo]) * frac)
    }
}

impl<T: Clone + core::fmt::Debug> Sketch for ReservoirSampler<T> {
    type Item = T;

    fn update(&mut self, item: &T) {
        self.add(item.clone());
    }

    /// Combine two samples of disjoint streams into a uniform sample of both
    ///
    /// Slots are filled without replacement. Each slot goes to a side with
    /// probability proportional to that side's not-yet-drawn stream items, so
    /// the split between sides is hypergeometric, as in a uniform sample of
    /// the concatenated stream.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.max_size != other.max_size {
            let err = MergeError::IncompatibleConfig {
                expected: format!("max_size={}", self.max_size),
                found: format!("max_size={}", other.max_size),
            };
            debug!(%err, "reservoir merge rejected");
            return Err(err);
        }

        if other.count == 0 {
            return Ok(());
        }
        if self.count == 0 {
            self.reservoir = other.reservoir.clone();
            self.count = other.count;
            return Ok(());
        }

        let total = self.count + other.count;

        if self.reservoir.len() + other.reservoir.len() <= self.max_size {
            self.reservoir.extend(other.reservoir.iter().cloned());
            self.count = total;
            return Ok(());
        }

        let mut mine = core::mem::take(&mut self.reservoir);
        let mut theirs = other.reservoir.clone();
        // Stream items not yet represented in the merged sample
        let mut left_mine = self.count;
        let mut left_theirs = other.count;

        let mut merged = Vec::with_capacity(self.max_size.min(mine.len() + theirs.len()));
        while merged.len() < self.max_size && !(mine.is_empty() && theirs.is_empty()) {
            let take_mine = if theirs.is_empty() {
                true
            } else if mine.is_empty() {
                false
            } else {
                self.rng.gen_range(0..left_mine + left_theirs) < left_mine
            };

            if take_mine {
                let idx = self.rng.gen_range(0..mine.len());
                merged.push(mine.swap_remove(idx));
                left_mine = left_mine.saturating_sub(1);
            } else {
                let idx = self.rng.gen_range(0..theirs.len());
                merged.push(theirs.swap_remove(idx));
                left_theirs = left_theirs.saturating_sub(1);
            }
        }

        self.reservoir = merged;
        self.count = total;
        Ok(())
    }

    fn clear(&mut self) {
        self.reservoir.clear();
        self.count = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>() + self.reservoir.capacity() * core::mem::size_of::<T>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl<T: Clone + core::fmt::Debug> SamplingSketch for ReservoirSampler<T> {
    fn sample(&self) -> &[T] {
        &self.reservoir
    }

    fn capacity(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic() {
        let mut sampler = ReservoirSampler::<i32>::with_seed(5, 1);
        for i in 0..10 {
            sampler.add(i);
        }
        assert_eq!(sampler.len(), 5);
        assert_eq!(sampler.items_seen(), 10);
        assert!(sampler.is_full());
    }

    #[test]
    fn test_underfilled() {
        let mut sampler = ReservoirSampler::<i32>::with_seed(10, 1);
        sampler.add_batch(&[0, 1, 2, 3, 4]);

        assert_eq!(sampler.get_samples(), vec![0, 1, 2, 3, 4]);
        assert!(!sampler.is_full());
        assert_eq!(sampler.sampling_probability(), 1.0);
    }

    #[test]
    fn test_zero_capacity_discards() {
        let mut sampler = ReservoirSampler::<u32>::with_seed(0, 1);
        for i in 0..100 {
            sampler.add(i);
        }
        assert!(sampler.get_samples().is_empty());
        assert_eq!(sampler.items_seen(), 100);
        assert_eq!(sampler.mean(), None);
    }

    #[test]
    fn test_empty_queries() {
        let sampler = ReservoirSampler::<f64>::new(10);
        assert!(sampler.get_samples().is_empty());
        assert_eq!(sampler.mean(), None);
        assert_eq!(sampler.std(), None);
        assert_eq!(sampler.percentile(50.0), None);
        assert_eq!(sampler.sampling_probability(), 0.0);
    }

    #[test]
    fn test_get_samples_is_a_copy() {
        let mut sampler = ReservoirSampler::<u32>::with_seed(3, 1);
        sampler.add_batch(&[1, 2, 3]);
        let snapshot = sampler.get_samples();
        for i in 4..1000 {
            sampler.add(i);
        }
        assert_eq!(snapshot, vec![1, 2, 3]);
    }

    #[test]
    fn test_reproducibility() {
        let mut sampler1 = ReservoirSampler::<i32>::with_seed(5, 42);
        let mut sampler2 = ReservoirSampler::<i32>::with_seed(5, 42);
        for i in 0..100 {
            sampler1.add(i);
            sampler2.add(i);
        }
        assert_eq!(sampler1.sample(), sampler2.sample());
    }

    #[test]
    fn test_uniformity() {
        let mut counts = [0usize; 10];
        let iterations = 20_000;

        for trial in 0..iterations {
            let mut sampler = ReservoirSampler::<usize>::with_seed(1, trial as u64);
            for i in 0..10 {
                sampler.add(i);
            }
            counts[sampler.sample()[0]] += 1;
        }

        let expected = iterations / 10;
        for (i, &count) in counts.iter().enumerate() {
            let deviation = (count as f64 - expected as f64).abs() / expected as f64;
            assert!(
                deviation < 0.1,
                "item {} appeared {} times (expected ~{})",
                i,
                count,
                expected
            );
        }
    }

    #[test]
    fn test_numeric_stats() {
        let mut sampler = ReservoirSampler::<f64>::with_seed(10, 1);
        sampler.add_batch(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);

        assert_eq!(sampler.mean(), Some(5.0));
        assert_eq!(sampler.std(), Some(2.0));
        assert_eq!(sampler.percentile(0.0), Some(2.0));
        assert_eq!(sampler.percentile(100.0), Some(9.0));
        // position 0.5 * 7 = 3.5 between 4.0 and 5.0
        assert_eq!(sampler.percentile(50.0), Some(4.5));
    }

    #[test]
    fn test_integer_payloads_have_stats() {
        let mut sampler = ReservoirSampler::<u32>::with_seed(4, 1);
        sampler.add_batch(&[10, 20, 30, 40]);
        assert_eq!(sampler.mean(), Some(25.0));
    }

    #[test]
    fn test_merge_capacity_mismatch() {
        let mut a = ReservoirSampler::<u32>::with_seed(5, 1);
        let b = ReservoirSampler::<u32>::with_seed(6, 1);
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_has_no_duplicates() {
        let mut a = ReservoirSampler::<u32>::with_seed(50, 1);
        let mut b = ReservoirSampler::<u32>::with_seed(50, 2);
        for i in 0..1000 {
            a.add(i);
            b.add(i + 1000);
        }
        a.merge(&b).unwrap();

        let mut sample = a.get_samples();
        sample.sort_unstable();
        sample.dedup();
        assert_eq!(sample.len(), 50);
        assert_eq!(a.items_seen(), 2000);
    }

    #[test]
    fn test_merge_unbounded_capacity() {
        let mut a = ReservoirSampler::<u32>::with_seed(usize::MAX, 1);
        let mut b = ReservoirSampler::<u32>::with_seed(usize::MAX, 2);
        a.add_batch(&[1, 2]);
        b.add(3);
        a.merge(&b).unwrap();

        let mut sample = a.get_samples();
        sample.sort_unstable();
        assert_eq!(sample, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear() {
        let mut sampler = ReservoirSampler::<i32>::with_seed(5, 1);
        for i in 0..10 {
            sampler.add(i);
        }
        sampler.clear();
        assert!(sampler.is_empty());
        assert_eq!(sampler.count(), 0);
    }
}
