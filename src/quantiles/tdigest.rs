//! t-digest quantile estimator
//!
//! Streaming percentile estimation with resolution concentrated in the tails,
//! where P95/P99 latency questions live. Values are buffered and folded into
//! a sorted centroid list in batches; the list is re-compressed after every
//! `buffer_size` insertions and lazily before any query.
//!
//! # Thread Safety
//!
//! `TDigest` is `Send` but **not `Sync`**: queries on `&self` compress the
//! pending buffer in place through a `RefCell`. Share behind a `Mutex`, or give
//! each worker its own digest and [`merge`](Sketch::merge) the results.

use crate::error::{ConfigError, MergeError, SketchError};
use crate::traits::{QuantileSketch, Sketch};
use core::cell::RefCell;
use tracing::trace;

/// A centroid in the t-digest
///
/// A cluster of nearby values summarized by their mean and how many there were.
#[derive(Clone, Debug, PartialEq)]
pub struct Centroid {
    pub mean: f64,
    pub weight: u64,
}

impl Centroid {
    pub fn new(mean: f64, weight: u64) -> Self {
        Self { mean, weight }
    }

    /// Fold `weight` more observations with mean `mean` into this centroid
    ///
    /// An infinite mean only combines with an equal one; mixing it with a
    /// different mean has no finite average.
    pub fn absorb(&mut self, mean: f64, weight: u64) {
        let total = self.weight + weight;
        // Identical means stay bit-exact rather than drifting through the division.
        if mean != self.mean {
            self.mean += (mean - self.mean) * weight as f64 / total as f64;
        }
        self.weight = total;
    }
}

/// Centroids plus the not-yet-compressed insertions
#[derive(Clone, Debug, Default)]
struct DigestState {
    /// Sorted by mean
    centroids: Vec<Centroid>,
    pending: Vec<f64>,
}

/// t-digest quantile sketch
///
/// # Compression
///
/// Adjacent centroids are merged only while the combined weight `w` stays
/// within `4·N·q·(1−q) / compression`, `q` being the quantile at the centre of
/// the combined centroid. Near `q = 0` and `q = 1` that bound falls below two,
/// so the extreme observations stay as singletons.
///
/// - Higher compression: more centroids, tighter percentiles, more memory
/// - Default: 100
///
/// # Example
///
/// ```
/// use streamstats::quantiles::TDigest;
///
/// let mut digest = TDigest::new(100.0).unwrap();
/// for ms in 1..=1000 {
///     digest.add(ms as f64);
/// }
///
/// let p99 = digest.percentile(99.0).unwrap();
/// assert!((p99 - 990.0).abs() < 10.0);
/// ```
#[derive(Debug)]
pub struct TDigest {
    compression: f64,
    state: RefCell<DigestState>,
    /// Pending insertions that trigger a compression pass
    buffer_size: usize,
    count: u64,
    min: f64,
    max: f64,
}

impl Clone for TDigest {
    fn clone(&self) -> Self {
        Self {
            compression: self.compression,
            state: RefCell::new(self.state.borrow().clone()),
            buffer_size: self.buffer_size,
            count: self.count,
            min: self.min,
            max: self.max,
        }
    }
}

/// Upper bound on up-front allocation; vectors grow past it on demand
const MAX_PREALLOC: usize = 4096;

impl TDigest {
    /// Default compression
    pub const DEFAULT_COMPRESSION: f64 = 100.0;

    /// Create a digest that compresses after every `2 × compression` insertions
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidCompression`] if `compression` is not finite or
    /// not positive.
    pub fn new(compression: f64) -> Result<Self, ConfigError> {
        Self::with_buffer_size(compression, (compression * 2.0) as usize)
    }

    /// Create a digest with an explicit batch-compression threshold
    ///
    /// A `buffer_size` of 0 is treated as 1 (compress on every insertion).
    pub fn with_buffer_size(compression: f64, buffer_size: usize) -> Result<Self, ConfigError> {
        if !compression.is_finite() || compression <= 0.0 {
            return Err(ConfigError::InvalidCompression(compression));
        }

        let buffer_size = buffer_size.max(1);
        Ok(Self {
            compression,
            state: RefCell::new(DigestState {
                centroids: Vec::with_capacity((compression as usize).min(MAX_PREALLOC)),
                pending: Vec::with_capacity(buffer_size.min(MAX_PREALLOC)),
            }),
            buffer_size,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        })
    }

    pub fn compression(&self) -> f64 {
        self.compression
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of centroids after folding in any pending insertions
    pub fn num_centroids(&self) -> usize {
        self.flush_pending();
        self.state.borrow().centroids.len()
    }

    /// Snapshot of the centroid list, sorted by mean
    pub fn centroids(&self) -> Vec<Centroid> {
        self.flush_pending();
        self.state.borrow().centroids.clone()
    }

    /// Add one observation with weight 1
    ///
    /// NaN is dropped; use [`try_add`](Self::try_add) to have it reported.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }

        // get_mut() skips the RefCell borrow flag since we hold &mut self
        let state = self.state.get_mut();
        state.pending.push(value);
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if state.pending.len() >= self.buffer_size {
            Self::fold_pending(state, self.compression);
        }
    }

    /// Add one observation, refusing NaN
    pub fn try_add(&mut self, value: f64) -> Result<(), SketchError> {
        if value.is_nan() {
            return Err(SketchError::NotANumber);
        }
        self.add(value);
        Ok(())
    }

    pub fn add_batch(&mut self, values: &[f64]) {
        for &value in values {
            self.add(value);
        }
    }

    /// Fold pending insertions into the centroid list now
    pub fn compress(&mut self) {
        Self::fold_pending(self.state.get_mut(), self.compression);
    }

    /// Estimated value at percentile `p` (0 to 100)
    ///
    /// Returns `None` on an empty digest or a NaN `p`. Values of `p` outside
    /// `[0, 100]` are treated as the nearest bound.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if p.is_nan() {
            return None;
        }
        self.quantile((p / 100.0).clamp(0.0, 1.0))
    }

    /// Combine two digests into a new one, leaving both inputs untouched
    ///
    /// The result uses `self`'s compression.
    pub fn merged(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.absorb_digest(other);
        out
    }

    fn fold_pending(state: &mut DigestState, compression: f64) {
        if state.pending.is_empty() {
            return;
        }

        let buffered = state.pending.len();
        let mut all: Vec<Centroid> = Vec::with_capacity(state.centroids.len() + buffered);
        all.append(&mut state.centroids);
        all.extend(state.pending.drain(..).map(|v| Centroid::new(v, 1)));
        all.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        state.centroids = Self::compress_sorted(all, compression);
        trace!(
            buffered,
            centroids = state.centroids.len(),
            "t-digest compression pass"
        );
    }

    /// Flush pending insertions from a `&self` query
    fn flush_pending(&self) {
        if self.state.borrow().pending.is_empty() {
            return;
        }
        Self::fold_pending(&mut self.state.borrow_mut(), self.compression);
    }

    /// One greedy left-to-right pass merging neighbours under the size bound
    fn compress_sorted(sorted: Vec<Centroid>, compression: f64) -> Vec<Centroid> {
        let total: u64 = sorted.iter().map(|c| c.weight).sum();
        let total = total as f64;
        let mut result: Vec<Centroid> =
            Vec::with_capacity(((compression * 2.0) as usize).min(sorted.len()));

        let mut iter = sorted.into_iter();
        let Some(mut current) = iter.next() else {
            return result;
        };
        // Weight strictly to the left of `current`
        let mut weight_before = 0.0_f64;

        for next in iter {
            let proposed = (current.weight + next.weight) as f64;
            let q = (weight_before + proposed / 2.0) / total;
            let limit = (4.0 * total * q * (1.0 - q) / compression).max(1.0);

            let both_finite = current.mean.is_finite() && next.mean.is_finite();
            if next.mean == current.mean || (proposed <= limit && both_finite) {
                current.absorb(next.mean, next.weight);
            } else {
                weight_before += current.weight as f64;
                result.push(current);
                current = next;
            }
        }

        result.push(current);
        result
    }

    /// Merge body shared by the trait method and `merged`
    fn absorb_digest(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }

        let compression = self.compression;
        let state = self.state.get_mut();
        let theirs = other.state.borrow();

        let mut all = core::mem::take(&mut state.centroids);
        all.extend(theirs.centroids.iter().cloned());
        all.extend(state.pending.drain(..).map(|v| Centroid::new(v, 1)));
        all.extend(theirs.pending.iter().map(|&v| Centroid::new(v, 1)));
        all.sort_by(|a, b| a.mean.total_cmp(&b.mean));

        state.centroids = Self::compress_sorted(all, compression);
        self.count += other.count;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Piecewise linear inverse CDF through the centroid mid-ranks,
    /// anchored at `(0, min)` and `(count, max)`.
    fn value_at(&self, centroids: &[Centroid], q: f64) -> f64 {
        if q <= 0.0 {
            return self.min;
        }
        if q >= 1.0 {
            return self.max;
        }

        let target = q * self.count as f64;
        let mut prev_rank = 0.0_f64;
        let mut prev_value = self.min;
        let mut cumulative = 0.0_f64;

        for c in centroids {
            let mid = cumulative + c.weight as f64 / 2.0;
            if target < mid {
                let span = mid - prev_rank;
                if span <= 0.0 {
                    return prev_value.clamp(self.min, self.max);
                }
                let t = (target - prev_rank) / span;
                return interpolate(prev_value, c.mean, t).clamp(self.min, self.max);
            }
            cumulative += c.weight as f64;
            prev_rank = mid;
            prev_value = c.mean;
        }

        let span = self.count as f64 - prev_rank;
        if span <= 0.0 {
            return self.max;
        }
        let t = (target - prev_rank) / span;
        interpolate(prev_value, self.max, t).clamp(self.min, self.max)
    }

    /// Inverse of `value_at` over the same anchors
    fn rank_of(&self, centroids: &[Centroid], value: f64) -> f64 {
        // >= max first so a single-valued digest reports 1.0
        if value >= self.max {
            return 1.0;
        }
        if value <= self.min {
            return 0.0;
        }

        let n = self.count as f64;
        let mut prev_rank = 0.0_f64;
        let mut prev_value = self.min;
        let mut cumulative = 0.0_f64;

        for c in centroids {
            let mid = cumulative + c.weight as f64 / 2.0;
            if value < c.mean {
                let span = c.mean - prev_value;
                if span <= 0.0 {
                    return prev_rank / n;
                }
                let t = fraction_between(prev_value, c.mean, value);
                return (prev_rank + t * (mid - prev_rank)) / n;
            }
            cumulative += c.weight as f64;
            prev_rank = mid;
            prev_value = c.mean;
        }

        let span = self.max - prev_value;
        if span <= 0.0 {
            return 1.0;
        }
        let t = fraction_between(prev_value, self.max, value);
        (prev_rank + t * (n - prev_rank)) / n
    }
}

/// Point at fraction `t` from `from` to `to`
///
/// Strictly between the endpoints, an infinite endpoint yields the other
/// one: the infinite mass sits exactly at its own rank.
fn interpolate(from: f64, to: f64, t: f64) -> f64 {
    if t <= 0.0 || from == to {
        return from;
    }
    if t >= 1.0 {
        return to;
    }
    if from.is_infinite() {
        return to;
    }
    if to.is_infinite() {
        return from;
    }
    from + t * (to - from)
}

/// Where `value` sits between `from < value < to`, in `[0, 1]`
fn fraction_between(from: f64, to: f64, value: f64) -> f64 {
    if from.is_infinite() {
        return 1.0;
    }
    if to.is_infinite() {
        return 0.0;
    }
    ((value - from) / (to - from)).clamp(0.0, 1.0)
}

impl Default for TDigest {
    fn default() -> Self {
        Self {
            compression: Self::DEFAULT_COMPRESSION,
            state: RefCell::new(DigestState::default()),
            buffer_size: (Self::DEFAULT_COMPRESSION * 2.0) as usize,
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Sketch for TDigest {
    type Item = f64;

    fn update(&mut self, item: &f64) {
        self.add(*item);
    }

    /// Never fails: a digest with a different compression is folded in and the
    /// result is compressed to `self`'s bound.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.absorb_digest(other);
        Ok(())
    }

    fn clear(&mut self) {
        let state = self.state.get_mut();
        state.centroids.clear();
        state.pending.clear();
        self.count = 0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    fn size_bytes(&self) -> usize {
        let state = self.state.borrow();
        core::mem::size_of::<Self>()
            + state.centroids.capacity() * core::mem::size_of::<Centroid>()
            + state.pending.capacity() * core::mem::size_of::<f64>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl QuantileSketch for TDigest {
    type Value = f64;

    fn add(&mut self, value: f64) {
        TDigest::add(self, value);
    }

    fn quantile(&self, rank: f64) -> Option<f64> {
        if self.count == 0 || rank.is_nan() {
            return None;
        }
        self.flush_pending();
        let state = self.state.borrow();
        Some(self.value_at(&state.centroids, rank.clamp(0.0, 1.0)))
    }

    fn rank(&self, value: &f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.flush_pending();
        let state = self.state.borrow();
        self.rank_of(&state.centroids, *value)
    }

    fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}
