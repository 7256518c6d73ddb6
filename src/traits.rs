//! Core traits for streaming summaries
//!
//! Every structure implements the base [`Sketch`] trait (update, merge, clear),
//! with specialized traits for each family. None of the implementations
//! synchronize internally: a sketch shared between threads needs an external
//! lock, or each thread keeps its own instance and the results are merged.

use core::fmt::Debug;

pub use crate::error::MergeError;

/// Error bounds for a sketch estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBounds {
    /// Lower bound of the estimate
    pub lower: f64,
    /// Point estimate
    pub estimate: f64,
    /// Upper bound of the estimate
    pub upper: f64,
    /// Confidence level (e.g., 0.95 for 95%)
    pub confidence: f64,
}

impl ErrorBounds {
    pub fn new(lower: f64, estimate: f64, upper: f64, confidence: f64) -> Self {
        Self {
            lower,
            estimate,
            upper,
            confidence,
        }
    }

    /// Check if a value falls within bounds
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Relative width (width / estimate)
    pub fn relative_width(&self) -> f64 {
        if self.estimate == 0.0 {
            0.0
        } else {
            self.width() / self.estimate
        }
    }
}

/// Core trait for all streaming sketches
pub trait Sketch: Clone + Debug {
    /// The type of item this sketch processes
    type Item: ?Sized;

    /// Add an item to the sketch
    fn update(&mut self, item: &Self::Item);

    /// Merge another sketch into this one
    ///
    /// `other` is only read. Returns an error if the two summaries have
    /// different shapes; `self` is left untouched in that case.
    fn merge(&mut self, other: &Self) -> Result<(), MergeError>;

    /// Reset sketch to empty state
    fn clear(&mut self);

    /// Memory usage in bytes
    fn size_bytes(&self) -> usize;

    /// Number of items processed
    fn count(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Cardinality (distinct count) estimation sketches
pub trait CardinalitySketch: Sketch {
    /// Estimate number of distinct items seen
    fn estimate(&self) -> f64;

    /// Get error bounds at given confidence level (0.0 to 1.0)
    fn error_bounds(&self, confidence: f64) -> ErrorBounds;

    /// Relative standard error (RSE) of the estimate
    fn relative_error(&self) -> f64;

    /// Estimate with default 95% confidence bounds
    fn estimate_with_bounds(&self) -> ErrorBounds {
        self.error_bounds(0.95)
    }
}

/// Frequency estimation sketches
pub trait FrequencySketch: Sketch {
    /// Estimate frequency of an item. Never below the true count.
    fn estimate_frequency(&self, item: &Self::Item) -> u64;

    fn exceeds_threshold(&self, item: &Self::Item, threshold: u64) -> bool {
        self.estimate_frequency(item) >= threshold
    }
}

/// Top-K capability, only for sketches that actually track candidate keys
pub trait HeavyHitters: FrequencySketch {
    /// Owned form of a tracked key
    type Key;

    /// Tracked keys whose estimate is at least `threshold` (a fraction of the
    /// total count, 0.0 to 1.0)
    fn heavy_hitters(&self, threshold: f64) -> Vec<(Self::Key, u64)>;

    /// Up to `k` tracked keys, highest estimate first
    fn top_k(&self, k: usize) -> Vec<(Self::Key, u64)>;
}

/// Quantile estimation sketches
pub trait QuantileSketch: Sketch {
    /// The value type being tracked
    type Value: PartialOrd + Clone;

    fn add(&mut self, value: Self::Value);

    /// Get quantile value at given rank (0.0 to 1.0)
    ///
    /// Returns `None` when nothing has been added yet.
    fn quantile(&self, rank: f64) -> Option<Self::Value>;

    /// Get rank of a value (0.0 to 1.0)
    fn rank(&self, value: &Self::Value) -> f64;

    fn cdf(&self, value: &Self::Value) -> f64 {
        self.rank(value)
    }

    fn min(&self) -> Option<Self::Value>;

    fn max(&self) -> Option<Self::Value>;

    fn median(&self) -> Option<Self::Value> {
        self.quantile(0.5)
    }

    fn quantiles(&self, ranks: &[f64]) -> Vec<Option<Self::Value>> {
        ranks.iter().map(|&r| self.quantile(r)).collect()
    }
}

/// Sampling sketches
pub trait SamplingSketch: Sketch
where
    Self::Item: Sized + Clone,
{
    /// Borrow the current sample
    fn sample(&self) -> &[Self::Item];

    /// Sample size limit
    fn capacity(&self) -> usize;

    fn sample_size(&self) -> usize {
        self.sample().len()
    }
}
