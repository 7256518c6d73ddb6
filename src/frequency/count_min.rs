//! Count-Min Sketch frequency estimator
//!
//! A `[depth][width]` counter table with one seeded hash per row. An increment
//! touches one cell in every row; a point query takes the minimum of those
//! cells. Collisions only ever add to a cell, so the minimum never falls
//! below the true count.

use crate::error::{ConfigError, MergeError};
use crate::traits::{FrequencySketch, Sketch};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Spreads row seeds apart so rows hash independently
const ROW_SEED_STEP: u64 = 0x9e37_79b9_7f4a_7c15;

/// Count-Min Sketch for frequency estimation
///
/// For every key: `true_count <= estimate`, and with probability at least
/// `1 - 1/2^depth`, `estimate <= true_count + (e / width) * total_count`.
///
/// Keys are opaque byte strings; `&str` keys are hashed by their UTF-8 bytes.
///
/// # Example
///
/// ```
/// use streamstats::frequency::CountMinSketch;
///
/// let mut cms = CountMinSketch::new(2000, 5, 0).unwrap();
///
/// cms.increment("/api/v1/users", 5);
/// cms.increment("/api/v1/orders", 3);
/// cms.increment("/api/v1/users", 2);
///
/// assert!(cms.estimate("/api/v1/users") >= 7);
/// assert!(cms.estimate("/api/v1/orders") >= 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,
    seed: u64,
    /// One hash seed per row, derived from `seed`
    row_seeds: Vec<u64>,
    /// Counter table
    table: Vec<Vec<u64>>,
    /// Sum of all increments
    total_count: u64,
    /// Number of increment calls
    num_updates: u64,
}

impl CountMinSketch {
    /// Create a sketch with explicit dimensions
    ///
    /// # Arguments
    ///
    /// * `width` - Counters per row (larger = lower over-estimation)
    /// * `depth` - Number of rows (larger = lower failure probability)
    /// * `seed` - Base seed for the row hash functions. Sketches only merge
    ///   when they share it.
    pub fn new(width: usize, depth: usize, seed: u64) -> Result<Self, ConfigError> {
        if width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        if depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }

        let row_seeds = (0..depth as u64)
            .map(|row| seed ^ (row + 1).wrapping_mul(ROW_SEED_STEP))
            .collect();

        Ok(Self {
            width,
            depth,
            seed,
            row_seeds,
            table: vec![vec![0u64; width]; depth],
            total_count: 0,
            num_updates: 0,
        })
    }

    /// Size the sketch from error parameters
    ///
    /// `width = ceil(e / epsilon)`, `depth = ceil(ln(1 / delta))`.
    ///
    /// * `epsilon` - Maximum overcount as a fraction of the total (e.g. 0.001)
    /// * `delta` - Probability of exceeding that overcount (e.g. 0.01)
    pub fn with_error(epsilon: f64, delta: f64, seed: u64) -> Result<Self, ConfigError> {
        if !(epsilon > 0.0 && epsilon < 1.0) {
            return Err(ConfigError::InvalidErrorRate(epsilon));
        }
        if !(delta > 0.0 && delta < 1.0) {
            return Err(ConfigError::InvalidProbability(delta));
        }

        let width = (core::f64::consts::E / epsilon).ceil() as usize;
        let depth = (1.0 / delta).ln().ceil().max(1.0) as usize;
        Self::new(width, depth, seed)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Sum of all increments, merges included
    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    #[inline]
    fn column(&self, key: &[u8], row: usize) -> usize {
        (xxh3_64_with_seed(key, self.row_seeds[row]) % self.width as u64) as usize
    }

    /// Add `count` occurrences of `key`
    pub fn increment(&mut self, key: &str, count: u64) {
        self.increment_bytes(key.as_bytes(), count);
    }

    pub fn increment_bytes(&mut self, key: &[u8], count: u64) {
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(count);

        for row in 0..self.depth {
            let col = self.column(key, row);
            let cell = &mut self.table[row][col];
            *cell = cell.saturating_add(count);
        }
    }

    /// Add `count` occurrences using conservative update
    ///
    /// Only raises each of the key's cells as far as the new estimate, which
    /// trims over-counting from collisions. The one-sided guarantee still
    /// holds, but a sketch built this way should only be merged with
    /// sketches built the same way if tight estimates matter.
    pub fn increment_conservative(&mut self, key: &str, count: u64) {
        let key = key.as_bytes();
        self.num_updates += 1;
        self.total_count = self.total_count.saturating_add(count);

        let target = self.estimate_bytes(key).saturating_add(count);
        for row in 0..self.depth {
            let col = self.column(key, row);
            let cell = &mut self.table[row][col];
            if *cell < target {
                *cell = target;
            }
        }
    }

    /// Estimated occurrences of `key`; never below the true count
    pub fn estimate(&self, key: &str) -> u64 {
        self.estimate_bytes(key.as_bytes())
    }

    pub fn estimate_bytes(&self, key: &[u8]) -> u64 {
        (0..self.depth)
            .map(|row| self.table[row][self.column(key, row)])
            .min()
            .unwrap_or(0)
    }

    /// Estimated dot product of the two underlying frequency vectors
    ///
    /// `None` when the sketches have different shapes or seeds.
    pub fn inner_product(&self, other: &Self) -> Option<u64> {
        if self.check_shape(other).is_err() {
            return None;
        }

        self.table
            .iter()
            .zip(other.table.iter())
            .map(|(a, b)| {
                a.iter()
                    .zip(b.iter())
                    .fold(0u64, |acc, (&x, &y)| acc.saturating_add(x.saturating_mul(y)))
            })
            .min()
    }

    /// Expected worst-case overcount: `(e / width) * total_count`
    pub fn error_bound(&self) -> u64 {
        let epsilon = core::f64::consts::E / self.width as f64;
        (epsilon * self.total_count as f64) as u64
    }

    fn check_shape(&self, other: &Self) -> Result<(), MergeError> {
        if self.width != other.width || self.depth != other.depth || self.seed != other.seed {
            return Err(MergeError::IncompatibleConfig {
                expected: format!("{}x{} seed={}", self.width, self.depth, self.seed),
                found: format!("{}x{} seed={}", other.width, other.depth, other.seed),
            });
        }
        Ok(())
    }
}

impl Sketch for CountMinSketch {
    type Item = str;

    fn update(&mut self, item: &str) {
        self.increment(item, 1);
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if let Err(err) = self.check_shape(other) {
            debug!(%err, "count-min merge rejected");
            return Err(err);
        }

        for (mine, theirs) in self.table.iter_mut().zip(other.table.iter()) {
            for (a, &b) in mine.iter_mut().zip(theirs.iter()) {
                *a = a.saturating_add(b);
            }
        }

        self.total_count = self.total_count.saturating_add(other.total_count);
        self.num_updates += other.num_updates;
        Ok(())
    }

    fn clear(&mut self) {
        for row in &mut self.table {
            row.fill(0);
        }
        self.total_count = 0;
        self.num_updates = 0;
    }

    fn size_bytes(&self) -> usize {
        core::mem::size_of::<Self>()
            + self.depth * self.width * core::mem::size_of::<u64>()
            + self.row_seeds.len() * core::mem::size_of::<u64>()
    }

    fn count(&self) -> u64 {
        self.num_updates
    }
}

impl FrequencySketch for CountMinSketch {
    fn estimate_frequency(&self, item: &str) -> u64 {
        self.estimate(item)
    }
}
