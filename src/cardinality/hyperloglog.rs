//! HyperLogLog cardinality estimator
//!
//! Each item is hashed to 64 bits. The top `precision` bits choose a
//! register; the register keeps the longest run of leading zeros (plus one)
//! seen in the remaining bits. The harmonic mean of the registers gives the
//! estimate, with linear counting for small cardinalities and the classic
//! correction near the top of the 32-bit range.

use super::{MAX_PRECISION, MIN_PRECISION};
use crate::error::{ConfigError, MergeError};
use crate::traits::{CardinalitySketch, ErrorBounds, Sketch};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

const TWO_POW_32: f64 = 4_294_967_296.0;

/// HyperLogLog cardinality estimator
///
/// Memory is one byte per register, `2^precision` registers.
///
/// | Precision | Memory | Error |
/// |-----------|--------|-------|
/// | 4 | 16 B | ~26% |
/// | 10 | 1 KB | ~3.25% |
/// | 12 | 4 KB | ~1.63% |
/// | 14 | 16 KB | ~0.81% |
/// | 16 | 64 KB | ~0.41% |
///
/// Two estimators compare equal when they have the same precision and the
/// same registers; the insertion counter is not part of the comparison.
///
/// # Example
///
/// ```
/// use streamstats::cardinality::HyperLogLog;
///
/// let mut clients = HyperLogLog::new(12).unwrap();
/// for i in 0..10_000 {
///     clients.add(&format!("10.1.{}.{}", i / 256, i % 256));
/// }
///
/// let distinct = clients.cardinality();
/// assert!((distinct - 10_000.0).abs() < 500.0);
/// ```
#[derive(Clone, Debug)]
pub struct HyperLogLog {
    precision: u8,
    registers: Vec<u8>,
    /// Items offered, duplicates included
    count: u64,
}

impl PartialEq for HyperLogLog {
    fn eq(&self, other: &Self) -> bool {
        self.precision == other.precision && self.registers == other.registers
    }
}

impl Eq for HyperLogLog {}

impl HyperLogLog {
    /// Default precision: 4096 registers, ~1.6% standard error
    pub const DEFAULT_PRECISION: u8 = 12;

    /// Create an estimator with `2^precision` registers
    ///
    /// # Errors
    ///
    /// [`ConfigError::PrecisionOutOfRange`] unless `4 <= precision <= 16`.
    pub fn new(precision: u8) -> Result<Self, ConfigError> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(ConfigError::PrecisionOutOfRange {
                precision,
                min: MIN_PRECISION,
                max: MAX_PRECISION,
            });
        }

        Ok(Self {
            precision,
            registers: vec![0u8; 1usize << precision],
            count: 0,
        })
    }

    /// Create an estimator targeting a relative standard error
    ///
    /// Fails with [`ConfigError::PrecisionOutOfRange`] when the target needs
    /// more registers than the largest precision provides.
    pub fn with_error(target_error: f64) -> Result<Self, ConfigError> {
        Self::new(super::precision_for_error(target_error)?)
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of registers (m = 2^precision)
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    pub fn add(&mut self, item: &str) {
        self.add_bytes(item.as_bytes());
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.add_hash(xxh3_64(bytes));
    }

    /// Add a pre-computed 64-bit hash
    pub fn add_hash(&mut self, hash: u64) {
        self.count += 1;

        let idx = (hash >> (64 - self.precision)) as usize;
        // Sentinel bit caps the run at 64 - precision + 1
        let rest = (hash << self.precision) | (1u64 << (self.precision - 1));
        let rho = rest.leading_zeros() as u8 + 1;

        let register = &mut self.registers[idx];
        if rho > *register {
            *register = rho;
        }
    }

    /// Estimated number of distinct items; `0.0` when nothing was added
    pub fn cardinality(&self) -> f64 {
        let m = self.registers.len() as f64;
        let raw = self.raw_estimate();

        if raw <= 2.5 * m {
            let zeros = self.registers.iter().filter(|&&r| r == 0).count();
            if zeros > 0 {
                return m * (m / zeros as f64).ln();
            }
            return raw;
        }

        if raw > TWO_POW_32 / 30.0 && raw < TWO_POW_32 {
            return -TWO_POW_32 * (1.0 - raw / TWO_POW_32).ln();
        }

        raw
    }

    /// `alpha_m * m^2 / sum(2^-register)`
    fn raw_estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let sum: f64 = self
            .registers
            .iter()
            .map(|&r| 2f64.powi(-(r as i32)))
            .sum();
        self.alpha() * m * m / sum
    }

    fn alpha(&self) -> f64 {
        match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            m => 0.7213 / (1.0 + 1.079 / m as f64),
        }
    }

    /// Merge into a new estimator, leaving both inputs untouched
    pub fn merged(&self, other: &Self) -> Result<Self, MergeError> {
        let mut out = self.clone();
        out.merge(other)?;
        Ok(out)
    }
}

impl Default for HyperLogLog {
    fn default() -> Self {
        Self {
            precision: Self::DEFAULT_PRECISION,
            registers: vec![0u8; 1usize << Self::DEFAULT_PRECISION],
            count: 0,
        }
    }
}

impl Sketch for HyperLogLog {
    type Item = str;

    fn update(&mut self, item: &str) {
        self.add(item);
    }

    /// Register-wise maximum; requires equal precision
    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.precision != other.precision {
            let err = MergeError::IncompatibleConfig {
                expected: format!("precision={}", self.precision),
                found: format!("precision={}", other.precision),
            };
            debug!(%err, "hyperloglog merge rejected");
            return Err(err);
        }

        for (a, &b) in self.registers.iter_mut().zip(other.registers.iter()) {
            *a = (*a).max(b);
        }

        self.count += other.count;
        Ok(())
    }

    fn clear(&mut self) {
        self.registers.fill(0);
        self.count = 0;
    }

    fn size_bytes(&self) -> usize {
        self.registers.len() + core::mem::size_of::<Self>()
    }

    fn count(&self) -> u64 {
        self.count
    }
}

impl CardinalitySketch for HyperLogLog {
    fn estimate(&self) -> f64 {
        self.cardinality()
    }

    fn error_bounds(&self, confidence: f64) -> ErrorBounds {
        let estimate = self.cardinality();
        let rse = self.relative_error();

        let z = match confidence {
            c if c >= 0.99 => 2.576,
            c if c >= 0.95 => 1.96,
            c if c >= 0.90 => 1.645,
            c if c >= 0.80 => 1.282,
            _ => 1.0,
        };

        let margin = z * rse * estimate;
        ErrorBounds::new(
            (estimate - margin).max(0.0),
            estimate,
            estimate + margin,
            confidence,
        )
    }

    fn relative_error(&self) -> f64 {
        super::error_for_precision(self.precision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::error_for_precision;

    fn filled(precision: u8, prefix: &str, n: usize) -> HyperLogLog {
        let mut hll = HyperLogLog::new(precision).unwrap();
        for i in 0..n {
            hll.add(&format!("{}_{}", prefix, i));
        }
        hll
    }

    #[test]
    fn test_basic() {
        let estimate = filled(12, "item", 10_000).cardinality();
        assert!(estimate > 9000.0 && estimate < 11000.0, "estimate={}", estimate);
    }

    #[test]
    fn test_empty() {
        let hll = HyperLogLog::new(12).unwrap();
        assert_eq!(hll.cardinality(), 0.0);
        assert!(hll.is_empty());
    }

    #[test]
    fn test_precision_range() {
        assert!(HyperLogLog::new(4).is_ok());
        assert!(HyperLogLog::new(16).is_ok());
        assert_eq!(
            HyperLogLog::new(3),
            Err(ConfigError::PrecisionOutOfRange {
                precision: 3,
                min: 4,
                max: 16
            })
        );
        assert!(HyperLogLog::new(17).is_err());
    }

    #[test]
    fn test_duplicates() {
        let mut hll = HyperLogLog::new(12).unwrap();
        for _ in 0..10_000 {
            hll.add("same_item");
        }
        let estimate = hll.cardinality();
        assert!(estimate >= 0.5 && estimate <= 2.0, "estimate={}", estimate);
        assert_eq!(hll.count(), 10_000);
    }

    #[test]
    fn test_small_cardinalities_use_linear_counting() {
        let estimate = filled(12, "item", 100).cardinality();
        assert!(estimate > 90.0 && estimate < 110.0, "estimate={}", estimate);
    }

    #[test]
    fn test_register_value_is_rank_of_first_one() {
        let mut hll = HyperLogLog::new(4).unwrap();
        // register 0b0011, remaining bits start with 001
        hll.add_hash(0b0011_001u64 << 57);
        assert_eq!(hll.registers()[3], 3);
        // all-zero tail saturates at 64 - p + 1
        hll.add_hash(0b0101u64 << 60);
        assert_eq!(hll.registers()[5], 61);
    }

    #[test]
    fn test_merge() {
        let mut hll1 = filled(12, "a", 5000);
        let hll2 = filled(12, "b", 5000);
        let est1 = hll1.cardinality();

        hll1.merge(&hll2).unwrap();
        let merged = hll1.cardinality();
        assert!(merged > est1);
        assert!(merged > 9000.0 && merged < 11000.0, "merged={}", merged);
    }

    #[test]
    fn test_merge_matches_direct_union() {
        let a = filled(12, "x", 3000);
        let b = filled(12, "y", 3000);
        let mut direct = filled(12, "x", 3000);
        for i in 0..3000 {
            direct.add(&format!("y_{}", i));
        }

        let merged = a.merged(&b).unwrap();
        assert_eq!(merged, direct);
        assert_eq!(merged.cardinality(), direct.cardinality());
    }

    #[test]
    fn test_merge_commutative_and_idempotent() {
        let a = filled(10, "a", 2000);
        let b = filled(10, "b", 700);

        assert_eq!(a.merged(&b).unwrap(), b.merged(&a).unwrap());
        assert_eq!(a.merged(&a).unwrap(), a);
    }

    #[test]
    fn test_merge_incompatible() {
        let mut hll1 = HyperLogLog::new(12).unwrap();
        let hll2 = HyperLogLog::new(14).unwrap();
        assert!(hll1.merge(&hll2).is_err());
    }

    #[test]
    fn test_error_bounds() {
        let hll = filled(14, "item", 100_000);
        let bounds = hll.error_bounds(0.95);
        assert!(bounds.lower < bounds.estimate);
        assert!(bounds.estimate < bounds.upper);
        assert!(bounds.lower < 110_000.0);
        assert!(bounds.upper > 90_000.0);
    }

    #[test]
    fn test_clear() {
        let mut hll = filled(12, "item", 1000);
        assert!(hll.cardinality() > 0.0);
        hll.clear();
        assert_eq!(hll.cardinality(), 0.0);
        assert_eq!(hll.count(), 0);
    }

    #[test]
    fn test_with_error() {
        let hll = HyperLogLog::with_error(0.01).unwrap();
        assert!(hll.precision() >= 13);
        assert!(HyperLogLog::with_error(0.0).is_err());
        assert_eq!(HyperLogLog::with_error(0.9).unwrap().precision(), MIN_PRECISION);
    }

    #[test]
    fn test_with_error_beyond_max_precision() {
        let err = HyperLogLog::with_error(0.0001).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::PrecisionOutOfRange { max: MAX_PRECISION, .. }
        ));
        let loosest = error_for_precision(MAX_PRECISION) * 1.001;
        assert_eq!(HyperLogLog::with_error(loosest).unwrap().precision(), MAX_PRECISION);
    }

    #[test]
    fn test_update_matches_add() {
        let mut via_trait = HyperLogLog::new(10).unwrap();
        let mut direct = HyperLogLog::new(10).unwrap();
        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.1"] {
            via_trait.update(ip);
            direct.add(ip);
        }
        assert_eq!(via_trait, direct);
        assert_eq!(via_trait.count(), 3);
    }

    #[test]
    fn test_default() {
        assert_eq!(HyperLogLog::default().num_registers(), 4096);
    }
}
