//! Distinct-count estimation
//!
//! - [`HyperLogLog`]: fixed register array, harmonic-mean estimator with
//!   small- and large-range corrections
//!
//! # Example
//!
//! ```
//! use streamstats::cardinality::HyperLogLog;
//! use streamstats::traits::Sketch;
//!
//! // one estimator per parser, merged afterwards
//! let mut left = HyperLogLog::new(12).unwrap();
//! let mut right = HyperLogLog::new(12).unwrap();
//! left.add("198.51.100.1");
//! right.add("198.51.100.2");
//!
//! left.merge(&right).unwrap();
//! println!("distinct clients: ~{:.0}", left.cardinality());
//! ```

mod hyperloglog;

pub use hyperloglog::HyperLogLog;

use crate::error::ConfigError;

/// Smallest supported precision (16 registers)
pub const MIN_PRECISION: u8 = 4;

/// Largest supported precision (65536 registers)
pub const MAX_PRECISION: u8 = 16;

/// Smallest precision whose relative standard error is at most `target_error`
///
/// HLL error is approximately `1.04 / sqrt(2^p)`. Loose targets are raised to
/// [`MIN_PRECISION`], which only tightens the error. A target that would need
/// a precision above [`MAX_PRECISION`] is an error.
pub fn precision_for_error(target_error: f64) -> Result<u8, ConfigError> {
    if !(target_error > 0.0 && target_error < 1.0) {
        return Err(ConfigError::InvalidErrorRate(target_error));
    }
    // m = (1.04 / error)^2, p = log2(m)
    let m = (1.04 / target_error).powi(2);
    let p = m.log2().ceil().max(MIN_PRECISION as f64);
    if p > MAX_PRECISION as f64 {
        return Err(ConfigError::PrecisionOutOfRange {
            precision: p.min(u8::MAX as f64) as u8,
            min: MIN_PRECISION,
            max: MAX_PRECISION,
        });
    }
    Ok(p as u8)
}

/// Register memory in bytes for a given precision
pub fn memory_for_precision(precision: u8) -> usize {
    1usize << precision
}

/// Expected relative standard error for a given precision
pub fn error_for_precision(precision: u8) -> f64 {
    let m = (1usize << precision) as f64;
    1.04 / m.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_for_error() {
        let p = precision_for_error(0.01).unwrap();
        assert!(p >= 13 && p <= 15);
        assert!(error_for_precision(p) <= 0.01);

        let p2 = precision_for_error(0.005).unwrap();
        assert!(p2 > p);

        assert_eq!(precision_for_error(0.9), Ok(MIN_PRECISION));
        assert_eq!(precision_for_error(error_for_precision(16) * 1.001), Ok(16));
    }

    #[test]
    fn test_precision_for_error_out_of_range() {
        assert_eq!(
            precision_for_error(0.0001),
            Err(ConfigError::PrecisionOutOfRange {
                precision: 27,
                min: MIN_PRECISION,
                max: MAX_PRECISION,
            })
        );
        assert!(matches!(
            precision_for_error(0.0),
            Err(ConfigError::InvalidErrorRate(_))
        ));
        assert!(matches!(
            precision_for_error(f64::NAN),
            Err(ConfigError::InvalidErrorRate(_))
        ));
    }

    #[test]
    fn test_error_for_precision() {
        let e12 = error_for_precision(12);
        assert!((e12 - 0.01625).abs() < 1e-4);
        assert!(error_for_precision(10) > e12);
    }

    #[test]
    fn test_memory_for_precision() {
        assert_eq!(memory_for_precision(12), 4096);
    }
}
