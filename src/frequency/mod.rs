//! Frequency estimation
//!
//! - [`CountMinSketch`]: per-key counts with one-sided (over-estimating) error
//! - [`TopKCountMin`]: the same counters plus a bounded heap of the most
//!   frequent keys seen so far
//!
//! # Example
//!
//! ```
//! use streamstats::frequency::CountMinSketch;
//! use streamstats::traits::FrequencySketch;
//!
//! let mut ips = CountMinSketch::new(1000, 5, 42).unwrap();
//! ips.increment("203.0.113.7", 1);
//! ips.increment("203.0.113.7", 1);
//!
//! assert!(ips.exceeds_threshold("203.0.113.7", 2));
//! ```

mod count_min;
mod top_k;

pub use count_min::CountMinSketch;
pub use top_k::TopKCountMin;
