//! Stream sampling
//!
//! - [`ReservoirSampler`]: fixed-size uniform sample of a stream of unknown
//!   length (Algorithm R)
//! - [`StratifiedSampler`]: one reservoir per stratum key, so rare strata
//!   keep their own sample instead of being crowded out
//!
//! # Example
//!
//! ```
//! use streamstats::sampling::ReservoirSampler;
//!
//! let mut rows = ReservoirSampler::<u64>::with_seed(10, 3);
//! for id in 0..1_000_000 {
//!     rows.add(id);
//! }
//!
//! assert_eq!(rows.sample().len(), 10);
//! assert_eq!(rows.items_seen(), 1_000_000);
//! ```

mod reservoir;
mod stratified;

pub use reservoir::ReservoirSampler;
pub use stratified::StratifiedSampler;
