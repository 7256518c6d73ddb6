//! Quantile estimation
//!
//! - [`TDigest`]: mergeable percentile sketch, most precise at the tails
//!
//! # Example
//!
//! ```
//! use streamstats::quantiles::TDigest;
//! use streamstats::traits::Sketch;
//!
//! // one digest per shard, merged at report time
//! let mut shard_a = TDigest::new(100.0).unwrap();
//! let mut shard_b = TDigest::new(100.0).unwrap();
//! shard_a.add_batch(&[12.0, 15.0, 9.0]);
//! shard_b.add_batch(&[230.0, 14.0]);
//!
//! shard_a.merge(&shard_b).unwrap();
//! println!("p95 latency: {:?}", shard_a.percentile(95.0));
//! ```

mod tdigest;

pub use tdigest::{Centroid, TDigest};
