//! # Streamstats
//!
//! Bounded-memory summaries of unbounded streams.
//!
//! Each structure follows the same contract: **update** it as records go by,
//! **query** it for an approximate answer, **merge** it with another instance
//! built over a different shard of the stream.
//!
//! ## Families
//!
//! - **Quantiles**: [`TDigest`](quantiles::TDigest) for percentiles such as
//!   p50/p95/p99 latency
//! - **Frequency**: [`CountMinSketch`](frequency::CountMinSketch) for per-key
//!   counts, [`TopKCountMin`](frequency::TopKCountMin) for the most frequent keys
//! - **Cardinality**: [`HyperLogLog`](cardinality::HyperLogLog) for distinct counts
//! - **Sampling**: [`ReservoirSampler`](sampling::ReservoirSampler) and
//!   [`StratifiedSampler`](sampling::StratifiedSampler) for uniform samples
//! - **Summary**: [`TrafficSummary`](summary::TrafficSummary), per-endpoint
//!   sketches for request logs
//!
//! ## Quick Start
//!
//! ```rust
//! use streamstats::prelude::*;
//!
//! let mut latency = TDigest::new(100.0).unwrap();
//! let mut clients = HyperLogLog::new(12).unwrap();
//!
//! for (ip, ms) in [("10.0.0.1", 12.0), ("10.0.0.2", 340.0), ("10.0.0.1", 18.0)] {
//!     latency.add(ms);
//!     clients.add(ip);
//! }
//!
//! println!("p99: {:?}", latency.percentile(99.0));
//! println!("distinct clients: ~{:.0}", clients.cardinality());
//! ```
//!
//! ## Merging
//!
//! All sketches implement [`Sketch`](traits::Sketch), whose `merge` combines
//! two instances into the summary of the union of their inputs. Merging
//! instances of different shape fails with
//! [`MergeError`](error::MergeError) and leaves the receiver untouched:
//!
//! ```rust
//! use streamstats::cardinality::HyperLogLog;
//! use streamstats::traits::Sketch;
//!
//! let mut worker1 = HyperLogLog::new(14).unwrap();
//! let mut worker2 = HyperLogLog::new(14).unwrap();
//! worker1.add("user_a");
//! worker2.add("user_b");
//!
//! worker1.merge(&worker2).unwrap();
//! assert!(worker1.merge(&HyperLogLog::new(10).unwrap()).is_err());
//! ```
//!
//! ## Concurrency
//!
//! No structure synchronizes internally. [`TDigest`](quantiles::TDigest)
//! compresses lazily through a `RefCell` and is `Send` but not `Sync`; the
//! others are plain data. Give each worker its own instance and merge, or
//! wrap a shared one in a `Mutex`.
//!
//! ## Logging
//!
//! Diagnostics go through [`tracing`](https://docs.rs/tracing): compression
//! passes at `trace`, rejected merges and refused strata at `debug`. The
//! crate never installs a subscriber.
//!
//! ## Feature Flags
//!
//! - `quantiles` (default): t-digest
//! - `frequency` (default): Count-Min Sketch and its top-K tracker
//! - `cardinality` (default): HyperLogLog
//! - `sampling` (default): reservoir and stratified samplers
//! - `summary` (default): per-endpoint traffic summaries, needs all of the above
//! - `serde`: (de)serialize the [`config`] structs
//! - `full`: everything

#![cfg_attr(docsrs, feature(doc_cfg))]

// Always available
pub mod config;
pub mod error;
pub mod traits;

#[cfg(feature = "cardinality")]
#[cfg_attr(docsrs, doc(cfg(feature = "cardinality")))]
pub mod cardinality;

#[cfg(feature = "frequency")]
#[cfg_attr(docsrs, doc(cfg(feature = "frequency")))]
pub mod frequency;

#[cfg(feature = "quantiles")]
#[cfg_attr(docsrs, doc(cfg(feature = "quantiles")))]
pub mod quantiles;

#[cfg(feature = "sampling")]
#[cfg_attr(docsrs, doc(cfg(feature = "sampling")))]
pub mod sampling;

#[cfg(feature = "summary")]
#[cfg_attr(docsrs, doc(cfg(feature = "summary")))]
pub mod summary;

pub mod prelude {
    pub use crate::config::SketchConfig;
    pub use crate::error::{ConfigError, MergeError, SketchError};
    pub use crate::traits::*;

    #[cfg(feature = "cardinality")]
    pub use crate::cardinality::HyperLogLog;

    #[cfg(feature = "frequency")]
    pub use crate::frequency::{CountMinSketch, TopKCountMin};

    #[cfg(feature = "quantiles")]
    pub use crate::quantiles::TDigest;

    #[cfg(feature = "sampling")]
    pub use crate::sampling::{ReservoirSampler, StratifiedSampler};

    #[cfg(feature = "summary")]
    pub use crate::summary::{Observation, TrafficSummary};
}

#[cfg(feature = "cardinality")]
pub use cardinality::HyperLogLog;

#[cfg(feature = "frequency")]
pub use frequency::{CountMinSketch, TopKCountMin};

#[cfg(feature = "quantiles")]
pub use quantiles::TDigest;

#[cfg(feature = "sampling")]
pub use sampling::{ReservoirSampler, StratifiedSampler};

#[cfg(feature = "summary")]
pub use summary::TrafficSummary;
