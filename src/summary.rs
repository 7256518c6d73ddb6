//! Per-endpoint traffic summaries
//!
//! Ties the four sketch families together the way a log pipeline uses them:
//! one latency digest, one size digest and one row sample per endpoint, plus
//! stream-wide endpoint frequencies and distinct client counts. Each worker
//! owns its own [`TrafficSummary`]; partial summaries are combined with
//! [`TrafficSummary::merge`].

use crate::cardinality::HyperLogLog;
use crate::config::SketchConfig;
use crate::error::{ConfigError, MergeError};
use crate::frequency::TopKCountMin;
use crate::quantiles::TDigest;
use crate::sampling::ReservoirSampler;
use crate::traits::{HeavyHitters, Sketch};
use std::collections::HashMap;
use tracing::debug;

/// One parsed request record
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation<'a> {
    pub endpoint: &'a str,
    pub client_ip: &'a str,
    /// Milliseconds
    pub response_time: f64,
    /// Bytes
    pub response_size: f64,
}

/// Sketches kept for a single endpoint
#[derive(Clone, Debug)]
pub struct EndpointSummary {
    pub latency: TDigest,
    pub size: TDigest,
    /// Uniform sample of response times
    pub rows: ReservoirSampler<f64>,
    requests: u64,
}

impl EndpointSummary {
    pub fn new(config: &SketchConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            latency: config.quantile.build()?,
            size: config.quantile.build()?,
            rows: config.reservoir.build(),
            requests: 0,
        })
    }

    fn record(&mut self, response_time: f64, response_size: f64) {
        self.requests += 1;
        self.latency.add(response_time);
        self.size.add(response_size);
        if !response_time.is_nan() {
            self.rows.add(response_time);
        }
    }

    /// Requests recorded for this endpoint, including ones whose latency
    /// was not a number
    pub fn requests(&self) -> u64 {
        self.requests
    }

    fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.latency.merge(&other.latency)?;
        self.size.merge(&other.size)?;
        self.rows.merge(&other.rows)?;
        self.requests += other.requests;
        Ok(())
    }
}

/// Stream-wide traffic summary
///
/// No internal synchronization; a summary belongs to one worker at a time.
///
/// # Example
///
/// ```
/// use streamstats::config::SketchConfig;
/// use streamstats::summary::{Observation, TrafficSummary};
///
/// let mut summary = TrafficSummary::new(SketchConfig::default()).unwrap();
/// summary.record(&Observation {
///     endpoint: "/api/users",
///     client_ip: "192.0.2.10",
///     response_time: 42.0,
///     response_size: 512.0,
/// });
///
/// let users = summary.endpoint("/api/users").unwrap();
/// assert_eq!(users.latency.percentile(50.0), Some(42.0));
/// assert_eq!(summary.total_records(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct TrafficSummary {
    config: SketchConfig,
    endpoints: HashMap<String, EndpointSummary>,
    path_frequency: TopKCountMin,
    client_cardinality: HyperLogLog,
    /// Empty digest cloned for each new endpoint
    blank_digest: TDigest,
    records: u64,
}

impl TrafficSummary {
    /// Validate `config` and allocate the stream-wide sketches
    ///
    /// Per-endpoint sketches are created on first sight of each endpoint.
    pub fn new(config: SketchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            path_frequency: config.frequency.build_with_top_k()?,
            client_cardinality: config.cardinality.build()?,
            blank_digest: config.quantile.build()?,
            endpoints: HashMap::new(),
            records: 0,
            config,
        })
    }

    pub fn config(&self) -> &SketchConfig {
        &self.config
    }

    pub fn record(&mut self, obs: &Observation<'_>) {
        self.records += 1;
        self.path_frequency.increment(obs.endpoint, 1);
        self.client_cardinality.add(obs.client_ip);

        if let Some(entry) = self.endpoints.get_mut(obs.endpoint) {
            entry.record(obs.response_time, obs.response_size);
            return;
        }

        let mut entry = EndpointSummary {
            latency: self.blank_digest.clone(),
            size: self.blank_digest.clone(),
            rows: self.config.reservoir.build(),
            requests: 0,
        };
        debug!(endpoint = obs.endpoint, "tracking new endpoint");
        entry.record(obs.response_time, obs.response_size);
        self.endpoints.insert(obs.endpoint.to_owned(), entry);
    }

    pub fn endpoint(&self, name: &str) -> Option<&EndpointSummary> {
        self.endpoints.get(name)
    }

    pub fn endpoints(&self) -> impl Iterator<Item = (&str, &EndpointSummary)> {
        self.endpoints.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn num_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    /// Estimated number of distinct client addresses
    pub fn distinct_clients(&self) -> f64 {
        self.client_cardinality.cardinality()
    }

    /// Most requested endpoints with their estimated request counts
    pub fn top_endpoints(&self, k: usize) -> Vec<(String, u64)> {
        self.path_frequency.top_k(k)
    }

    pub fn path_frequency(&self) -> &TopKCountMin {
        &self.path_frequency
    }

    pub fn client_cardinality(&self) -> &HyperLogLog {
        &self.client_cardinality
    }

    pub fn total_records(&self) -> u64 {
        self.records
    }

    /// Fold another worker's summary into this one
    ///
    /// Both summaries must share frequency, cardinality and reservoir
    /// parameters; on mismatch nothing is modified.
    pub fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        self.check_compatible(other)?;

        self.path_frequency.merge(&other.path_frequency)?;
        self.client_cardinality.merge(&other.client_cardinality)?;

        for (name, theirs) in &other.endpoints {
            match self.endpoints.get_mut(name) {
                Some(mine) => mine.merge(theirs)?,
                None => {
                    debug!(endpoint = name.as_str(), "tracking new endpoint from merge");
                    self.endpoints.insert(name.clone(), theirs.clone());
                }
            }
        }

        self.records += other.records;
        Ok(())
    }

    fn check_compatible(&self, other: &Self) -> Result<(), MergeError> {
        let (mine, theirs) = (&self.config, &other.config);
        let freq_matches = mine.frequency.width == theirs.frequency.width
            && mine.frequency.depth == theirs.frequency.depth
            && mine.frequency.seed == theirs.frequency.seed;
        let shape_matches = freq_matches
            && mine.cardinality.precision == theirs.cardinality.precision
            && mine.reservoir.max_size == theirs.reservoir.max_size;
        if shape_matches {
            return Ok(());
        }

        let err = MergeError::IncompatibleConfig {
            expected: Self::describe(mine),
            found: Self::describe(theirs),
        };
        debug!(%err, "traffic summary merge rejected");
        Err(err)
    }

    fn describe(config: &SketchConfig) -> String {
        format!(
            "cms={}x{} seed={} precision={} reservoir={}",
            config.frequency.width,
            config.frequency.depth,
            config.frequency.seed,
            config.cardinality.precision,
            config.reservoir.max_size
        )
    }
}
