//! Stratified reservoir sampling
//!
//! One [`ReservoirSampler`] per stratum. The stratum key and the sampled
//! payload are separate arguments: the key must be a small hashable value
//! (a path, a status class, a tuple of such fields), the payload can be any
//! record. Which fields make up the key is the caller's decision.

use super::ReservoirSampler;
use crate::error::{MergeError, SketchError};
use crate::traits::Sketch;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

const STRATUM_SEED_STEP: u64 = 0x2545_f491_4f6c_dd1d;

/// Uniform sample of up to `per_stratum` payloads for every stratum key
///
/// Without a stratum limit, memory grows with the number of distinct keys;
/// [`with_max_strata`](Self::with_max_strata) bounds it.
///
/// # Example
///
/// ```
/// use streamstats::sampling::StratifiedSampler;
///
/// let mut by_status = StratifiedSampler::<u16, String>::with_seed(2, 1);
/// for i in 0..100 {
///     let status = if i % 10 == 0 { 500 } else { 200 };
///     by_status.add(status, format!("request {}", i)).unwrap();
/// }
///
/// assert_eq!(by_status.num_strata(), 2);
/// assert_eq!(by_status.samples(&500).len(), 2);
/// assert_eq!(by_status.stratum_count(&500), 10);
/// ```
#[derive(Clone, Debug)]
pub struct StratifiedSampler<K, T> {
    per_stratum: usize,
    max_strata: Option<usize>,
    /// Base seed for per-stratum samplers; entropy when absent
    seed: Option<u64>,
    strata: HashMap<K, ReservoirSampler<T>>,
    count: u64,
    /// Payloads refused because their stratum could not be created
    rejected: u64,
}

impl<K: Hash + Eq + Clone, T: Clone> StratifiedSampler<K, T> {
    pub fn new(per_stratum: usize) -> Self {
        Self {
            per_stratum,
            max_strata: None,
            seed: None,
            strata: HashMap::new(),
            count: 0,
            rejected: 0,
        }
    }

    /// Reproducible sampling: stratum `n` (in creation order) is seeded from
    /// `seed` and `n`
    pub fn with_seed(per_stratum: usize, seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::new(per_stratum)
        }
    }

    /// Refuse payloads for new strata once `limit` strata exist
    pub fn with_max_strata(mut self, limit: usize) -> Self {
        self.max_strata = Some(limit);
        self
    }

    fn new_stratum(&self) -> ReservoirSampler<T> {
        match self.seed {
            Some(seed) => {
                let n = self.strata.len() as u64 + 1;
                ReservoirSampler::with_seed(self.per_stratum, seed ^ n.wrapping_mul(STRATUM_SEED_STEP))
            }
            None => ReservoirSampler::new(self.per_stratum),
        }
    }

    fn at_limit(&self) -> bool {
        self.max_strata.is_some_and(|limit| self.strata.len() >= limit)
    }

    /// Offer `payload` to the reservoir of `stratum`
    ///
    /// # Errors
    ///
    /// [`SketchError::StratumLimit`] if `stratum` is new and the sampler
    /// already holds its maximum number of strata.
    pub fn add(&mut self, stratum: K, payload: T) -> Result<(), SketchError> {
        if let Some(reservoir) = self.strata.get_mut(&stratum) {
            reservoir.add(payload);
            self.count += 1;
            return Ok(());
        }

        if let (true, Some(limit)) = (self.at_limit(), self.max_strata) {
            self.rejected += 1;
            debug!(limit, "stratified sampler refused a new stratum");
            return Err(SketchError::StratumLimit { limit });
        }

        let mut reservoir = self.new_stratum();
        reservoir.add(payload);
        self.strata.insert(stratum, reservoir);
        self.count += 1;
        Ok(())
    }

    /// Copy of the sample for one stratum; empty if the stratum is unknown
    pub fn samples(&self, stratum: &K) -> Vec<T> {
        self.strata
            .get(stratum)
            .map(|r| r.get_samples())
            .unwrap_or_default()
    }

    /// Copy of every stratum's sample
    pub fn get_samples(&self) -> HashMap<K, Vec<T>> {
        self.strata
            .iter()
            .map(|(k, r)| (k.clone(), r.get_samples()))
            .collect()
    }

    pub fn strata(&self) -> impl Iterator<Item = &K> {
        self.strata.keys()
    }

    /// Reservoir of one stratum, for its numeric helpers
    pub fn stratum(&self, stratum: &K) -> Option<&ReservoirSampler<T>> {
        self.strata.get(stratum)
    }

    /// Payloads offered to `stratum` so far
    pub fn stratum_count(&self, stratum: &K) -> u64 {
        self.strata.get(stratum).map_or(0, |r| r.items_seen())
    }

    pub fn num_strata(&self) -> usize {
        self.strata.len()
    }

    pub fn per_stratum(&self) -> usize {
        self.per_stratum
    }

    /// Payloads accepted so far
    pub fn items_seen(&self) -> u64 {
        self.count
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.strata.clear();
        self.count = 0;
        self.rejected = 0;
    }
}

impl<K, T> StratifiedSampler<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone + core::fmt::Debug,
{
    /// Merge stratum by stratum
    ///
    /// Strata only `other` knows are copied in while the stratum limit
    /// allows; the payloads of strata that do not fit count as rejected.
    pub fn merge(&mut self, other: &Self) -> Result<(), MergeError> {
        if self.per_stratum != other.per_stratum {
            let err = MergeError::IncompatibleConfig {
                expected: format!("per_stratum={}", self.per_stratum),
                found: format!("per_stratum={}", other.per_stratum),
            };
            debug!(%err, "stratified merge rejected");
            return Err(err);
        }

        for (key, theirs) in &other.strata {
            if let Some(mine) = self.strata.get_mut(key) {
                mine.merge(theirs)?;
                self.count += theirs.items_seen();
            } else if self.at_limit() {
                self.rejected += theirs.items_seen();
            } else {
                self.strata.insert(key.clone(), theirs.clone());
                self.count += theirs.items_seen();
            }
        }

        self.rejected += other.rejected;
        Ok(())
    }
}
