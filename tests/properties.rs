//! Property tests over randomly generated streams

use proptest::prelude::*;
use std::collections::HashMap;
use streamstats::cardinality::HyperLogLog;
use streamstats::frequency::CountMinSketch;
use streamstats::quantiles::TDigest;
use streamstats::sampling::{ReservoirSampler, StratifiedSampler};
use streamstats::traits::{QuantileSketch, Sketch};

fn keys() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 0..400)
}

fn values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..2000)
}

fn hll_of(items: &[String]) -> HyperLogLog {
    let mut hll = HyperLogLog::new(10).unwrap();
    for item in items {
        hll.add(item);
    }
    hll
}

proptest! {
    #[test]
    fn count_min_never_underestimates(items in keys(), width in 1usize..64, depth in 1usize..6) {
        let mut cms = CountMinSketch::new(width, depth, 11).unwrap();
        let mut truth: HashMap<&str, u64> = HashMap::new();
        for item in &items {
            cms.increment(item, 1);
            *truth.entry(item.as_str()).or_default() += 1;
        }

        for (key, count) in truth {
            prop_assert!(cms.estimate(key) >= count);
            prop_assert!(cms.estimate(key) <= cms.total_count());
        }
    }

    #[test]
    fn conservative_update_stays_one_sided(items in keys()) {
        let mut plain = CountMinSketch::new(16, 3, 0).unwrap();
        let mut conservative = CountMinSketch::new(16, 3, 0).unwrap();
        let mut truth: HashMap<&str, u64> = HashMap::new();
        for item in &items {
            plain.increment(item, 1);
            conservative.increment_conservative(item, 1);
            *truth.entry(item.as_str()).or_default() += 1;
        }

        for (key, count) in truth {
            let estimate = conservative.estimate(key);
            prop_assert!(estimate >= count);
            prop_assert!(estimate <= plain.estimate(key));
        }
    }

    #[test]
    fn hll_merge_is_commutative_and_idempotent(a in keys(), b in keys()) {
        let ha = hll_of(&a);
        let hb = hll_of(&b);

        prop_assert_eq!(ha.merged(&hb).unwrap(), hb.merged(&ha).unwrap());
        prop_assert_eq!(ha.merged(&ha).unwrap(), ha.clone());
    }

    #[test]
    fn hll_merge_equals_union(a in keys(), b in keys()) {
        let mut union = a.clone();
        union.extend(b.iter().cloned());
        prop_assert_eq!(hll_of(&a).merged(&hll_of(&b)).unwrap(), hll_of(&union));
    }

    #[test]
    fn tdigest_centroids_sorted_and_weight_conserved(vals in values(), compression in 10.0f64..200.0) {
        let mut digest = TDigest::new(compression).unwrap();
        digest.add_batch(&vals);

        let centroids = digest.centroids();
        prop_assert!(centroids.windows(2).all(|w| w[0].mean <= w[1].mean));
        let weight: u64 = centroids.iter().map(|c| c.weight).sum();
        prop_assert_eq!(weight, vals.len() as u64);
    }

    #[test]
    fn tdigest_with_infinities_never_yields_nan(
        vals in prop::collection::vec(
            prop_oneof![
                8 => -1.0e6f64..1.0e6,
                1 => Just(f64::INFINITY),
                1 => Just(f64::NEG_INFINITY),
            ],
            1..500,
        ),
        compression in 1.0f64..200.0,
        p in 0.0f64..=100.0,
    ) {
        let mut digest = TDigest::new(compression).unwrap();
        digest.add_batch(&vals);

        let centroids = digest.centroids();
        prop_assert!(centroids.iter().all(|c| !c.mean.is_nan()));
        prop_assert!(centroids.windows(2).all(|w| w[0].mean <= w[1].mean));
        let weight: u64 = centroids.iter().map(|c| c.weight).sum();
        prop_assert_eq!(weight, vals.len() as u64);

        let v = digest.percentile(p).unwrap();
        prop_assert!(!v.is_nan(), "p{} is NaN", p);
        prop_assert!(!digest.rank(&0.0).is_nan());
    }

    #[test]
    fn tdigest_percentiles_stay_in_range(vals in values(), p in 0.0f64..=100.0) {
        let mut digest = TDigest::new(100.0).unwrap();
        digest.add_batch(&vals);

        let lo = vals.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let v = digest.percentile(p).unwrap();
        prop_assert!(v >= lo && v <= hi, "{} outside [{}, {}]", v, lo, hi);
        prop_assert_eq!(digest.min(), Some(lo));
        prop_assert_eq!(digest.max(), Some(hi));
    }

    #[test]
    fn tdigest_merge_conserves_count(a in values(), b in values()) {
        let mut left = TDigest::new(100.0).unwrap();
        let mut right = TDigest::new(100.0).unwrap();
        left.add_batch(&a);
        right.add_batch(&b);

        left.merge(&right).unwrap();
        prop_assert_eq!(left.count(), (a.len() + b.len()) as u64);
        let weight: u64 = left.centroids().iter().map(|c| c.weight).sum();
        prop_assert_eq!(weight, left.count());
    }

    #[test]
    fn reservoir_size_is_bounded(n in 0u64..5000, k in 0usize..64, seed in any::<u64>()) {
        let mut sampler = ReservoirSampler::<u64>::with_seed(k, seed);
        for i in 0..n {
            sampler.add(i);
        }

        prop_assert_eq!(sampler.len(), k.min(n as usize));
        prop_assert_eq!(sampler.items_seen(), n);
        prop_assert!(sampler.sample().iter().all(|&x| x < n));
    }

    #[test]
    fn reservoir_merge_is_bounded_and_distinct(n1 in 0u64..2000, n2 in 0u64..2000, k in 1usize..50) {
        let mut a = ReservoirSampler::<u64>::with_seed(k, 1);
        let mut b = ReservoirSampler::<u64>::with_seed(k, 2);
        for i in 0..n1 {
            a.add(i);
        }
        for i in 0..n2 {
            b.add(n1 + i);
        }

        a.merge(&b).unwrap();
        let mut sample = a.get_samples();
        prop_assert_eq!(sample.len(), k.min((n1 + n2) as usize));
        sample.sort_unstable();
        sample.dedup();
        prop_assert_eq!(sample.len(), k.min((n1 + n2) as usize));
        prop_assert_eq!(a.items_seen(), n1 + n2);
    }

    #[test]
    fn stratified_counts_add_up(keys in prop::collection::vec(0u8..8, 0..500)) {
        let mut sampler = StratifiedSampler::<u8, usize>::with_seed(5, 3);
        for (i, &key) in keys.iter().enumerate() {
            sampler.add(key, i).unwrap();
        }

        let total: u64 = sampler.strata().map(|k| sampler.stratum_count(k)).sum();
        prop_assert_eq!(total, keys.len() as u64);
        for key in sampler.strata() {
            let sample = sampler.samples(key);
            prop_assert!(sample.len() <= 5);
            prop_assert!(sample.iter().all(|&i| keys[i] == *key));
        }
    }
}
