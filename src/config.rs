//! Construction parameters for every sketch family
//!
//! Plain structs with defaults, so an orchestration layer can deserialize
//! them (feature `serde`) and build sketches from them. The library itself
//! reads no files or environment variables.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[cfg(feature = "cardinality")]
use crate::cardinality::HyperLogLog;
#[cfg(feature = "frequency")]
use crate::frequency::{CountMinSketch, TopKCountMin};
#[cfg(feature = "quantiles")]
use crate::quantiles::TDigest;
#[cfg(feature = "sampling")]
use crate::sampling::ReservoirSampler;

/// t-digest parameters
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QuantileConfig {
    /// Accuracy/size trade-off; larger keeps more centroids
    pub compression: f64,
    /// Values buffered before a compression pass; `2 * compression` when unset
    pub buffer_size: Option<usize>,
}

impl Default for QuantileConfig {
    fn default() -> Self {
        Self {
            compression: 100.0,
            buffer_size: None,
        }
    }
}

impl QuantileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.compression.is_finite() || self.compression <= 0.0 {
            return Err(ConfigError::InvalidCompression(self.compression));
        }
        Ok(())
    }

    #[cfg(feature = "quantiles")]
    pub fn build(&self) -> Result<TDigest, ConfigError> {
        match self.buffer_size {
            Some(buffer) => TDigest::with_buffer_size(self.compression, buffer),
            None => TDigest::new(self.compression),
        }
    }
}

/// Count-Min Sketch parameters
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrequencyConfig {
    pub width: usize,
    pub depth: usize,
    /// Hash seed; sketches only merge when their seeds match
    pub seed: u64,
    /// Keys tracked by [`build_with_top_k`](Self::build_with_top_k)
    pub top_k: Option<usize>,
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            depth: 5,
            seed: 0,
            top_k: None,
        }
    }
}

impl FrequencyConfig {
    /// Tracker size used when `top_k` is unset
    pub const DEFAULT_TOP_K: usize = 100;

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 {
            return Err(ConfigError::ZeroWidth);
        }
        if self.depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        if self.top_k == Some(0) {
            return Err(ConfigError::ZeroTopK);
        }
        Ok(())
    }

    #[cfg(feature = "frequency")]
    pub fn build(&self) -> Result<CountMinSketch, ConfigError> {
        CountMinSketch::new(self.width, self.depth, self.seed)
    }

    #[cfg(feature = "frequency")]
    pub fn build_with_top_k(&self) -> Result<TopKCountMin, ConfigError> {
        TopKCountMin::new(
            self.width,
            self.depth,
            self.seed,
            self.top_k.unwrap_or(Self::DEFAULT_TOP_K),
        )
    }
}

/// HyperLogLog parameters
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CardinalityConfig {
    /// Register count is `2^precision`, between 4 and 16
    pub precision: u8,
}

impl Default for CardinalityConfig {
    fn default() -> Self {
        Self { precision: 12 }
    }
}

impl CardinalityConfig {
    const PRECISION_RANGE: (u8, u8) = (4, 16);

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = Self::PRECISION_RANGE;
        if !(min..=max).contains(&self.precision) {
            return Err(ConfigError::PrecisionOutOfRange {
                precision: self.precision,
                min,
                max,
            });
        }
        Ok(())
    }

    #[cfg(feature = "cardinality")]
    pub fn build(&self) -> Result<HyperLogLog, ConfigError> {
        HyperLogLog::new(self.precision)
    }
}

/// Reservoir sampler parameters
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReservoirConfig {
    pub max_size: usize,
    /// Fixed seed for reproducible samples; system entropy when unset
    pub seed: Option<u64>,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            seed: None,
        }
    }
}

impl ReservoirConfig {
    #[cfg(feature = "sampling")]
    pub fn build<T>(&self) -> ReservoirSampler<T> {
        match self.seed {
            Some(seed) => ReservoirSampler::with_seed(self.max_size, seed),
            None => ReservoirSampler::new(self.max_size),
        }
    }
}

/// Parameters for every sketch a pipeline owns
///
/// ```
/// use streamstats::config::SketchConfig;
///
/// let mut config = SketchConfig::default();
/// config.cardinality.precision = 14;
/// assert!(config.validate().is_ok());
///
/// config.frequency.width = 0;
/// assert!(config.validate().is_err());
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SketchConfig {
    pub quantile: QuantileConfig,
    pub frequency: FrequencyConfig,
    pub cardinality: CardinalityConfig,
    pub reservoir: ReservoirConfig,
}

impl SketchConfig {
    /// Check every parameter without allocating any sketch
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quantile.validate()?;
        self.frequency.validate()?;
        self.cardinality.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SketchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quantile.compression, 100.0);
        assert_eq!(config.frequency.width, 2000);
        assert_eq!(config.frequency.depth, 5);
        assert_eq!(config.cardinality.precision, 12);
        assert_eq!(config.reservoir.max_size, 1000);
    }

    #[test]
    fn test_validate_reports_first_problem() {
        let mut config = SketchConfig::default();
        config.quantile.compression = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCompression(_))
        ));

        let mut config = SketchConfig::default();
        config.cardinality.precision = 20;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PrecisionOutOfRange {
                precision: 20,
                min: 4,
                max: 16
            })
        );

        let mut config = SketchConfig::default();
        config.frequency.top_k = Some(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroTopK));
    }

    #[cfg(feature = "quantiles")]
    #[test]
    fn test_build_tdigest() {
        let digest = QuantileConfig {
            compression: 50.0,
            buffer_size: Some(10),
        }
        .build()
        .unwrap();
        assert_eq!(digest.compression(), 50.0);
        assert_eq!(digest.buffer_size(), 10);

        assert!(QuantileConfig {
            compression: -1.0,
            buffer_size: None
        }
        .build()
        .is_err());
    }

    #[cfg(feature = "frequency")]
    #[test]
    fn test_build_frequency() {
        let config = FrequencyConfig {
            top_k: Some(7),
            ..Default::default()
        };
        let sketch = config.build().unwrap();
        assert_eq!(sketch.width(), 2000);
        assert_eq!(config.build_with_top_k().unwrap().capacity(), 7);

        let unset = FrequencyConfig::default().build_with_top_k().unwrap();
        assert_eq!(unset.capacity(), FrequencyConfig::DEFAULT_TOP_K);
    }

    #[cfg(feature = "cardinality")]
    #[test]
    fn test_build_cardinality() {
        let hll = CardinalityConfig { precision: 10 }.build().unwrap();
        assert_eq!(hll.num_registers(), 1024);
    }

    #[cfg(feature = "sampling")]
    #[test]
    fn test_build_reservoir() {
        let config = ReservoirConfig {
            max_size: 3,
            seed: Some(11),
        };
        let mut a = config.build::<u32>();
        let mut b = config.build::<u32>();
        for i in 0..100 {
            a.add(i);
            b.add(i);
        }
        assert_eq!(a.sample(), b.sample());
        assert_eq!(a.capacity(), 3);
    }
}
