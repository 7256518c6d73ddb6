//! Error types shared by every sketch family
//!
//! Construction problems surface as [`ConfigError`], shape mismatches between
//! two summaries as [`MergeError`]. [`SketchError`] covers values refused at
//! the call boundary and wraps the other two.

use thiserror::Error;

/// Invalid construction parameter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// t-digest compression must be finite and positive
    #[error("compression must be finite and positive, got {0}")]
    InvalidCompression(f64),

    /// Count-Min width of zero
    #[error("width must be positive")]
    ZeroWidth,

    /// Count-Min depth of zero
    #[error("depth must be positive")]
    ZeroDepth,

    /// HyperLogLog precision outside the supported range
    #[error("precision must be between {min} and {max}, got {precision}")]
    PrecisionOutOfRange { precision: u8, min: u8, max: u8 },

    /// Relative error target outside (0, 1)
    #[error("error rate must be in (0, 1), got {0}")]
    InvalidErrorRate(f64),

    /// Failure probability outside (0, 1)
    #[error("probability must be in (0, 1), got {0}")]
    InvalidProbability(f64),

    /// Top-K tracker with no slots
    #[error("top-k capacity must be positive")]
    ZeroTopK,
}

/// Error during sketch merge operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MergeError {
    /// Sketches have incompatible configurations
    #[error("incompatible config: expected {expected}, found {found}")]
    IncompatibleConfig { expected: String, found: String },
}

/// Any failure surfaced by a sketch operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SketchError {
    /// NaN offered where a number is required
    #[error("value is NaN")]
    NotANumber,

    /// A stratified sampler is already tracking its maximum number of strata
    #[error("stratum limit of {limit} reached")]
    StratumLimit { limit: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}
