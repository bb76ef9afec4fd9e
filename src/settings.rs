//! Configuration for the LO-MSAC estimation loop.
//!
//! `RansacOptions` carries the parameters of the plain sampling loop, while
//! `LoRansacOptions` adds the local-optimization knobs from Lebeda et al.,
//! "Fixing the Locally Optimized RANSAC" (BMVC 2012), Table 1. Defaults are
//! part of the reproducibility contract: two builds with the same options,
//! seed, and solver must produce identical results.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Violation of a documented option range.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptionsError {
    #[error("min_num_iterations must be at least 1")]
    MinIterations,
    #[error("max_num_iterations ({max}) must be at least min_num_iterations ({min})")]
    IterationBounds { min: u32, max: u32 },
    #[error("success_probability must lie strictly inside (0, 1), got {0}")]
    SuccessProbability(f64),
    #[error("squared_inlier_threshold must be positive, got {0}")]
    InlierThreshold(f64),
    #[error("threshold_multiplier must be at least 1, got {0}")]
    ThresholdMultiplier(f64),
    #[error("num_lsq_iterations must be at least 2, got {0}")]
    LsqIterations(usize),
    #[error("min_sample_multiplicator must be at least 1, got {0}")]
    SampleMultiplicator(usize),
    #[error("non_min_sample_multiplier must be at least 1, got {0}")]
    NonMinSampleMultiplier(usize),
}

/// Parameters of the outer hypothesize-and-test loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RansacOptions {
    /// Lower bound on the number of sampling iterations, even when the
    /// adaptive budget would allow stopping earlier.
    pub min_num_iterations: u32,
    /// Hard cap on the number of sampling iterations.
    pub max_num_iterations: u32,
    /// Target probability that at least one all-inlier minimal sample is
    /// drawn. The adaptive budget misses the best model with probability at
    /// most `1 - success_probability`.
    pub success_probability: f64,
    /// Squared inlier threshold in the solver's residual domain. A point is
    /// an inlier iff its squared residual is strictly below this value.
    pub squared_inlier_threshold: f64,
    /// Seed for both the sampler stream and the local-optimization stream.
    pub random_seed: u64,
}

impl Default for RansacOptions {
    fn default() -> Self {
        Self {
            min_num_iterations: 100,
            max_num_iterations: 10_000,
            success_probability: 0.9999,
            squared_inlier_threshold: 1.0,
            random_seed: 0,
        }
    }
}

impl RansacOptions {
    /// Check the documented ranges.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.min_num_iterations < 1 {
            return Err(OptionsError::MinIterations);
        }
        if self.max_num_iterations < self.min_num_iterations {
            return Err(OptionsError::IterationBounds {
                min: self.min_num_iterations,
                max: self.max_num_iterations,
            });
        }
        if !(self.success_probability > 0.0 && self.success_probability < 1.0) {
            return Err(OptionsError::SuccessProbability(self.success_probability));
        }
        if !(self.squared_inlier_threshold > 0.0) {
            return Err(OptionsError::InlierThreshold(self.squared_inlier_threshold));
        }
        Ok(())
    }
}

/// Parameters of the local-optimization procedure, on top of the plain loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoRansacOptions {
    pub ransac: RansacOptions,
    /// Number of non-minimal resampling steps per local optimization.
    pub num_lo_steps: usize,
    /// The annealed threshold starts at `threshold_multiplier` times the
    /// inlier threshold and shrinks back to it over the IRLS passes.
    pub threshold_multiplier: f64,
    /// Number of IRLS passes per LO step. The annealing schedule divides by
    /// `num_lsq_iterations - 1`, hence the lower bound of 2.
    pub num_lsq_iterations: usize,
    /// Least-squares refinement uses at most
    /// `min_sample_multiplicator * min_sample_size` data points. Lebeda et
    /// al. recommend 7, determined empirically for epipolar geometry.
    pub min_sample_multiplicator: usize,
    /// Non-minimal samples have size at most
    /// `non_minimal_sample_size * non_min_sample_multiplier`, capped at half
    /// the current inlier count.
    pub non_min_sample_multiplier: usize,
}

impl Default for LoRansacOptions {
    fn default() -> Self {
        Self {
            ransac: RansacOptions::default(),
            num_lo_steps: 10,
            threshold_multiplier: std::f64::consts::SQRT_2,
            num_lsq_iterations: 4,
            min_sample_multiplicator: 7,
            non_min_sample_multiplier: 3,
        }
    }
}

impl LoRansacOptions {
    /// Check the documented ranges, including the nested `RansacOptions`.
    pub fn validate(&self) -> Result<(), OptionsError> {
        self.ransac.validate()?;
        if !(self.threshold_multiplier >= 1.0) {
            return Err(OptionsError::ThresholdMultiplier(self.threshold_multiplier));
        }
        if self.num_lsq_iterations < 2 {
            return Err(OptionsError::LsqIterations(self.num_lsq_iterations));
        }
        if self.min_sample_multiplicator < 1 {
            return Err(OptionsError::SampleMultiplicator(
                self.min_sample_multiplicator,
            ));
        }
        if self.non_min_sample_multiplier < 1 {
            return Err(OptionsError::NonMinSampleMultiplier(
                self.non_min_sample_multiplier,
            ));
        }
        Ok(())
    }
}
