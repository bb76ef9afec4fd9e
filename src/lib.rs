//! Locally optimized RANSAC with MSAC scoring.
//!
//! This crate implements the LO-MSAC estimation loop of Lebeda, Matas, Chum,
//! "Fixing the Locally Optimized RANSAC" (BMVC 2012) as an embeddable
//! primitive: the caller supplies a [`Solver`] that owns the data and the
//! model arithmetic, and [`LocallyOptimizedMsac`] runs hypothesize-and-test
//! sampling with an adaptive iteration budget, refining every new best
//! hypothesis through non-minimal resampling and annealed iteratively
//! reweighted least squares.
//!
//! ```
//! use lomsac::{LineEstimator, LocallyOptimizedMsac, LoRansacOptions};
//!
//! // Points on y = 2x + 1, plus one gross outlier.
//! let mut points: Vec<[f64; 2]> = (0..20)
//!     .map(|i| {
//!         let x = i as f64 * 0.1;
//!         [x, 2.0 * x + 1.0]
//!     })
//!     .collect();
//! points.push([4.0, -30.0]);
//!
//! let mut options = LoRansacOptions::default();
//! options.ransac.squared_inlier_threshold = 0.01;
//!
//! let solver = LineEstimator::from_points(&points);
//! let ransac = LocallyOptimizedMsac::new(options).unwrap();
//! let (line, stats) = ransac.estimate_model(&solver);
//!
//! assert!(stats.best_num_inliers >= 20);
//! let (slope, _) = line.slope_intercept().unwrap();
//! assert!((slope - 2.0).abs() < 1e-6);
//! ```

pub mod core;
pub mod estimators;
pub mod samplers;
pub mod settings;
pub mod utils;

pub use crate::core::{
    msac_score, num_required_iterations, LocallyOptimizedMsac, RansacStatistics, Solver,
};
pub use crate::estimators::{Line, LineEstimator};
pub use crate::samplers::UniformSampler;
pub use crate::settings::{LoRansacOptions, OptionsError, RansacOptions};
