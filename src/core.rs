//! The LO-MSAC estimation loop.
//!
//! The driver is generic over a [`Solver`] that owns the data and knows how
//! to hypothesize models from minimal samples, optionally refine them from
//! non-minimal samples, and evaluate residuals. The loop itself implements
//! locally optimized RANSAC with MSAC (top-hat) scoring after Lebeda, Matas,
//! Chum, "Fixing the Locally Optimized RANSAC" (BMVC 2012): uniform random
//! sampling with an adaptive iteration budget, and an inner refinement
//! (non-minimal resampling interleaved with iteratively reweighted least
//! squares under an annealed threshold) each time a new best minimal model
//! is found.

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::samplers::UniformSampler;
use crate::settings::{LoRansacOptions, OptionsError};
use crate::utils::random_shuffle_and_resize;

/// Problem-specific collaborator: owns the data and the model arithmetic.
///
/// The estimation driver is polymorphic over this capability set and nothing
/// else. `non_minimal_solver` and `least_squares` are optional in the sense
/// that a dummy implementation (returning `false` / leaving the model
/// untouched) is sufficient; local optimization then degrades gracefully.
pub trait Solver {
    /// Model type hypothesized by this solver.
    type Model: Clone + Default;

    /// Smallest number of data points the minimal solver needs.
    fn min_sample_size(&self) -> usize;

    /// Smallest number of data points the non-minimal solver needs. For
    /// example, pose estimation for a calibrated camera has a minimal sample
    /// of size 3 and a smallest non-minimal sample of size 4. Must return a
    /// valid value even when `non_minimal_solver` is a dummy.
    fn non_minimal_sample_size(&self) -> usize;

    /// Total number of data points.
    fn num_data(&self) -> usize;

    /// Estimate candidate models from a minimal sample, appending them to
    /// `models` (cleared by the caller) and returning how many were added.
    /// Returning 0 signals a degenerate sample; the driver skips the
    /// iteration.
    fn minimal_solver(&self, sample: &[usize], models: &mut Vec<Self::Model>) -> usize;

    /// Estimate a single model from a non-minimal sample. Returning `false`
    /// skips the current local-optimization step.
    fn non_minimal_solver(&self, sample: &[usize], model: &mut Self::Model) -> bool;

    /// Refine `model` in place against the given index set. May be a no-op.
    fn least_squares(&self, inliers: &[usize], model: &mut Self::Model);

    /// Squared residual of point `index` under `model`. Must be
    /// deterministic and side-effect-free.
    fn evaluate_model_on_point(&self, model: &Self::Model, index: usize) -> f64;
}

/// Diagnostics populated by one estimation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RansacStatistics {
    /// Number of outer sampling iterations executed.
    pub num_iterations: u32,
    /// Inlier count of the best model.
    pub best_num_inliers: usize,
    /// MSAC score of the best model; lower is better, `f64::INFINITY` when
    /// no model ever improved on the initial state.
    pub best_model_score: f64,
    /// `best_num_inliers / num_data`.
    pub inlier_ratio: f64,
    /// Indices of the inliers of the best model, ascending.
    pub inlier_indices: Vec<usize>,
}

impl Default for RansacStatistics {
    fn default() -> Self {
        Self {
            num_iterations: 0,
            best_num_inliers: 0,
            best_model_score: f64::INFINITY,
            inlier_ratio: 0.0,
            inlier_indices: Vec::new(),
        }
    }
}

/// Number of sampling iterations needed to miss an all-inlier minimal sample
/// with probability at most `prob_missing_best_model`, given the observed
/// `inlier_ratio` and the minimal `sample_size`, clamped to
/// `[min_iterations, max_iterations]`.
///
/// The `+0.5` bias slightly inflates the budget to compensate for samples
/// not being independent. Assumes `min_iterations <= max_iterations`.
pub fn num_required_iterations(
    inlier_ratio: f64,
    prob_missing_best_model: f64,
    sample_size: usize,
    min_iterations: u32,
    max_iterations: u32,
) -> u32 {
    if inlier_ratio <= 0.0 {
        return max_iterations;
    }
    if inlier_ratio >= 1.0 {
        return min_iterations;
    }

    let prob_non_inlier_sample = 1.0 - inlier_ratio.powi(sample_size as i32);
    let num_iters = (prob_missing_best_model.ln() / prob_non_inlier_sample.ln() + 0.5).ceil();

    // Float-to-int casts saturate, so an overflowing estimate clamps to the
    // maximum rather than wrapping.
    (num_iters as u32).clamp(min_iterations, max_iterations)
}

/// MSAC (top-hat) per-point contribution: the squared error saturated at the
/// squared threshold.
#[inline]
pub fn msac_score(squared_error: f64, squared_error_threshold: f64) -> f64 {
    squared_error.min(squared_error_threshold)
}

/// Sum of MSAC contributions over all data points. Lower is better.
fn score_model<S: Solver>(solver: &S, model: &S::Model, squared_inlier_threshold: f64) -> f64 {
    let mut score = 0.0;
    for i in 0..solver.num_data() {
        let squared_error = solver.evaluate_model_on_point(model, i);
        score += msac_score(squared_error, squared_inlier_threshold);
    }
    score
}

/// Collect the indices whose squared residual is strictly below the
/// threshold, ascending. Returns the inlier count.
fn get_inliers<S: Solver>(
    solver: &S,
    model: &S::Model,
    squared_inlier_threshold: f64,
    inliers: &mut Vec<usize>,
) -> usize {
    inliers.clear();
    for i in 0..solver.num_data() {
        if solver.evaluate_model_on_point(model, i) < squared_inlier_threshold {
            inliers.push(i);
        }
    }
    inliers.len()
}

#[inline]
fn update_best_model<M: Clone>(
    score_current: f64,
    model_current: &M,
    score_best: &mut f64,
    model_best: &mut M,
) {
    // Strict comparison: ties keep the incumbent.
    if score_current < *score_best {
        *score_best = score_current;
        *model_best = model_current.clone();
    }
}

/// LO-MSAC estimation driver.
///
/// Construction validates the option ranges once; a driver can then run any
/// number of independent estimations. Runs are deterministic: identical
/// options, seed, and solver produce identical models and statistics.
pub struct LocallyOptimizedMsac {
    options: LoRansacOptions,
}

impl LocallyOptimizedMsac {
    pub fn new(options: LoRansacOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Self { options })
    }

    pub fn options(&self) -> &LoRansacOptions {
        &self.options
    }

    /// Estimate a model robustly from the solver's data.
    ///
    /// Returns the best model together with the run's statistics. When no
    /// model ever improved on the initial state (e.g. every sample was
    /// degenerate, or there are fewer data points than the minimal sample
    /// size), the returned model is default-constructed and
    /// `statistics.best_num_inliers` is 0; callers must gate on a positive
    /// inlier count before trusting the model.
    pub fn estimate_model<S: Solver>(&self, solver: &S) -> (S::Model, RansacStatistics) {
        let mut stats = RansacStatistics::default();
        let mut best_model = S::Model::default();

        let min_sample_size = solver.min_sample_size();
        let num_data = solver.num_data();
        // Not an error: too little data is an expected precondition failure
        // reported through zeroed statistics.
        if min_sample_size > num_data || min_sample_size == 0 {
            return (best_model, stats);
        }

        let opts = &self.options.ransac;
        let squared_inlier_threshold = opts.squared_inlier_threshold;

        let mut sampler = UniformSampler::new(opts.random_seed, num_data, min_sample_size);
        let mut max_num_iterations = opts.max_num_iterations.max(opts.min_num_iterations);

        let mut best_minimal_model_score = f64::INFINITY;
        let mut minimal_sample: Vec<usize> = Vec::with_capacity(min_sample_size);
        let mut estimated_models: Vec<S::Model> = Vec::new();

        while stats.num_iterations < max_num_iterations {
            stats.num_iterations += 1;

            sampler.sample(&mut minimal_sample);

            estimated_models.clear();
            if solver.minimal_solver(&minimal_sample, &mut estimated_models) == 0 {
                continue;
            }

            let (best_local_score, best_local_id) =
                best_estimated_model(solver, &estimated_models, squared_inlier_threshold);

            if best_local_score < best_minimal_model_score {
                best_minimal_model_score = best_local_score;
                let best_minimal_model = estimated_models[best_local_id].clone();

                // Local optimization returns the best model among the input
                // and everything it scored, so the refined score never
                // exceeds best_minimal_model_score.
                let (refined_model, refined_score) =
                    self.local_optimization(solver, &best_minimal_model, best_minimal_model_score);

                if refined_score < stats.best_model_score {
                    stats.best_model_score = refined_score;
                    best_model = refined_model;

                    stats.best_num_inliers = get_inliers(
                        solver,
                        &best_model,
                        squared_inlier_threshold,
                        &mut stats.inlier_indices,
                    );
                    stats.inlier_ratio = stats.best_num_inliers as f64 / num_data as f64;
                    max_num_iterations = num_required_iterations(
                        stats.inlier_ratio,
                        1.0 - opts.success_probability,
                        min_sample_size,
                        opts.min_num_iterations,
                        opts.max_num_iterations,
                    );
                    debug!(
                        "iteration {}: new best model, score {:.6e}, {} inliers, budget {}",
                        stats.num_iterations,
                        stats.best_model_score,
                        stats.best_num_inliers,
                        max_num_iterations
                    );
                }
            }
        }

        (best_model, stats)
    }

    /// Refine a freshly promoted minimal model (algorithms 2 and 3 in Lebeda
    /// et al.). The input model is itself a candidate, so the returned score
    /// is never worse than `best_minimal_score`.
    fn local_optimization<S: Solver>(
        &self,
        solver: &S,
        best_minimal_model: &S::Model,
        best_minimal_score: f64,
    ) -> (S::Model, f64) {
        let mut refined_model = best_minimal_model.clone();
        let mut refined_score = best_minimal_score;

        let num_data = solver.num_data();
        let min_non_min_sample_size = solver.non_minimal_sample_size();
        if min_non_min_sample_size > num_data {
            return (refined_model, refined_score);
        }

        let squared_inlier_threshold = self.options.ransac.squared_inlier_threshold;
        let threshold_multiplier = self.options.threshold_multiplier;

        // Separate RNG stream from the outer sampler: re-seeded here so that
        // local optimization never perturbs the outer sampling sequence.
        let mut rng = StdRng::seed_from_u64(self.options.ransac.random_seed);

        // Initial least-squares fit under a relaxed threshold; its inliers
        // under the strict threshold become the resampling pool.
        let mut initial_model = best_minimal_model.clone();
        self.least_squares_fit(
            solver,
            squared_inlier_threshold * threshold_multiplier,
            &mut rng,
            &mut initial_model,
        );

        let mut score = score_model(solver, &initial_model, squared_inlier_threshold);
        update_best_model(score, &initial_model, &mut refined_score, &mut refined_model);

        let mut inliers_base = Vec::new();
        get_inliers(
            solver,
            &initial_model,
            squared_inlier_threshold,
            &mut inliers_base,
        );

        // Capping the non-minimal sample at half the inlier pool avoids
        // fitting the entire pool on the first step.
        let non_min_sample_size = min_non_min_sample_size.max(
            (min_non_min_sample_size * self.options.non_min_sample_multiplier)
                .min(inliers_base.len() / 2),
        );

        trace!(
            "local optimization: {} base inliers, non-minimal sample size {}",
            inliers_base.len(),
            non_min_sample_size
        );

        let mut sample = Vec::new();
        for _ in 0..self.options.num_lo_steps {
            sample.clone_from(&inliers_base);
            random_shuffle_and_resize(non_min_sample_size, &mut rng, &mut sample);

            let mut model = S::Model::default();
            if !solver.non_minimal_solver(&sample, &mut model) {
                continue;
            }

            score = score_model(solver, &model, squared_inlier_threshold);
            update_best_model(score, &model, &mut refined_score, &mut refined_model);

            self.least_squares_fit(solver, squared_inlier_threshold, &mut rng, &mut model);

            // Iteratively reweighted least squares: anneal the fitting
            // threshold from the relaxed value back down to the inlier
            // threshold, so the final pass is calibrated to the caller's
            // inlier criterion.
            let mut threshold = threshold_multiplier * squared_inlier_threshold;
            let threshold_update = (threshold_multiplier - 1.0) * squared_inlier_threshold
                / (self.options.num_lsq_iterations - 1) as f64;
            for _ in 0..self.options.num_lsq_iterations {
                self.least_squares_fit(solver, threshold, &mut rng, &mut model);

                score = score_model(solver, &model, squared_inlier_threshold);
                update_best_model(score, &model, &mut refined_score, &mut refined_model);
                threshold -= threshold_update;
            }
        }

        (refined_model, refined_score)
    }

    /// One least-squares refinement pass: collect the model's inliers under
    /// `threshold`, draw a bounded random subset, and hand it to the solver.
    fn least_squares_fit<S: Solver>(
        &self,
        solver: &S,
        threshold: f64,
        rng: &mut StdRng,
        model: &mut S::Model,
    ) {
        let lsq_sample_size = self.options.min_sample_multiplicator * solver.min_sample_size();

        let mut inliers = Vec::new();
        let num_inliers = get_inliers(solver, model, threshold, &mut inliers);
        let lsq_data_size = lsq_sample_size.min(num_inliers);
        random_shuffle_and_resize(lsq_data_size, rng, &mut inliers);
        solver.least_squares(&inliers, model);
    }
}

/// Score every candidate and return `(best_score, best_index)`; ties keep
/// the earliest candidate.
fn best_estimated_model<S: Solver>(
    solver: &S,
    models: &[S::Model],
    squared_inlier_threshold: f64,
) -> (f64, usize) {
    let mut best_score = f64::INFINITY;
    let mut best_id = 0;
    for (id, model) in models.iter().enumerate() {
        let score = score_model(solver, model, squared_inlier_threshold);
        if score < best_score {
            best_score = score;
            best_id = id;
        }
    }
    (best_score, best_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{LoRansacOptions, RansacOptions};

    fn options(min_iters: u32, max_iters: u32, squared_threshold: f64) -> LoRansacOptions {
        LoRansacOptions {
            ransac: RansacOptions {
                min_num_iterations: min_iters,
                max_num_iterations: max_iters,
                squared_inlier_threshold: squared_threshold,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Scalar location fixture: the model is a single value, a minimal
    /// sample is one point, and the residual is the squared difference.
    struct MeanSolver {
        data: Vec<f64>,
    }

    impl Solver for MeanSolver {
        type Model = f64;

        fn min_sample_size(&self) -> usize {
            1
        }

        fn non_minimal_sample_size(&self) -> usize {
            2
        }

        fn num_data(&self) -> usize {
            self.data.len()
        }

        fn minimal_solver(&self, sample: &[usize], models: &mut Vec<f64>) -> usize {
            models.push(self.data[sample[0]]);
            1
        }

        fn non_minimal_solver(&self, sample: &[usize], model: &mut f64) -> bool {
            if sample.len() < 2 {
                return false;
            }
            *model = sample.iter().map(|&i| self.data[i]).sum::<f64>() / sample.len() as f64;
            true
        }

        fn least_squares(&self, inliers: &[usize], model: &mut f64) {
            if !inliers.is_empty() {
                *model = inliers.iter().map(|&i| self.data[i]).sum::<f64>() / inliers.len() as f64;
            }
        }

        fn evaluate_model_on_point(&self, model: &f64, index: usize) -> f64 {
            let d = self.data[index] - model;
            d * d
        }
    }

    /// Solver whose minimal solver never produces a model.
    struct DegenerateSolver {
        num_data: usize,
    }

    impl Solver for DegenerateSolver {
        type Model = f64;

        fn min_sample_size(&self) -> usize {
            2
        }

        fn non_minimal_sample_size(&self) -> usize {
            3
        }

        fn num_data(&self) -> usize {
            self.num_data
        }

        fn minimal_solver(&self, _sample: &[usize], _models: &mut Vec<f64>) -> usize {
            0
        }

        fn non_minimal_solver(&self, _sample: &[usize], _model: &mut f64) -> bool {
            false
        }

        fn least_squares(&self, _inliers: &[usize], _model: &mut f64) {}

        fn evaluate_model_on_point(&self, _model: &f64, _index: usize) -> f64 {
            f64::INFINITY
        }
    }

    /// MeanSolver wrapper whose non-minimal solver always proposes a wildly
    /// wrong model and whose least squares is a no-op.
    struct SabotagedSolver {
        inner: MeanSolver,
    }

    impl Solver for SabotagedSolver {
        type Model = f64;

        fn min_sample_size(&self) -> usize {
            self.inner.min_sample_size()
        }

        fn non_minimal_sample_size(&self) -> usize {
            self.inner.non_minimal_sample_size()
        }

        fn num_data(&self) -> usize {
            self.inner.num_data()
        }

        fn minimal_solver(&self, sample: &[usize], models: &mut Vec<f64>) -> usize {
            self.inner.minimal_solver(sample, models)
        }

        fn non_minimal_solver(&self, _sample: &[usize], model: &mut f64) -> bool {
            *model = 1e12;
            true
        }

        fn least_squares(&self, _inliers: &[usize], _model: &mut f64) {}

        fn evaluate_model_on_point(&self, model: &f64, index: usize) -> f64 {
            self.inner.evaluate_model_on_point(model, index)
        }
    }

    #[test]
    fn required_iterations_boundaries() {
        assert_eq!(num_required_iterations(0.0, 0.0001, 4, 100, 10_000), 10_000);
        assert_eq!(num_required_iterations(-1.0, 0.0001, 4, 100, 10_000), 10_000);
        assert_eq!(num_required_iterations(1.0, 0.0001, 4, 100, 10_000), 100);
        assert_eq!(num_required_iterations(1.5, 0.0001, 4, 100, 10_000), 100);
    }

    #[test]
    fn required_iterations_matches_formula() {
        let eps: f64 = 0.5;
        let eta: f64 = 0.0001;
        let s: usize = 4;
        let expected = (eta.ln() / (1.0 - eps.powi(s as i32)).ln() + 0.5).ceil() as u32;
        assert_eq!(
            num_required_iterations(eps, eta, s, 1, u32::MAX),
            expected
        );
        // The formula value sits inside the usual clamp range.
        assert_eq!(num_required_iterations(eps, eta, s, 100, 10_000), expected);
    }

    #[test]
    fn required_iterations_clamps_to_bounds() {
        // Tiny inlier ratio: the estimate far exceeds the cap.
        assert_eq!(num_required_iterations(0.01, 0.0001, 4, 100, 10_000), 10_000);
        // Near-perfect ratio: the estimate falls below the floor.
        assert_eq!(num_required_iterations(0.999, 0.0001, 1, 100, 10_000), 100);
    }

    #[test]
    fn required_iterations_decreases_with_inlier_ratio() {
        let mut last = u32::MAX;
        for ratio in [0.2, 0.4, 0.6, 0.8, 0.95] {
            let n = num_required_iterations(ratio, 0.0001, 3, 1, u32::MAX);
            assert!(n <= last, "budget must not grow with the inlier ratio");
            last = n;
        }
    }

    #[test]
    fn msac_score_saturates() {
        assert_eq!(msac_score(0.25, 1.0), 0.25);
        assert_eq!(msac_score(4.0, 1.0), 1.0);
        assert_eq!(msac_score(1.0, 1.0), 1.0);
    }

    #[test]
    fn insufficient_data_is_a_no_op() {
        let ransac = LocallyOptimizedMsac::new(options(10, 100, 0.01)).unwrap();
        let solver = MeanSolver { data: vec![1.0] };

        // min_sample_size is 1, so shrink the data below it instead.
        let empty = MeanSolver { data: Vec::new() };
        let (_, stats) = ransac.estimate_model(&empty);
        assert_eq!(stats.num_iterations, 0);
        assert_eq!(stats.best_num_inliers, 0);
        assert_eq!(stats.best_model_score, f64::INFINITY);
        assert!(stats.inlier_indices.is_empty());

        // One point suffices for a one-point minimal sample.
        let (model, stats) = ransac.estimate_model(&solver);
        assert_eq!(stats.best_num_inliers, 1);
        assert_eq!(model, 1.0);
    }

    #[test]
    fn degenerate_solver_exhausts_the_budget() {
        let ransac = LocallyOptimizedMsac::new(options(10, 50, 1.0)).unwrap();
        let solver = DegenerateSolver { num_data: 20 };

        let (_, stats) = ransac.estimate_model(&solver);
        assert_eq!(stats.num_iterations, 50);
        assert_eq!(stats.best_num_inliers, 0);
        assert_eq!(stats.best_model_score, f64::INFINITY);
        assert_eq!(stats.inlier_ratio, 0.0);
        assert!(stats.inlier_indices.is_empty());
    }

    #[test]
    fn perfect_data_stops_at_the_minimum_budget() {
        let ransac = LocallyOptimizedMsac::new(options(100, 10_000, 0.01)).unwrap();
        let solver = MeanSolver {
            data: vec![3.0; 50],
        };

        let (model, stats) = ransac.estimate_model(&solver);
        assert_eq!(stats.num_iterations, 100);
        assert_eq!(stats.best_num_inliers, 50);
        assert_eq!(stats.inlier_ratio, 1.0);
        assert_eq!(stats.best_model_score, 0.0);
        assert_eq!(model, 3.0);
        assert_eq!(stats.inlier_indices, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn local_optimization_never_worsens_the_input() {
        let mut data = vec![5.0; 30];
        data.extend([100.0, -40.0, 72.5, 8.0e3]);

        let ransac = LocallyOptimizedMsac::new(options(10, 100, 0.25)).unwrap();

        let good = MeanSolver { data: data.clone() };
        let input_score = score_model(&good, &5.0, 0.25);
        let (_, refined_score) = ransac.local_optimization(&good, &5.0, input_score);
        assert!(refined_score <= input_score);

        // Even a solver that actively proposes bad refinements cannot make
        // the result worse than the input model.
        let bad = SabotagedSolver {
            inner: MeanSolver { data },
        };
        let (refined_model, refined_score) = ransac.local_optimization(&bad, &5.0, input_score);
        assert_eq!(refined_score, input_score);
        assert_eq!(refined_model, 5.0);
    }

    #[test]
    fn estimation_is_deterministic() {
        let mut data: Vec<f64> = (0..40).map(|i| 2.0 + 0.001 * i as f64).collect();
        data.extend((0..10).map(|i| 50.0 + 3.0 * i as f64));

        let ransac = LocallyOptimizedMsac::new(options(50, 500, 0.01)).unwrap();
        let solver = MeanSolver { data };

        let (model_a, stats_a) = ransac.estimate_model(&solver);
        let (model_b, stats_b) = ransac.estimate_model(&solver);

        assert_eq!(model_a.to_bits(), model_b.to_bits());
        assert_eq!(stats_a, stats_b);
    }

    #[test]
    fn inliers_agree_with_the_returned_model() {
        let mut data: Vec<f64> = (0..30).map(|i| 1.0 + 0.002 * i as f64).collect();
        data.extend([20.0, -33.0, 47.0]);

        let ransac = LocallyOptimizedMsac::new(options(50, 500, 0.01)).unwrap();
        let solver = MeanSolver { data };
        let (model, stats) = ransac.estimate_model(&solver);

        let threshold = ransac.options().ransac.squared_inlier_threshold;
        let recomputed: Vec<usize> = (0..solver.num_data())
            .filter(|&i| solver.evaluate_model_on_point(&model, i) < threshold)
            .collect();

        assert_eq!(stats.inlier_indices, recomputed);
        assert_eq!(stats.best_num_inliers, recomputed.len());
        assert!(
            (stats.inlier_ratio - recomputed.len() as f64 / solver.num_data() as f64).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn iteration_count_stays_within_bounds() {
        let mut data: Vec<f64> = vec![4.0; 20];
        data.extend([0.0, 90.0, -12.0, 55.0, 31.0]);

        let ransac = LocallyOptimizedMsac::new(options(30, 200, 0.04)).unwrap();
        let solver = MeanSolver { data };
        let (_, stats) = ransac.estimate_model(&solver);

        assert!(stats.num_iterations >= 30);
        assert!(stats.num_iterations <= 200);
    }

    #[test]
    fn rejects_invalid_options() {
        let mut opts = LoRansacOptions::default();
        opts.num_lsq_iterations = 1;
        assert!(LocallyOptimizedMsac::new(opts).is_err());
    }
}
