//! Example: robust line fitting with LO-MSAC.
//!
//! Generates points on a known line, contaminates them with gross outliers,
//! and recovers the line.

use lomsac::{LineEstimator, LoRansacOptions, LocallyOptimizedMsac};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn main() {
    let n_inliers = 60;
    let n_outliers = 25;

    let true_slope = 2.0;
    let true_intercept = 1.0;
    println!("True line: y = {true_slope:.2}x + {true_intercept:.2}");
    println!("Generating {n_inliers} inliers and {n_outliers} outliers");

    let mut rng = StdRng::seed_from_u64(0);
    let mut points = Vec::with_capacity(n_inliers + n_outliers);

    for i in 0..n_inliers {
        let x = (i as f64) * 0.2 - 6.0;
        let y = true_slope * x + true_intercept + rng.gen_range(-0.05..0.05);
        points.push([x, y]);
    }
    for _ in 0..n_outliers {
        points.push([rng.gen_range(-10.0..10.0), rng.gen_range(-20.0..20.0)]);
    }

    let mut options = LoRansacOptions::default();
    options.ransac.squared_inlier_threshold = 0.01; // 0.1 units of distance

    let solver = LineEstimator::from_points(&points);
    let ransac = LocallyOptimizedMsac::new(options).expect("default options are valid");
    let (line, stats) = ransac.estimate_model(&solver);

    if stats.best_num_inliers == 0 {
        println!("No model found");
        return;
    }

    println!("\nEstimation results:");
    match line.slope_intercept() {
        Some((slope, intercept)) => {
            println!("  line: y = {slope:.4}x + {intercept:.4}");
        }
        None => println!("  line is vertical: x = {:.4}", -line.params.z / line.params.x),
    }
    println!("  inliers: {} / {}", stats.best_num_inliers, points.len());
    println!("  inlier ratio: {:.3}", stats.inlier_ratio);
    println!("  MSAC score: {:.6}", stats.best_model_score);
    println!("  iterations: {}", stats.num_iterations);
}
