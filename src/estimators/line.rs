//! Robust 2D line fitting: the reference `Solver` implementation.

use nalgebra::{DMatrix, Matrix2, SymmetricEigen, Vector3};

use crate::core::Solver;

/// Line `ax + by + c = 0` with unit normal, so `|ax + by + c|` is the
/// perpendicular distance from `(x, y)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Parameters `[a, b, c]` with `a² + b² = 1`.
    pub params: Vector3<f64>,
}

impl Default for Line {
    fn default() -> Self {
        Self {
            params: Vector3::zeros(),
        }
    }
}

impl Line {
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self {
            params: Vector3::new(a, b, c),
        }
    }

    /// Signed perpendicular distance from `(x, y)`.
    pub fn signed_distance(&self, x: f64, y: f64) -> f64 {
        self.params.x * x + self.params.y * y + self.params.z
    }

    /// `(slope, intercept)` of `y = slope * x + intercept`, or `None` for a
    /// (near-)vertical line.
    pub fn slope_intercept(&self) -> Option<(f64, f64)> {
        let b = self.params.y;
        if b.abs() < 1e-12 {
            return None;
        }
        Some((-self.params.x / b, -self.params.z / b))
    }
}

/// `Solver` for 2D lines over an `N x 2` point matrix.
///
/// The minimal solver joins two points via the homogeneous cross product;
/// the non-minimal and least-squares paths fit in the total-least-squares
/// sense, taking the normal from the eigenvector of the smallest eigenvalue
/// of the centered scatter matrix.
pub struct LineEstimator {
    data: DMatrix<f64>,
}

impl LineEstimator {
    /// Wrap an `N x 2` matrix of points (one `[x, y]` row per point).
    ///
    /// # Panics
    ///
    /// Panics if `points` does not have exactly two columns.
    pub fn new(points: DMatrix<f64>) -> Self {
        assert_eq!(points.ncols(), 2, "line estimator expects an N x 2 matrix");
        Self { data: points }
    }

    /// Convenience constructor from a point slice.
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut data = DMatrix::zeros(points.len(), 2);
        for (i, &[x, y]) in points.iter().enumerate() {
            data[(i, 0)] = x;
            data[(i, 1)] = y;
        }
        Self { data }
    }

    /// Total-least-squares fit over the indexed points. Returns `None` for
    /// fewer than two points.
    fn fit_line(&self, indices: &[usize]) -> Option<Line> {
        if indices.len() < 2 {
            return None;
        }

        let inv_n = 1.0 / indices.len() as f64;
        let mut cx = 0.0;
        let mut cy = 0.0;
        for &idx in indices {
            cx += self.data[(idx, 0)];
            cy += self.data[(idx, 1)];
        }
        cx *= inv_n;
        cy *= inv_n;

        let mut scatter = Matrix2::<f64>::zeros();
        for &idx in indices {
            let dx = self.data[(idx, 0)] - cx;
            let dy = self.data[(idx, 1)] - cy;
            scatter[(0, 0)] += dx * dx;
            scatter[(0, 1)] += dx * dy;
            scatter[(1, 1)] += dy * dy;
        }
        scatter[(1, 0)] = scatter[(0, 1)];

        let eigen = SymmetricEigen::new(scatter);
        let smallest = if eigen.eigenvalues[0] <= eigen.eigenvalues[1] {
            0
        } else {
            1
        };
        let normal = eigen.eigenvectors.column(smallest);

        let norm = (normal[0] * normal[0] + normal[1] * normal[1]).sqrt();
        if norm < 1e-12 {
            return None;
        }
        let a = normal[0] / norm;
        let b = normal[1] / norm;
        // The line passes through the centroid.
        let c = -(a * cx + b * cy);
        Some(Line::new(a, b, c))
    }
}

impl Solver for LineEstimator {
    type Model = Line;

    fn min_sample_size(&self) -> usize {
        2
    }

    fn non_minimal_sample_size(&self) -> usize {
        3
    }

    fn num_data(&self) -> usize {
        self.data.nrows()
    }

    fn minimal_solver(&self, sample: &[usize], models: &mut Vec<Line>) -> usize {
        let (x1, y1) = (self.data[(sample[0], 0)], self.data[(sample[0], 1)]);
        let (x2, y2) = (self.data[(sample[1], 0)], self.data[(sample[1], 1)]);

        // Cross product of the homogeneous points.
        let a = y1 - y2;
        let b = x2 - x1;
        let c = x1 * y2 - x2 * y1;

        let norm = (a * a + b * b).sqrt();
        if norm < 1e-12 {
            // Coincident points span no line.
            return 0;
        }
        models.push(Line::new(a / norm, b / norm, c / norm));
        1
    }

    fn non_minimal_solver(&self, sample: &[usize], model: &mut Line) -> bool {
        match self.fit_line(sample) {
            Some(line) => {
                *model = line;
                true
            }
            None => false,
        }
    }

    fn least_squares(&self, inliers: &[usize], model: &mut Line) {
        if let Some(line) = self.fit_line(inliers) {
            *model = line;
        }
    }

    fn evaluate_model_on_point(&self, model: &Line, index: usize) -> f64 {
        let d = model.signed_distance(self.data[(index, 0)], self.data[(index, 1)]);
        d * d
    }
}
