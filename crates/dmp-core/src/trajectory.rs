//! Demonstration preprocessing and rollout output.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{DmpError, Result};
use crate::goal::valid_samples;

/// Position, velocity and acceleration tracks of one rollout.
///
/// Each array is `steps x n_dmps`; row `k` holds the state after `k + 1`
/// integration steps, i.e. at time `(k + 1) * dt` on the primitive's grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub y: Array2<f64>,
    pub dy: Array2<f64>,
    pub ddy: Array2<f64>,
}

impl Trajectory {
    pub(crate) fn with_capacity(steps: usize, dims: usize) -> Self {
        Self {
            y: Array2::zeros((steps, dims)),
            dy: Array2::zeros((steps, dims)),
            ddy: Array2::zeros((steps, dims)),
        }
    }

    /// Number of recorded steps.
    pub fn len(&self) -> usize {
        self.y.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.y.nrows() == 0
    }

    /// Position after the last step.
    pub fn final_position(&self) -> Option<ArrayView1<'_, f64>> {
        self.len().checked_sub(1).map(|last| self.y.row(last))
    }

    /// Root-mean-square position error against a `dimension x time` path
    /// sampled on the same grid from `t = 0` (so column `k + 1` of the path
    /// lines up with row `k` of the rollout). Only overlapping samples count.
    pub fn tracking_rms(&self, path: ArrayView2<'_, f64>) -> Result<f64> {
        if path.nrows() != self.y.ncols() {
            return Err(DmpError::DimensionMismatch {
                what: "reference path",
                expected: self.y.ncols(),
                actual: path.nrows(),
            });
        }
        let overlap = self.len().min(path.ncols().saturating_sub(1));
        if overlap == 0 {
            return Err(DmpError::EmptyTrajectory);
        }
        let mut sum = 0.0;
        for k in 0..overlap {
            for d in 0..path.nrows() {
                let e = self.y[[k, d]] - path[[d, k + 1]];
                sum += e * e;
            }
        }
        Ok((sum / (overlap * path.nrows()) as f64).sqrt())
    }
}

/// Resample every dimension of a `dimension x time` demonstration onto
/// `points` evenly spaced samples spanning the same interval.
///
/// Interpolation is linear over the valid samples only, so NaN gaps are
/// bridged; values before the first or after the last valid sample hold the
/// nearest valid value.
pub fn resample(y_des: ArrayView2<'_, f64>, points: usize) -> Result<Array2<f64>> {
    let n = y_des.ncols();
    if n == 0 {
        return Err(DmpError::EmptyTrajectory);
    }
    let mut path = Array2::zeros((y_des.nrows(), points));
    for (dimension, (row, mut out)) in y_des
        .outer_iter()
        .zip(path.outer_iter_mut())
        .enumerate()
    {
        let known: Vec<(f64, f64)> = row
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_finite())
            .map(|(i, &v)| (position(i, n), v))
            .collect();
        if known.is_empty() {
            return Err(DmpError::NoValidSamples { dimension });
        }
        for (j, slot) in out.iter_mut().enumerate() {
            *slot = interpolate(&known, position(j, points));
        }
    }
    Ok(path)
}

/// Second-order central differences along time (one-sided at the ends),
/// divided by `dt`. Input and output are `dimension x time`.
pub fn gradient(path: ArrayView2<'_, f64>, dt: f64) -> Array2<f64> {
    let mut out = Array2::zeros(path.raw_dim());
    for (row, mut grad) in path.outer_iter().zip(out.outer_iter_mut()) {
        grad.assign(&gradient_1d(row, dt));
    }
    out
}

fn gradient_1d(row: ArrayView1<'_, f64>, dt: f64) -> Array1<f64> {
    let n = row.len();
    let mut grad = Array1::zeros(n);
    if n < 2 {
        return grad;
    }
    grad[0] = (row[1] - row[0]) / dt;
    grad[n - 1] = (row[n - 1] - row[n - 2]) / dt;
    for i in 1..n - 1 {
        grad[i] = (row[i + 1] - row[i - 1]) / (2.0 * dt);
    }
    grad
}

/// Count of valid samples per dimension.
pub fn valid_counts(y_des: ArrayView2<'_, f64>) -> Vec<usize> {
    y_des
        .axis_iter(Axis(0))
        .map(|row| valid_samples(row).count())
        .collect()
}

fn position(i: usize, n: usize) -> f64 {
    if n < 2 {
        0.0
    } else {
        i as f64 / (n - 1) as f64
    }
}

fn interpolate(known: &[(f64, f64)], t: f64) -> f64 {
    let upper = known.partition_point(|&(s, _)| s < t);
    if upper == 0 {
        return known[0].1;
    }
    if upper == known.len() {
        return known[known.len() - 1].1;
    }
    let (s0, v0) = known[upper - 1];
    let (s1, v1) = known[upper];
    if s1 - s0 <= f64::EPSILON {
        return v1;
    }
    v0 + (v1 - v0) * (t - s0) / (s1 - s0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn resample_keeps_endpoints() {
        let y = array![[0.0, 1.0, 4.0]];
        let path = resample(y.view(), 5).unwrap();
        assert_eq!(path.dim(), (1, 5));
        assert_relative_eq!(path[[0, 0]], 0.0);
        assert_relative_eq!(path[[0, 1]], 0.5);
        assert_relative_eq!(path[[0, 2]], 1.0);
        assert_relative_eq!(path[[0, 3]], 2.5);
        assert_relative_eq!(path[[0, 4]], 4.0);
    }

    #[test]
    fn resample_bridges_gaps() {
        let y = array![[f64::NAN, 1.0, f64::NAN, 3.0, f64::NAN]];
        let path = resample(y.view(), 5).unwrap();
        assert_eq!(path, array![[1.0, 1.0, 2.0, 3.0, 3.0]]);
    }

    #[test]
    fn resample_single_sample_is_constant() {
        let y = array![[2.0]];
        let path = resample(y.view(), 4).unwrap();
        assert_eq!(path, array![[2.0, 2.0, 2.0, 2.0]]);
    }

    #[test]
    fn resample_rejects_missing_dimension() {
        let y = array![[0.0, 1.0], [f64::NAN, f64::NAN]];
        assert!(matches!(
            resample(y.view(), 3),
            Err(DmpError::NoValidSamples { dimension: 1 })
        ));
    }

    #[test]
    fn gradient_of_quadratic() {
        let dt = 0.1;
        let path = Array1::from_shape_fn(11, |i| (i as f64 * dt).powi(2)).insert_axis(Axis(0));
        let grad = gradient(path.view(), dt);
        // interior central differences are exact for a quadratic
        for i in 1..10 {
            assert_relative_eq!(grad[[0, i]], 2.0 * i as f64 * dt, epsilon = 1e-9);
        }
        assert_relative_eq!(grad[[0, 0]], 0.1, epsilon = 1e-9);
    }

    #[test]
    fn tracking_rms_aligns_on_the_grid() {
        let traj = Trajectory {
            y: array![[1.0], [2.0], [3.0]],
            dy: Array2::zeros((3, 1)),
            ddy: Array2::zeros((3, 1)),
        };
        let path = array![[0.0, 1.0, 2.0, 3.0]];
        assert_relative_eq!(traj.tracking_rms(path.view()).unwrap(), 0.0);
        let shifted = array![[0.0, 2.0, 3.0, 4.0]];
        assert_relative_eq!(traj.tracking_rms(shifted.view()).unwrap(), 1.0);
        assert_eq!(traj.final_position().unwrap()[0], 3.0);
    }

    #[test]
    fn valid_counts_skip_gaps() {
        let y = array![[0.0, f64::NAN, 1.0], [f64::NAN, f64::NAN, 2.0]];
        assert_eq!(valid_counts(y.view()), vec![2, 1]);
    }
}
