//! Goal estimation from demonstrated trajectories.
//!
//! Demonstrations are `dimension x time` arrays that may contain gaps encoded
//! as NaN. Gaps never contribute to a goal; a dimension without a single
//! valid sample is a configuration error.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{DmpError, Result};

/// Valid (non-NaN, finite) samples of one dimension, in time order.
pub fn valid_samples<'a>(row: ArrayView1<'a, f64>) -> impl Iterator<Item = f64> + 'a {
    row.into_iter().copied().filter(|v| v.is_finite())
}

/// First valid sample of every dimension.
pub fn first_sample(y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    per_dimension(y_des, |row| valid_samples(row).next())
}

/// Final valid sample of every dimension (discrete goal).
pub fn final_sample(y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    per_dimension(y_des, |row| valid_samples(row).last())
}

/// Midpoint `0.5 * (min + max)` of every dimension's observed range
/// (rhythmic goal: the centre of oscillation).
pub fn midrange(y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
    per_dimension(y_des, |row| {
        valid_samples(row).fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .map(|(lo, hi)| 0.5 * (lo + hi))
    })
}

fn per_dimension<F>(y_des: ArrayView2<'_, f64>, mut estimate: F) -> Result<Array1<f64>>
where
    F: FnMut(ArrayView1<'_, f64>) -> Option<f64>,
{
    if y_des.ncols() == 0 {
        return Err(DmpError::EmptyTrajectory);
    }
    let mut goal = Array1::zeros(y_des.nrows());
    for (dimension, row) in y_des.outer_iter().enumerate() {
        goal[dimension] = estimate(row).ok_or(DmpError::NoValidSamples { dimension })?;
    }
    Ok(goal)
}
