//! Basis functions over the phase domain.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::pattern::Pattern;

/// Kernels placed along the phase domain; their normalised weighted sum is
/// the forcing term.
///
/// Centres are strictly increasing and fixed at construction together with
/// their automatically tuned widths.
#[derive(Debug, Clone)]
pub struct BasisFunctions<P: Pattern> {
    pattern: P,
    centers: Array1<f64>,
    widths: Array1<f64>,
}

impl<P: Pattern> BasisFunctions<P> {
    pub fn new(pattern: P, n_bfs: usize, run_time: f64) -> Self {
        let centers = pattern.centers(n_bfs, run_time);
        let widths = pattern.widths(&centers);
        Self {
            pattern,
            centers,
            widths,
        }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn centers(&self) -> &Array1<f64> {
        &self.centers
    }

    pub fn widths(&self) -> &Array1<f64> {
        &self.widths
    }

    pub fn pattern(&self) -> &P {
        &self.pattern
    }

    /// Activation of every basis function at a single phase value.
    pub fn activation(&self, x: f64) -> Array1<f64> {
        ndarray::Zip::from(&self.centers)
            .and(&self.widths)
            .map_collect(|&c, &h| self.pattern.kernel(x, c, h))
    }

    /// Activations over a phase sequence, one row per phase value
    /// (`len(phases) x n_bfs`). Row `i` equals `activation(phases[i])`.
    pub fn activations(&self, phases: ArrayView1<'_, f64>) -> Array2<f64> {
        let mut psi = Array2::zeros((phases.len(), self.len()));
        for (mut row, &x) in psi.axis_iter_mut(Axis(0)).zip(phases.iter()) {
            row.assign(&self.activation(x));
        }
        psi
    }
}
