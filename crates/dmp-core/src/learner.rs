//! Locally weighted regression of basis weights.
//!
//! Each (dimension, basis function) pair is an independent one-parameter
//! weighted least-squares problem with a closed-form solution:
//!
//! ```text
//! w[d, b] = Σ_t s_t ψ_b(t) f[t, d] / (Σ_t s_t² ψ_b(t) + ε) / k_d
//! ```
//!
//! where `s_t` is the phase factor of the front term (1 for rhythmic
//! primitives, `x_t` for discrete ones) and `k_d` its spatial factor
//! (`goal - y0` for discrete primitives, skipped when nearly zero). For
//! rhythmic primitives this reduces to the plain activation-weighted average
//! of the target forcing term.
//!
//! For discrete primitives this is not the same as dividing `f` by the front
//! term and then averaging: the `s_t` weighting keeps late samples, where the
//! phase is small, from dominating the fit.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::basis::BasisFunctions;
use crate::error::{DmpError, Result};
use crate::pattern::Pattern;

/// Spatial factors smaller than this are left out of the fit.
const AMPLITUDE_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy)]
pub struct WeightLearner {
    epsilon: f64,
}

impl Default for WeightLearner {
    fn default() -> Self {
        Self { epsilon: 1e-10 }
    }
}

impl WeightLearner {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Fit a `n_dmps x n_bfs` weight matrix.
    ///
    /// * `f_target` - target forcing term, one row per phase sample (`T x D`)
    /// * `phases` - canonical phase at each sample (length `T`)
    /// * `amplitude` - spatial front-term factor per dimension (length `D`)
    pub fn fit<P: Pattern>(
        &self,
        basis: &BasisFunctions<P>,
        f_target: ArrayView2<'_, f64>,
        phases: ArrayView1<'_, f64>,
        amplitude: ArrayView1<'_, f64>,
    ) -> Result<Array2<f64>> {
        let (samples, dims) = f_target.dim();
        if phases.len() != samples {
            return Err(DmpError::DimensionMismatch {
                what: "phase sequence",
                expected: samples,
                actual: phases.len(),
            });
        }
        if amplitude.len() != dims {
            return Err(DmpError::DimensionMismatch {
                what: "amplitude vector",
                expected: dims,
                actual: amplitude.len(),
            });
        }

        let pattern = basis.pattern();
        let psi = basis.activations(phases);
        let scale: Array1<f64> = phases.mapv(|x| pattern.phase_scale(x));

        // denominators are shared by every dimension
        let denom: Array1<f64> = (&psi.t() * &scale.mapv(|s| s * s)).sum_axis(ndarray::Axis(1));
        let degenerate = denom.iter().filter(|&&d| d < 1e3 * self.epsilon).count();
        if degenerate > 0 {
            log::warn!(
                "{} of {} basis functions received near-zero activation; their weights collapse to ~0",
                degenerate,
                basis.len()
            );
        }

        let mut weights = Array2::zeros((dims, basis.len()));
        for d in 0..dims {
            let weighted = &scale * &f_target.column(d);
            let numer = psi.t().dot(&weighted);
            let mut row = numer / &denom.mapv(|v| v + self.epsilon);
            let k = amplitude[d];
            if k.abs() > AMPLITUDE_TOLERANCE {
                row /= k;
            }
            weights.row_mut(d).assign(&row);
        }
        Ok(weights)
    }
}
