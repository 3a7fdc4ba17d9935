//! Primitive variants.
//!
//! A movement primitive is either *discrete* (a point-attractor reach that
//! settles on its goal) or *rhythmic* (a limit cycle around its goal). The two
//! share every interface but differ in formula, so each variant is a small
//! value implementing [`Pattern`]:
//!
//! | capability            | discrete                         | rhythmic                        |
//! |-----------------------|----------------------------------|---------------------------------|
//! | phase dynamics        | `dx/dt = -ax·x / tau`, `x0 = 1`  | `dx/dt = ω / tau`, `x0 = 0`     |
//! | basis kernel          | `exp(-h (x - c)²)`               | `exp(h (cos(x - c) - 1))`       |
//! | centres               | `exp(-ax·t)`, `t` evenly spaced  | evenly spaced over `[0, 2π)`    |
//! | front term            | `x · (goal - y0)`                | `1`                             |
//! | goal from trajectory  | final valid sample               | midpoint of the observed range  |

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::fmt::Debug;

use crate::config::DmpConfig;
use crate::error::Result;
use crate::goal;

/// Which variant a primitive uses; the serialisable name of a [`Pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Discrete,
    Rhythmic,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discrete => write!(f, "discrete"),
            Self::Rhythmic => write!(f, "rhythmic"),
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = crate::error::DmpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discrete" => Ok(Self::Discrete),
            "rhythmic" => Ok(Self::Rhythmic),
            other => Err(crate::error::DmpError::InvalidParameter(format!(
                "unknown pattern '{}' (expected discrete or rhythmic)",
                other
            ))),
        }
    }
}

/// Capability set distinguishing the primitive variants.
///
/// Implementors are plain values chosen once at construction; the canonical
/// system, basis set and transformation system are generic over them.
pub trait Pattern: Clone + Debug + Send + Sync + 'static {
    const KIND: PatternKind;

    /// Build the variant from its configuration constants.
    fn from_config(config: &DmpConfig) -> Self;

    /// Run time used when the configuration does not set one.
    fn default_run_time(&self) -> f64;

    /// Phase value at the start of every rollout.
    fn initial_phase(&self) -> f64;

    /// Unscaled phase velocity `dx/dt` at `x` (before `tau` and coupling).
    fn phase_velocity(&self, x: f64) -> f64;

    /// Whether the phase has run out.
    fn is_done(&self, x: f64, threshold: f64) -> bool;

    /// Basis centres in increasing phase order.
    fn centers(&self, n_bfs: usize, run_time: f64) -> Array1<f64>;

    /// Per-centre kernel precision.
    fn widths(&self, centers: &Array1<f64>) -> Array1<f64>;

    /// Kernel activation of one basis function; equals 1 at `x == center`.
    fn kernel(&self, x: f64, center: f64, width: f64) -> f64;

    /// Phase-dependent factor of the front term.
    fn phase_scale(&self, x: f64) -> f64;

    /// Spatial factor of the front term.
    fn amplitude(&self, y0: f64, goal: f64) -> f64;

    /// Goal per dimension derived from a `dimension x time` demonstration.
    fn goal_from_trajectory(&self, y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>>;

    /// Multiplier applied to the normalised basis output of dimension `d`.
    fn front_term(&self, x: f64, y0: f64, goal: f64) -> f64 {
        self.phase_scale(x) * self.amplitude(y0, goal)
    }
}

/// Point-attractor primitive driven by an exponentially decaying phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Discrete {
    /// `ax`
    pub decay_rate: f64,
}

impl Default for Discrete {
    fn default() -> Self {
        Self { decay_rate: 1.0 }
    }
}

impl Pattern for Discrete {
    const KIND: PatternKind = PatternKind::Discrete;

    fn from_config(config: &DmpConfig) -> Self {
        Self {
            decay_rate: config.decay_rate,
        }
    }

    fn default_run_time(&self) -> f64 {
        1.0
    }

    fn initial_phase(&self) -> f64 {
        1.0
    }

    fn phase_velocity(&self, x: f64) -> f64 {
        -self.decay_rate * x
    }

    fn is_done(&self, x: f64, threshold: f64) -> bool {
        x < threshold
    }

    /// Centres are placed at `exp(-ax·t)` for `t` evenly spaced over the run
    /// time, so the kernels are evenly spread in *time*. Later times have
    /// smaller phase, hence the reversed walk.
    fn centers(&self, n_bfs: usize, run_time: f64) -> Array1<f64> {
        let times = Array1::linspace(0.0, run_time, n_bfs);
        times
            .iter()
            .rev()
            .map(|&t| (-self.decay_rate * t).exp())
            .collect()
    }

    fn widths(&self, centers: &Array1<f64>) -> Array1<f64> {
        let n = centers.len() as f64;
        centers.mapv(|c| n.powf(1.5) / c / self.decay_rate)
    }

    fn kernel(&self, x: f64, center: f64, width: f64) -> f64 {
        (-width * (x - center).powi(2)).exp()
    }

    fn phase_scale(&self, x: f64) -> f64 {
        x
    }

    fn amplitude(&self, y0: f64, goal: f64) -> f64 {
        goal - y0
    }

    fn goal_from_trajectory(&self, y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        goal::final_sample(y_des)
    }
}

/// Limit-cycle primitive driven by a constantly advancing phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rhythmic {
    /// Phase velocity in rad/s
    pub angular_rate: f64,
}

impl Default for Rhythmic {
    fn default() -> Self {
        Self { angular_rate: 1.0 }
    }
}

impl Pattern for Rhythmic {
    const KIND: PatternKind = PatternKind::Rhythmic;

    fn from_config(config: &DmpConfig) -> Self {
        Self {
            angular_rate: config.angular_rate,
        }
    }

    fn default_run_time(&self) -> f64 {
        TAU
    }

    fn initial_phase(&self) -> f64 {
        0.0
    }

    fn phase_velocity(&self, _x: f64) -> f64 {
        self.angular_rate
    }

    fn is_done(&self, _x: f64, _threshold: f64) -> bool {
        false
    }

    fn centers(&self, n_bfs: usize, _run_time: f64) -> Array1<f64> {
        let step = TAU / n_bfs as f64;
        Array1::from_shape_fn(n_bfs, |i| i as f64 * step)
    }

    fn widths(&self, centers: &Array1<f64>) -> Array1<f64> {
        Array1::from_elem(centers.len(), centers.len() as f64)
    }

    // Periodic in x, so the unbounded phase never needs wrapping.
    fn kernel(&self, x: f64, center: f64, width: f64) -> f64 {
        (width * ((x - center).cos() - 1.0)).exp()
    }

    fn phase_scale(&self, _x: f64) -> f64 {
        1.0
    }

    fn amplitude(&self, _y0: f64, _goal: f64) -> f64 {
        1.0
    }

    fn goal_from_trajectory(&self, y_des: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        goal::midrange(y_des)
    }
}
