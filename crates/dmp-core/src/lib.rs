//! # dmp-core
//!
//! Dynamic movement primitives: encode a demonstrated motion as a compact
//! weight matrix and reproduce or generalise it under new start points, goals
//! or speeds.
//!
//! A primitive couples a scalar *canonical system* (the phase clock) with a
//! second-order *transformation system* per dimension. The nonlinear forcing
//! term that shapes the point attractor (discrete) or limit cycle (rhythmic)
//! is a normalised weighted sum of basis functions over the phase, fitted to
//! a demonstration with locally weighted regression.
//!
//! ## Example
//!
//! ```no_run
//! use dmp_core::{DmpConfig, RhythmicDmp};
//! use ndarray::{Array1, Array2};
//!
//! let t = Array1::linspace(0.0, std::f64::consts::TAU, 629);
//! let demo: Array2<f64> = t.mapv(f64::sin).insert_axis(ndarray::Axis(0));
//!
//! let mut dmp = RhythmicDmp::new(DmpConfig::new(1, 50))?;
//! dmp.imitate_path(demo.view())?;
//! let track = dmp.rollout()?;
//! println!("final position: {:?}", track.final_position());
//! # Ok::<(), dmp_core::DmpError>(())
//! ```

#![allow(clippy::needless_range_loop)]

pub mod basis;
pub mod canonical;
pub mod config;
pub mod dmp;
pub mod error;
pub mod goal;
pub mod learner;
pub mod pattern;
pub mod trajectory;

#[cfg(test)]
mod tests_proptest;

pub use basis::BasisFunctions;
pub use canonical::CanonicalSystem;
pub use config::{ConfigError, DmpConfig};
pub use dmp::{
    DiscreteDmp, Dmp, DmpStage, RhythmicDmp, RolloutOptions, StepOptions, StepSample, Steps,
    WeightFile,
};
pub use error::DmpError;
pub use learner::WeightLearner;
pub use pattern::{Discrete, Pattern, PatternKind, Rhythmic};
pub use trajectory::Trajectory;
