//! Transformation system: the spring-damper plus learned forcing term that
//! produces the actual trajectory.
//!
//! # Dynamics
//! ```text
//! tau² ÿ = ay (by (goal - y) - tau ẏ) + f(x)
//! f(x)   = front(x) · Σ_b ψ_b(x) w_b / (Σ_b ψ_b(x) + ε)
//! ```
//! integrated with a fixed-step Euler recurrence. The phase `x` comes from the
//! [`CanonicalSystem`], `ψ` from the [`BasisFunctions`] and `w` from
//! [`Dmp::imitate_path`] or explicit assignment.
//!
//! # Lifecycle
//! `Ready` (zero weights) → `Trained` (after imitation or weight
//! assignment) → `Running` (mid-rollout). [`Dmp::reset_state`] returns to
//! `Ready`/`Trained` with `y = y0`, `ẏ = ÿ = 0` and the initial phase.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::basis::BasisFunctions;
use crate::canonical::CanonicalSystem;
use crate::config::DmpConfig;
use crate::error::{DmpError, Result};
use crate::goal::first_sample;
use crate::learner::WeightLearner;
use crate::pattern::{Discrete, Pattern, Rhythmic};
use crate::trajectory::{self, Trajectory};

pub type DiscreteDmp = Dmp<Discrete>;
pub type RhythmicDmp = Dmp<Rhythmic>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmpStage {
    /// Constructed with all-zero weights
    Ready,
    /// Weights fitted or assigned
    Trained,
    /// At least one step taken since the last reset
    Running,
}

/// Per-call integration overrides.
#[derive(Debug, Clone, Default)]
pub struct StepOptions<'a> {
    /// Temporal scaling; `None` uses the configured value
    pub tau: Option<f64>,
    /// Tracking error; phase and state advance by `1 / (1 + error)`
    pub error: f64,
    /// Extra acceleration per dimension
    pub external_force: Option<ArrayView1<'a, f64>>,
}

/// Rollout overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct RolloutOptions {
    /// Number of steps; `None` covers the run time stretched by `tau`
    pub timesteps: Option<usize>,
    /// Temporal scaling; `None` uses the configured value
    pub tau: Option<f64>,
    /// Constant tracking error applied to every step
    pub error: f64,
}

impl RolloutOptions {
    pub fn with_tau(tau: f64) -> Self {
        Self {
            tau: Some(tau),
            ..Default::default()
        }
    }
}

/// State after one integration step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSample {
    pub y: Array1<f64>,
    pub dy: Array1<f64>,
    pub ddy: Array1<f64>,
    pub phase: f64,
}

/// On-disk weight matrix: plain numbers, no other metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightFile {
    pub weights: Array2<f64>,
}

impl WeightFile {
    pub fn load<Q: AsRef<Path>>(path: Q) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save<Q: AsRef<Path>>(&self, path: Q) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// A single dynamic movement primitive over `n_dmps` dimensions.
#[derive(Debug, Clone)]
pub struct Dmp<P: Pattern> {
    config: DmpConfig,
    cs: CanonicalSystem<P>,
    basis: BasisFunctions<P>,
    learner: WeightLearner,
    ay: f64,
    by: f64,
    weights: Array2<f64>,
    y0: Array1<f64>,
    goal: Array1<f64>,
    y: Array1<f64>,
    dy: Array1<f64>,
    ddy: Array1<f64>,
    trained: bool,
    running: bool,
    desired_path: Option<Array2<f64>>,
}

impl<P: Pattern> Dmp<P> {
    /// Build a primitive with zero weights from a validated configuration.
    pub fn new(config: DmpConfig) -> Result<Self> {
        let pattern = P::from_config(&config);
        Self::with_pattern(config, pattern)
    }

    /// Build a primitive around an explicit variant value.
    pub fn with_pattern(config: DmpConfig, pattern: P) -> Result<Self> {
        config.validate()?;
        let run_time = config
            .run_time
            .unwrap_or_else(|| pattern.default_run_time());
        if config.dt >= run_time {
            return Err(DmpError::InvalidParameter(format!(
                "dt ({}) must be smaller than run time ({})",
                config.dt, run_time
            )));
        }

        let n = config.n_dmps;
        let y0 = config
            .y0
            .as_ref()
            .map(|v| Array1::from(v.clone()))
            .unwrap_or_else(|| Array1::zeros(n));
        let goal = config
            .goal
            .as_ref()
            .map(|v| Array1::from(v.clone()))
            .unwrap_or_else(|| Array1::ones(n));

        let cs = CanonicalSystem::new(pattern.clone(), config.dt, run_time);
        let basis = BasisFunctions::new(pattern, config.n_bfs, run_time);
        let mut dmp = Self {
            cs,
            basis,
            learner: WeightLearner::new(config.regression_epsilon),
            ay: config.spring_constant,
            by: config.damping(),
            weights: Array2::zeros((n, config.n_bfs)),
            y: y0.clone(),
            dy: Array1::zeros(n),
            ddy: Array1::zeros(n),
            y0,
            goal,
            trained: false,
            running: false,
            desired_path: None,
            config,
        };
        dmp.check_offset();

        log::debug!(
            "{} primitive: {} dims, {} basis functions, {} steps of {}s",
            P::KIND,
            n,
            dmp.basis.len(),
            dmp.cs.timesteps(),
            dmp.cs.dt()
        );
        Ok(dmp)
    }

    /// Build a primitive with preset weights (`n_dmps x n_bfs`).
    pub fn with_weights(config: DmpConfig, weights: Array2<f64>) -> Result<Self> {
        let mut dmp = Self::new(config)?;
        dmp.set_weights(weights)?;
        Ok(dmp)
    }

    pub fn config(&self) -> &DmpConfig {
        &self.config
    }

    pub fn n_dmps(&self) -> usize {
        self.config.n_dmps
    }

    pub fn n_bfs(&self) -> usize {
        self.basis.len()
    }

    pub fn canonical(&self) -> &CanonicalSystem<P> {
        &self.cs
    }

    pub fn basis(&self) -> &BasisFunctions<P> {
        &self.basis
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn y0(&self) -> &Array1<f64> {
        &self.y0
    }

    pub fn goal(&self) -> &Array1<f64> {
        &self.goal
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn dy(&self) -> &Array1<f64> {
        &self.dy
    }

    pub fn ddy(&self) -> &Array1<f64> {
        &self.ddy
    }

    pub fn phase(&self) -> f64 {
        self.cs.phase()
    }

    /// Whether the phase has run below the configured `done_threshold`.
    /// Rhythmic primitives never finish.
    pub fn is_done(&self) -> bool {
        self.cs.is_done(self.config.done_threshold)
    }

    /// Snapshot of the current position, velocity, acceleration and phase.
    pub fn state(&self) -> StepSample {
        StepSample {
            y: self.y.clone(),
            dy: self.dy.clone(),
            ddy: self.ddy.clone(),
            phase: self.cs.phase(),
        }
    }

    /// Resampled demonstration (`n_dmps x (timesteps + 1)`) from the last
    /// imitation, on the same time grid as a rollout.
    pub fn desired_path(&self) -> Option<&Array2<f64>> {
        self.desired_path.as_ref()
    }

    pub fn stage(&self) -> DmpStage {
        if self.running {
            DmpStage::Running
        } else if self.trained {
            DmpStage::Trained
        } else {
            DmpStage::Ready
        }
    }

    pub fn set_weights(&mut self, weights: Array2<f64>) -> Result<()> {
        let expected = (self.n_dmps(), self.n_bfs());
        if weights.dim() != expected {
            return Err(DmpError::WeightShape {
                expected,
                actual: weights.dim(),
            });
        }
        self.weights = weights;
        self.trained = true;
        Ok(())
    }

    /// Move the start point. Takes effect at the next reset or rollout.
    pub fn set_y0(&mut self, y0: ArrayView1<'_, f64>) -> Result<()> {
        self.y0 = self.checked_vector("y0", y0)?;
        Ok(())
    }

    /// Move the attractor goal.
    pub fn set_goal(&mut self, goal: ArrayView1<'_, f64>) -> Result<()> {
        self.goal = self.checked_vector("goal", goal)?;
        Ok(())
    }

    fn checked_vector(&self, what: &'static str, v: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if v.len() != self.n_dmps() {
            return Err(DmpError::DimensionMismatch {
                what,
                expected: self.n_dmps(),
                actual: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(DmpError::InvalidParameter(format!(
                "{} must contain finite values",
                what
            )));
        }
        Ok(v.to_owned())
    }

    /// Nudge the goal of every dimension whose start coincides with it, so
    /// the forcing term of that dimension is not scaled to zero.
    pub fn check_offset(&mut self) {
        let eps = self.config.offset_epsilon;
        nudge_goal(&mut self.goal, &self.y0, eps);
    }

    /// Restore `y = y0`, `ẏ = ÿ = 0` and the initial phase.
    pub fn reset_state(&mut self) {
        self.y.assign(&self.y0);
        self.dy.fill(0.0);
        self.ddy.fill(0.0);
        self.cs.reset();
        self.running = false;
    }

    /// Fit the basis weights to a 1-D demonstration.
    pub fn imitate_path_1d(&mut self, y_des: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
        self.imitate_path(y_des.insert_axis(ndarray::Axis(0)))
    }

    /// Fit the basis weights to a `n_dmps x time` demonstration.
    ///
    /// Sets `y0` to the first valid sample and the goal from the variant's
    /// goal policy, resamples the demonstration onto the rollout grid and
    /// regresses the forcing term it implies. On error the primitive is left
    /// untouched. Returns the fitted weights and leaves the primitive reset.
    pub fn imitate_path(&mut self, y_des: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if y_des.nrows() != self.n_dmps() {
            return Err(DmpError::DimensionMismatch {
                what: "demonstration rows",
                expected: self.n_dmps(),
                actual: y_des.nrows(),
            });
        }
        let pattern = self.cs.pattern().clone();
        let mut goal = pattern.goal_from_trajectory(y_des)?;
        let y0 = first_sample(y_des)?;
        nudge_goal(&mut goal, &y0, self.config.offset_epsilon);

        let tau = self.config.tau;
        let dt = self.cs.dt();
        let mut cs = self.cs.clone();
        let phases = cs.rollout(tau);

        let path = trajectory::resample(y_des, phases.len())?;
        let dy_des = trajectory::gradient(path.view(), dt);
        let ddy_des = trajectory::gradient(dy_des.view(), dt);

        let mut f_target = Array2::zeros((phases.len(), self.n_dmps()));
        for d in 0..self.n_dmps() {
            let mut column = f_target.column_mut(d);
            for t in 0..phases.len() {
                column[t] = ddy_des[[d, t]] * tau * tau
                    - self.ay * (self.by * (goal[d] - path[[d, t]]) - dy_des[[d, t]] * tau);
            }
        }

        let amplitude: Array1<f64> = y0
            .iter()
            .zip(goal.iter())
            .map(|(&s, &g)| pattern.amplitude(s, g))
            .collect();
        let weights = self
            .learner
            .fit(&self.basis, f_target.view(), phases.view(), amplitude.view())?;

        log::debug!(
            "imitated {}x{} demonstration ({:?} valid samples) onto {} steps; goal {:?}",
            y_des.nrows(),
            y_des.ncols(),
            trajectory::valid_counts(y_des),
            phases.len() - 1,
            goal.as_slice().unwrap_or(&[])
        );

        self.y0 = y0;
        self.goal = goal;
        self.weights = weights.clone();
        self.desired_path = Some(path);
        self.trained = true;
        self.reset_state();
        Ok(weights)
    }

    /// Forcing term of every dimension at phase `x`.
    pub fn forcing(&self, x: f64) -> Array1<f64> {
        let psi = self.basis.activation(x);
        let norm = psi.sum() + self.config.regression_epsilon;
        let drive = self.weights.dot(&psi) / norm;
        let pattern = self.cs.pattern();
        Array1::from_shape_fn(self.n_dmps(), |d| {
            pattern.front_term(x, self.y0[d], self.goal[d]) * drive[d]
        })
    }

    /// Advance phase and state by one step.
    pub fn step(&mut self, opts: &StepOptions<'_>) -> Result<StepSample> {
        let tau = self.checked_tau(opts.tau)?;
        let coupling = error_coupling(opts.error)?;
        if let Some(force) = opts.external_force {
            if force.len() != self.n_dmps() {
                return Err(DmpError::DimensionMismatch {
                    what: "external force",
                    expected: self.n_dmps(),
                    actual: force.len(),
                });
            }
        }
        Ok(self.advance(tau, coupling, opts.external_force))
    }

    fn advance(
        &mut self,
        tau: f64,
        coupling: f64,
        external_force: Option<ArrayView1<'_, f64>>,
    ) -> StepSample {
        let x = self.cs.step(tau, coupling);
        let f = self.forcing(x);
        let dt = self.cs.dt() * coupling;
        for d in 0..self.n_dmps() {
            let spring = self.ay * (self.by * (self.goal[d] - self.y[d]) - tau * self.dy[d]);
            let mut ddy = (spring + f[d]) / (tau * tau);
            if let Some(force) = external_force {
                ddy += force[d];
            }
            self.ddy[d] = ddy;
            self.dy[d] += ddy * dt;
            self.y[d] += self.dy[d] * dt;
        }
        self.running = true;
        self.state()
    }

    /// Reset and integrate over the configured run time.
    pub fn rollout(&mut self) -> Result<Trajectory> {
        self.rollout_with(&RolloutOptions::default())
    }

    pub fn rollout_with(&mut self, opts: &RolloutOptions) -> Result<Trajectory> {
        self.run(opts, None)
    }

    /// Roll out with an external perturbation. `force(step, y)` returns one
    /// extra acceleration per dimension.
    pub fn rollout_with_force<F>(&mut self, opts: &RolloutOptions, mut force: F) -> Result<Trajectory>
    where
        F: FnMut(usize, ArrayView1<'_, f64>) -> Array1<f64>,
    {
        self.run(opts, Some(&mut force))
    }

    fn run(
        &mut self,
        opts: &RolloutOptions,
        mut force: Option<&mut dyn FnMut(usize, ArrayView1<'_, f64>) -> Array1<f64>>,
    ) -> Result<Trajectory> {
        let tau = self.checked_tau(opts.tau)?;
        let coupling = error_coupling(opts.error)?;
        let steps = opts.timesteps.unwrap_or_else(|| self.cs.timesteps_for(tau));

        self.reset_state();
        let mut track = Trajectory::with_capacity(steps, self.n_dmps());
        for t in 0..steps {
            let external = match force.as_mut() {
                Some(force) => {
                    let push = force(t, self.y.view());
                    if push.len() != self.n_dmps() {
                        return Err(DmpError::DimensionMismatch {
                            what: "external force",
                            expected: self.n_dmps(),
                            actual: push.len(),
                        });
                    }
                    Some(push)
                }
                None => None,
            };
            let sample = self.advance(tau, coupling, external.as_ref().map(|f| f.view()));
            track.y.row_mut(t).assign(&sample.y);
            track.dy.row_mut(t).assign(&sample.dy);
            track.ddy.row_mut(t).assign(&sample.ddy);
        }

        log::trace!(
            "rollout: {} steps at tau {}, final phase {:.4}",
            steps,
            tau,
            self.cs.phase()
        );
        Ok(track)
    }

    /// Stream the rollout one step at a time.
    ///
    /// Resets the primitive on creation, so a fresh iterator always replays
    /// the same sequence as [`Dmp::rollout_with`].
    pub fn steps(&mut self, opts: &RolloutOptions) -> Result<Steps<'_, P>> {
        let tau = self.checked_tau(opts.tau)?;
        let coupling = error_coupling(opts.error)?;
        let remaining = opts.timesteps.unwrap_or_else(|| self.cs.timesteps_for(tau));
        self.reset_state();
        Ok(Steps {
            dmp: self,
            tau,
            coupling,
            remaining,
        })
    }

    fn checked_tau(&self, tau: Option<f64>) -> Result<f64> {
        let tau = tau.unwrap_or(self.config.tau);
        if !tau.is_finite() || tau <= 0.0 {
            return Err(DmpError::InvalidParameter(format!(
                "tau must be finite and positive (got {})",
                tau
            )));
        }
        Ok(tau)
    }

    /// Write the weight matrix as JSON.
    pub fn save_weights<Q: AsRef<Path>>(&self, path: Q) -> Result<()> {
        WeightFile {
            weights: self.weights.clone(),
        }
        .save(path)
    }

    /// Load a weight matrix written by [`Dmp::save_weights`]; the shape must
    /// match this primitive.
    pub fn load_weights<Q: AsRef<Path>>(&mut self, path: Q) -> Result<()> {
        self.set_weights(WeightFile::load(path)?.weights)
    }
}

/// Finite step iterator returned by [`Dmp::steps`].
pub struct Steps<'a, P: Pattern> {
    dmp: &'a mut Dmp<P>,
    tau: f64,
    coupling: f64,
    remaining: usize,
}

impl<P: Pattern> Iterator for Steps<'_, P> {
    type Item = StepSample;

    fn next(&mut self) -> Option<StepSample> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.dmp.advance(self.tau, self.coupling, None))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<P: Pattern> ExactSizeIterator for Steps<'_, P> {}

fn error_coupling(error: f64) -> Result<f64> {
    if !error.is_finite() || error < 0.0 {
        return Err(DmpError::InvalidParameter(format!(
            "tracking error must be finite and non-negative (got {})",
            error
        )));
    }
    Ok(1.0 / (1.0 + error))
}

fn nudge_goal(goal: &mut Array1<f64>, y0: &Array1<f64>, eps: f64) {
    for (d, (g, &s)) in goal.iter_mut().zip(y0.iter()).enumerate() {
        if (s - *g).abs() < eps {
            log::warn!(
                "dimension {}: goal {} coincides with start; nudging by {}",
                d,
                g,
                eps
            );
            *g += eps;
        }
    }
}
