//! Canonical system: the scalar phase that clocks a primitive.
//!
//! The phase is integrated with forward Euler at the primitive's fixed step.
//! `tau` stretches time (values above 1 slow the phase down) and the error
//! coupling factor in `(0, 1]` halts it while the tracked system lags behind.

use ndarray::Array1;

use crate::pattern::Pattern;

#[derive(Debug, Clone)]
pub struct CanonicalSystem<P: Pattern> {
    pattern: P,
    dt: f64,
    run_time: f64,
    timesteps: usize,
    x: f64,
}

impl<P: Pattern> CanonicalSystem<P> {
    pub fn new(pattern: P, dt: f64, run_time: f64) -> Self {
        let timesteps = (run_time / dt).round() as usize;
        let x = pattern.initial_phase();
        Self {
            pattern,
            dt,
            run_time,
            timesteps,
            x,
        }
    }

    /// Number of integration steps in one nominal (`tau == 1`) run.
    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Number of integration steps in a run stretched by `tau`.
    pub fn timesteps_for(&self, tau: f64) -> usize {
        (self.timesteps as f64 * tau).round() as usize
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn run_time(&self) -> f64 {
        self.run_time
    }

    /// Current phase value.
    pub fn phase(&self) -> f64 {
        self.x
    }

    pub fn pattern(&self) -> &P {
        &self.pattern
    }

    pub fn reset(&mut self) {
        self.x = self.pattern.initial_phase();
    }

    /// Advance the phase by one step and return the new value.
    pub fn step(&mut self, tau: f64, error_coupling: f64) -> f64 {
        self.x += self.pattern.phase_velocity(self.x) * error_coupling / tau * self.dt;
        self.x
    }

    /// Discrete phases are done once they decay below `threshold`; rhythmic
    /// phases never are.
    pub fn is_done(&self, threshold: f64) -> bool {
        self.pattern.is_done(self.x, threshold)
    }

    /// Phase track of a full uncoupled run: the initial phase followed by the
    /// value after each of `timesteps_for(tau)` steps.
    ///
    /// Resets the system first and leaves it at the final phase.
    pub fn rollout(&mut self, tau: f64) -> Array1<f64> {
        let steps = self.timesteps_for(tau);
        self.reset();
        let mut track = Array1::zeros(steps + 1);
        track[0] = self.x;
        for t in 1..=steps {
            track[t] = self.step(tau, 1.0);
        }
        track
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Discrete, Rhythmic};
    use approx::assert_relative_eq;

    #[test]
    fn discrete_rollout_decays_from_one() {
        let mut cs = CanonicalSystem::new(Discrete { decay_rate: 1.0 }, 0.01, 1.0);
        let track = cs.rollout(1.0);
        assert_eq!(track.len(), 101);
        assert_eq!(track[0], 1.0);
        assert!(track.windows(2).into_iter().all(|w| w[1] < w[0]));
        // forward Euler: (1 - ax·dt)^n
        assert_relative_eq!(track[100], 0.99f64.powi(100), epsilon = 1e-12);
    }

    #[test]
    fn rhythmic_rollout_advances_linearly() {
        let mut cs = CanonicalSystem::new(Rhythmic { angular_rate: 1.0 }, 0.01, 2.0);
        let track = cs.rollout(1.0);
        assert_eq!(track.len(), 201);
        assert_eq!(track[0], 0.0);
        assert_relative_eq!(track[200], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn tau_stretches_the_run() {
        let mut cs = CanonicalSystem::new(Discrete::default(), 0.01, 1.0);
        let slow = cs.rollout(2.0);
        assert_eq!(slow.len(), 201);
        let fast_end = CanonicalSystem::new(Discrete::default(), 0.01, 1.0).rollout(1.0)[100];
        // twice the steps at half the rate reach roughly the same phase
        assert_relative_eq!(slow[200], fast_end, epsilon = 2e-3);
    }

    #[test]
    fn error_coupling_slows_phase() {
        let mut free = CanonicalSystem::new(Discrete::default(), 0.01, 1.0);
        let mut held = free.clone();
        free.step(1.0, 1.0);
        held.step(1.0, 0.5);
        assert!(held.phase() > free.phase());
    }

    #[test]
    fn reset_restores_initial_phase() {
        let mut cs = CanonicalSystem::new(Rhythmic::default(), 0.01, 1.0);
        cs.rollout(1.0);
        assert!(cs.phase() > 0.0);
        cs.reset();
        assert_eq!(cs.phase(), 0.0);
    }

    #[test]
    fn discrete_done_threshold() {
        let mut cs = CanonicalSystem::new(Discrete { decay_rate: 10.0 }, 0.01, 1.0);
        assert!(!cs.is_done(1e-3));
        cs.rollout(1.0);
        // 0.9^100 ≈ 2.7e-5
        assert!(cs.is_done(1e-3));
        let mut rhythmic = CanonicalSystem::new(Rhythmic::default(), 0.01, 1.0);
        rhythmic.rollout(1.0);
        assert!(!rhythmic.is_done(1e-3));
    }
}
