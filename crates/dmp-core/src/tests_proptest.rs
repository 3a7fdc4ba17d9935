use proptest::prelude::*;

/// Property-based checks of the basis set and the primitive state machine.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasisFunctions, Discrete, DiscreteDmp, DmpConfig, Rhythmic, RhythmicDmp};
    use ndarray::{Array1, Array2};
    use std::f64::consts::TAU;

    // =========================================================================
    // Basis activation bounds
    // =========================================================================
    proptest! {
        #[test]
        fn rhythmic_activation_in_unit_interval(
            n_bfs in 1usize..40,
            x in -20.0f64..20.0,
        ) {
            // exponent is bounded below by -2 * n_bfs, far from underflow
            let basis = BasisFunctions::new(Rhythmic::default(), n_bfs, TAU);
            for &p in basis.activation(x).iter() {
                prop_assert!(p > 0.0 && p <= 1.0);
            }
        }

        #[test]
        fn discrete_activation_in_unit_interval(
            n_bfs in 1usize..40,
            x in (-1.0f64).exp()..1.0,
        ) {
            // phases within the centre span [exp(-ax * run_time), 1]; far
            // outside it the Gaussian kernels underflow to exactly 0
            let basis = BasisFunctions::new(Discrete::default(), n_bfs, 1.0);
            for &p in basis.activation(x).iter() {
                prop_assert!(p > 0.0 && p <= 1.0);
            }
        }
    }

    // =========================================================================
    // Broadcast consistency and periodicity
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn sequence_row_matches_scalar(
            phases in prop::collection::vec(0.0f64..1.0, 1..30),
            pick in any::<prop::sample::Index>(),
        ) {
            let basis = BasisFunctions::new(Discrete::default(), 15, 1.0);
            let seq = Array1::from(phases.clone());
            let psi = basis.activations(seq.view());
            let i = pick.index(phases.len());
            prop_assert_eq!(psi.row(i).to_owned(), basis.activation(phases[i]));
        }

        #[test]
        fn rhythmic_activation_periodic(x in -10.0f64..10.0, n_bfs in 1usize..30) {
            let basis = BasisFunctions::new(Rhythmic::default(), n_bfs, TAU);
            let a = basis.activation(x);
            let b = basis.activation(x + TAU);
            for (p, q) in a.iter().zip(b.iter()) {
                prop_assert!((p - q).abs() < 1e-9);
            }
        }
    }

    // =========================================================================
    // Reset restores the initial state after any rollout
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn reset_after_rollout(
            weight in -200.0f64..200.0,
            start in -5.0f64..5.0,
            steps in 1usize..150,
            tau in 0.5f64..2.0,
        ) {
            let mut config = DmpConfig::new(2, 8);
            config.y0 = Some(vec![start, -start]);
            config.goal = Some(vec![start + 1.0, 0.5]);
            let mut dmp = DiscreteDmp::with_weights(config.clone(), Array2::from_elem((2, 8), weight)).unwrap();
            dmp.rollout_with(&crate::RolloutOptions { timesteps: Some(steps), tau: Some(tau), error: 0.0 }).unwrap();
            dmp.reset_state();
            prop_assert_eq!(dmp.y(), dmp.y0());
            prop_assert!(dmp.dy().iter().all(|&v| v == 0.0));
            prop_assert!(dmp.ddy().iter().all(|&v| v == 0.0));
            prop_assert_eq!(dmp.phase(), 1.0);

            let mut rhythmic = RhythmicDmp::with_weights(config, Array2::from_elem((2, 8), weight)).unwrap();
            rhythmic.rollout_with(&crate::RolloutOptions { timesteps: Some(steps), tau: Some(tau), error: 0.0 }).unwrap();
            rhythmic.reset_state();
            prop_assert_eq!(rhythmic.y(), rhythmic.y0());
            prop_assert_eq!(rhythmic.phase(), 0.0);
        }

        #[test]
        fn zero_weights_approach_goal(
            start in -3.0f64..3.0,
            offset in 0.1f64..3.0,
        ) {
            let mut config = DmpConfig::new(1, 10);
            config.y0 = Some(vec![start]);
            config.goal = Some(vec![start + offset]);
            let mut dmp = DiscreteDmp::new(config).unwrap();
            let track = dmp.rollout().unwrap();
            let y = track.y.column(0);
            for k in 1..y.len() {
                prop_assert!(y[k] >= y[k - 1] - 1e-12);
            }
            let end = track.final_position().unwrap()[0];
            prop_assert!((end - (start + offset)).abs() < 1e-3 * offset.max(1.0));
        }
    }
}
