//! Perturbation Engine: draws one correlated Monte Carlo scenario from a
//! center vector and a [`ModelDescriptor`] (§4.3).
//!
//! Two passes, both driven by the same [`DeterministicRng`] instance so a
//! run seeded identically always produces an identical scenario sequence
//! (§8 Testable Property 4, Scenario D).

use engine_core::{ModelDescriptor, VariableVector};

use crate::rng::DeterministicRng;

fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.max(lo).min(hi)
}

/// Draw one scenario from `center` using `descriptor`'s per-variable
/// perturbation specs. `rng` is owned exclusively by the caller's Monte
/// Carlo run (§5: "The PRNG inside a Monte Carlo run is owned exclusively
/// by that run").
pub fn perturb(center: &VariableVector, descriptor: &ModelDescriptor, rng: &mut DeterministicRng) -> VariableVector {
    let mut normal_cache: Option<f64> = None;
    let mut pass1 = center.clone();

    for (i, spec) in descriptor.perturbations.iter().enumerate() {
        if spec.sigma > 0.0 {
            let z = rng.next_standard_normal(&mut normal_cache);
            pass1[i] = clamp(center[i] + z * spec.sigma, spec.lo, spec.hi);
        } else if spec.lo > 0.0 {
            // σ = 0 and lo doubles as a flip probability (§3 encoding convention).
            let p = spec.lo.min(1.0);
            if rng.next_uniform() < p {
                pass1[i] = 1.0 - center[i];
            }
            // else unchanged: pass1[i] already equals center[i].
        }
        // else: identity, pass1[i] already equals center[i].
    }

    let mut pass2 = pass1.clone();
    for (i, spec) in descriptor.perturbations.iter().enumerate() {
        if spec.sigma > 0.0 && !spec.correlations.is_empty() {
            let mut adjustment = 0.0;
            for link in &spec.correlations {
                let j = link.var_idx as usize;
                let delta_j = pass1[j] - center[j];
                adjustment += link.coefficient * delta_j;
            }
            pass2[i] = clamp(pass1[i] + adjustment, spec.lo, spec.hi);
        }
    }

    pass2
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{CorrelationLink, ObjectiveMode, PerturbationSpec};

    fn descriptor_with(perturbations: Vec<PerturbationSpec>) -> ModelDescriptor {
        ModelDescriptor {
            n_vars: perturbations.len() as u16,
            routes: vec![],
            constraints: vec![],
            objective_mode: ObjectiveMode::MaxProfit,
            risk_aversion: 0.0,
            profit_floor: 0.0,
            perturbations,
        }
    }

    #[test]
    fn identity_spec_leaves_variable_unchanged() {
        let descriptor = descriptor_with(vec![PerturbationSpec::identity()]);
        let center = vec![42.0];
        let mut rng = DeterministicRng::seed_from_chunks(1, 2);
        let out = perturb(&center, &descriptor, &mut rng);
        assert_eq!(out[0], 42.0);
    }

    #[test]
    fn sigma_zero_and_lo_zero_is_deterministically_unchanged() {
        let descriptor = descriptor_with(vec![PerturbationSpec {
            sigma: 0.0,
            lo: 0.0,
            hi: 0.0,
            correlations: vec![],
        }]);
        let center = vec![1.0];
        for seed in [(1, 1), (99, 2), (7, 77)] {
            let mut rng = DeterministicRng::seed_from_chunks(seed.0, seed.1);
            let out = perturb(&center, &descriptor, &mut rng);
            assert_eq!(out[0], 1.0);
        }
    }

    #[test]
    fn normal_jitter_stays_within_clamp() {
        let descriptor = descriptor_with(vec![PerturbationSpec {
            sigma: 50.0,
            lo: 90.0,
            hi: 110.0,
            correlations: vec![],
        }]);
        let center = vec![100.0];
        let mut rng = DeterministicRng::seed_from_chunks(5, 6);
        for _ in 0..500 {
            let out = perturb(&center, &descriptor, &mut rng);
            assert!(out[0] >= 90.0 && out[0] <= 110.0);
        }
    }

    #[test]
    fn boolean_flip_probability_one_always_flips() {
        let descriptor = descriptor_with(vec![PerturbationSpec {
            sigma: 0.0,
            lo: 1.0,
            hi: 1.0,
            correlations: vec![],
        }]);
        let center = vec![0.0];
        let mut rng = DeterministicRng::seed_from_chunks(3, 3);
        let out = perturb(&center, &descriptor, &mut rng);
        assert_eq!(out[0], 1.0);
    }

    #[test]
    fn boolean_flip_probability_zero_never_flips() {
        let descriptor = descriptor_with(vec![PerturbationSpec {
            sigma: 0.0,
            lo: 0.0,
            hi: 0.0,
            correlations: vec![],
        }]);
        let center = vec![0.0];
        let mut rng = DeterministicRng::seed_from_chunks(9, 9);
        for _ in 0..200 {
            let out = perturb(&center, &descriptor, &mut rng);
            assert_eq!(out[0], 0.0);
        }
    }

    #[test]
    fn correlated_variable_follows_driver_delta() {
        let descriptor = descriptor_with(vec![
            PerturbationSpec {
                sigma: 10.0,
                lo: -1000.0,
                hi: 1000.0,
                correlations: vec![],
            },
            PerturbationSpec {
                sigma: 1.0, // non-zero sigma so pass 2 considers it, but its own jitter is deterministic via seed replay below
                lo: -1000.0,
                hi: 1000.0,
                correlations: vec![CorrelationLink {
                    var_idx: 0,
                    coefficient: 2.0,
                }],
            },
        ]);
        let center = vec![100.0, 50.0];
        let mut rng = DeterministicRng::seed_from_chunks(11, 12);
        let out = perturb(&center, &descriptor, &mut rng);
        let delta0 = out[0] - center[0];
        // var 1's pass-1 jitter plus 2x var 0's delta, still within clamp.
        assert!(out[1] >= -1000.0 && out[1] <= 1000.0);
        assert!(delta0.abs() < 1000.0);
    }

    #[test]
    fn same_seed_produces_identical_scenario() {
        let descriptor = descriptor_with(vec![PerturbationSpec {
            sigma: 20.0,
            lo: 0.0,
            hi: 500.0,
            correlations: vec![],
        }]);
        let center = vec![250.0];
        let mut rng_a = DeterministicRng::seed_from_chunks(77, 88);
        let mut rng_b = DeterministicRng::seed_from_chunks(77, 88);
        let a = perturb(&center, &descriptor, &mut rng_a);
        let b = perturb(&center, &descriptor, &mut rng_b);
        assert_eq!(a, b);
    }
}
