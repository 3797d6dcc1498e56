//! Online contextual bandit routing policy.
//!
//! A small linear model over a 6-dimensional feature projection scores the
//! quantum route. Learning is online and single-sample: one tanh-squashed
//! gradient step per orchestrated step, driven by the sign of the realized
//! reward. There is no replay buffer and no locking; correctness relies on
//! the orchestrator's strict step sequencing.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::contract::{RiskClass, Route, Sla};
use crate::feature::Features;

use super::{PolicyError, RouteIntent};

/// Dimensionality of the feature projection.
const PHI_DIM: usize = 6;

/// Learning rate of the single-sample gradient step.
const LEARNING_RATE: f64 = 0.05;

/// Default exploration probability.
pub(crate) const DEFAULT_EPSILON: f64 = 0.12;

/// Epsilon-greedy linear contextual bandit over the two routes.
#[derive(Debug)]
pub struct ContextualBanditPolicy {
    rng: StdRng,
    eps: f64,
    weights: [f64; PHI_DIM],
    bias: f64,
    update_count: u64,
}

impl ContextualBanditPolicy {
    /// Creates a bandit with the default exploration probability.
    pub fn new(seed: u64) -> Result<Self, PolicyError> {
        Self::with_epsilon(seed, DEFAULT_EPSILON)
    }

    /// Creates a bandit with an explicit exploration probability in `[0, 1]`.
    pub fn with_epsilon(seed: u64, eps: f64) -> Result<Self, PolicyError> {
        if !(0.0..=1.0).contains(&eps) || !eps.is_finite() {
            return Err(PolicyError::InvalidEpsilon { eps });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let init = Normal::new(0.0, 0.05).expect("finite normal parameters");
        let mut weights = [0.0; PHI_DIM];
        for w in &mut weights {
            *w = init.sample(&mut rng);
        }
        Ok(Self {
            rng,
            eps,
            weights,
            bias: 0.0,
            update_count: 0,
        })
    }

    /// Projects routing features and the SLA into the model's input space.
    fn phi(features: &Features, sla: &Sla) -> [f64; PHI_DIM] {
        [
            features.discrete_ratio,
            features.health,
            features.sig1.clamp(0.0, 1.0),
            features.sig2.clamp(0.0, 1.0),
            sla.deadline_ms as f64 / 60_000.0,
            if matches!(sla.risk_class, RiskClass::High | RiskClass::Medium) {
                1.0
            } else {
                0.0
            },
        ]
    }

    fn score(&self, phi: &[f64; PHI_DIM]) -> f64 {
        self.weights
            .iter()
            .zip(phi.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }

    /// Decides the intended route. CRITICAL risk forces the classical path;
    /// otherwise explores with probability epsilon and exploits the linear
    /// score elsewhere.
    pub fn choose(&mut self, features: &Features, sla: &Sla) -> RouteIntent {
        if sla.risk_class == RiskClass::Critical {
            return RouteIntent::Classical;
        }
        if self.rng.gen::<f64>() < self.eps {
            return if self.rng.gen::<f64>() < 0.5 {
                RouteIntent::Quantum
            } else {
                RouteIntent::Classical
            };
        }
        if self.score(&Self::phi(features, sla)) > 0.0 {
            RouteIntent::Quantum
        } else {
            RouteIntent::Classical
        }
    }

    /// Applies one gradient step using the realized reward of the step's
    /// outcome. Must be invoked exactly once per step.
    pub fn update(&mut self, features: &Features, sla: &Sla, _route: Route, reward: f64) {
        let phi = Self::phi(features, sla);
        let pred = self.score(&phi);
        // Positive reward pushes the score toward the quantum route.
        let target = if reward > 0.0 { 1.0 } else { -1.0 };
        let err = target - pred.tanh();
        for (w, x) in self.weights.iter_mut().zip(phi.iter()) {
            *w += LEARNING_RATE * err * x;
        }
        self.bias += LEARNING_RATE * err;
        self.update_count += 1;
    }

    /// Number of gradient steps applied so far.
    #[must_use]
    pub const fn updates(&self) -> u64 {
        self.update_count
    }

    /// Current weight vector (bias excluded).
    #[must_use]
    pub const fn weights(&self) -> &[f64; PHI_DIM] {
        &self.weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(discrete_ratio: f64, health: f64) -> Features {
        Features {
            mu1: 0.0,
            mu2: 0.0,
            mu3: 0.0,
            sig1: 0.1,
            sig2: 0.1,
            sig3: 0.1,
            discrete_ratio,
            health,
        }
    }

    fn sla(risk_class: RiskClass) -> Sla {
        Sla {
            deadline_ms: 20_000,
            max_queue_ms: 60_000,
            max_cost: 3.0,
            risk_class,
        }
    }

    #[test]
    fn test_epsilon_validation() {
        assert!(ContextualBanditPolicy::with_epsilon(1, 0.0).is_ok());
        assert!(ContextualBanditPolicy::with_epsilon(1, 1.0).is_ok());
        for eps in [-0.01, 1.01, f64::NAN] {
            assert!(matches!(
                ContextualBanditPolicy::with_epsilon(1, eps),
                Err(PolicyError::InvalidEpsilon { .. })
            ));
        }
    }

    #[test]
    fn test_critical_risk_never_routes_quantum() {
        let mut bandit = ContextualBanditPolicy::with_epsilon(7, 1.0).unwrap();
        for _ in 0..100 {
            assert_eq!(
                bandit.choose(&features(1.0, 1.0), &sla(RiskClass::Critical)),
                RouteIntent::Classical
            );
        }
    }

    #[test]
    fn test_zero_epsilon_is_deterministic_in_the_score() {
        let mut a = ContextualBanditPolicy::with_epsilon(7, 0.0).unwrap();
        let mut b = ContextualBanditPolicy::with_epsilon(7, 0.0).unwrap();
        let fx = features(0.8, 0.9);
        let contract = sla(RiskClass::Low);
        for _ in 0..50 {
            assert_eq!(a.choose(&fx, &contract), b.choose(&fx, &contract));
        }
    }

    #[test]
    fn test_positive_reward_pushes_score_toward_quantum() {
        let mut bandit = ContextualBanditPolicy::with_epsilon(7, 0.0).unwrap();
        let fx = features(0.9, 0.9);
        let contract = sla(RiskClass::Low);
        let phi = ContextualBanditPolicy::phi(&fx, &contract);
        let before = bandit.score(&phi);
        for _ in 0..200 {
            bandit.update(&fx, &contract, Route::Quantum, 1.0);
        }
        let after = bandit.score(&phi);
        assert!(after > before);
        assert!(after > 0.0);
    }

    #[test]
    fn test_negative_reward_pushes_score_toward_classical() {
        let mut bandit = ContextualBanditPolicy::with_epsilon(7, 0.0).unwrap();
        let fx = features(0.9, 0.9);
        let contract = sla(RiskClass::Low);
        for _ in 0..200 {
            bandit.update(&fx, &contract, Route::FallbackClassical, -1.0);
        }
        assert_eq!(bandit.choose(&fx, &contract), RouteIntent::Classical);
    }

    #[test]
    fn test_update_counter_tracks_every_step() {
        let mut bandit = ContextualBanditPolicy::new(7).unwrap();
        let fx = features(0.5, 0.5);
        let contract = sla(RiskClass::Low);
        for i in 1..=25 {
            bandit.update(&fx, &contract, Route::Classical, 0.1);
            assert_eq!(bandit.updates(), i);
        }
    }

    #[test]
    fn test_identical_seeds_yield_identical_weights() {
        let a = ContextualBanditPolicy::new(99).unwrap();
        let b = ContextualBanditPolicy::new(99).unwrap();
        assert_eq!(a.weights(), b.weights());
    }
}
