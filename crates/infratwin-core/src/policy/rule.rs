//! Static rule-gate routing policy.

use crate::contract::{RiskClass, Sla};
use crate::feature::Features;

use super::{PolicyError, RouteIntent};

/// Hard-gated rule policy.
///
/// CRITICAL risk or low health always forces the classical path; otherwise
/// the quantum path is chosen only when the twin's regime looks sufficiently
/// combinatorial and the deadline leaves enough slack for a remote attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RulePolicy {
    min_discrete_ratio: f64,
    min_health: f64,
    min_deadline_ms: u64,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            min_discrete_ratio: 0.6,
            min_health: 0.25,
            min_deadline_ms: 15_000,
        }
    }
}

impl RulePolicy {
    /// Creates a policy with custom gates. Ratio thresholds must lie in
    /// `[0, 1]`.
    pub fn new(
        min_discrete_ratio: f64,
        min_health: f64,
        min_deadline_ms: u64,
    ) -> Result<Self, PolicyError> {
        if !(0.0..=1.0).contains(&min_discrete_ratio) {
            return Err(PolicyError::InvalidThreshold {
                name: "min_discrete_ratio",
                value: min_discrete_ratio,
            });
        }
        if !(0.0..=1.0).contains(&min_health) {
            return Err(PolicyError::InvalidThreshold {
                name: "min_health",
                value: min_health,
            });
        }
        Ok(Self {
            min_discrete_ratio,
            min_health,
            min_deadline_ms,
        })
    }

    /// Decides the intended route.
    #[must_use]
    pub fn choose(&self, features: &Features, sla: &Sla) -> RouteIntent {
        if sla.risk_class == RiskClass::Critical {
            return RouteIntent::Classical;
        }
        if features.health < self.min_health {
            return RouteIntent::Classical;
        }
        if features.discrete_ratio >= self.min_discrete_ratio
            && sla.deadline_ms >= self.min_deadline_ms
        {
            return RouteIntent::Quantum;
        }
        RouteIntent::Classical
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

    fn sla(risk_class: RiskClass, deadline_ms: u64) -> Sla {
        Sla {
            deadline_ms,
            max_queue_ms: 60_000,
            max_cost: 3.0,
            risk_class,
        }
    }

    #[test]
    fn test_critical_risk_always_forces_classical() {
        let policy = RulePolicy::default();
        let ready = features(1.0, 1.0);
        assert_eq!(
            policy.choose(&ready, &sla(RiskClass::Critical, 60_000)),
            RouteIntent::Classical
        );
    }

    #[test]
    fn test_low_health_forces_classical() {
        let policy = RulePolicy::default();
        assert_eq!(
            policy.choose(&features(1.0, 0.2), &sla(RiskClass::Low, 60_000)),
            RouteIntent::Classical
        );
    }

    #[test]
    fn test_quantum_requires_discrete_regime_and_slack() {
        let policy = RulePolicy::default();
        let sla_ok = sla(RiskClass::Low, 20_000);
        assert_eq!(
            policy.choose(&features(0.7, 0.9), &sla_ok),
            RouteIntent::Quantum
        );
        assert_eq!(
            policy.choose(&features(0.5, 0.9), &sla_ok),
            RouteIntent::Classical
        );
        assert_eq!(
            policy.choose(&features(0.7, 0.9), &sla(RiskClass::Low, 10_000)),
            RouteIntent::Classical
        );
    }

    #[test]
    fn test_threshold_validation() {
        assert!(RulePolicy::new(0.0, 0.0, 0).is_ok());
        assert!(matches!(
            RulePolicy::new(1.5, 0.25, 15_000),
            Err(PolicyError::InvalidThreshold { name: "min_discrete_ratio", .. })
        ));
        assert!(matches!(
            RulePolicy::new(0.6, -0.1, 15_000),
            Err(PolicyError::InvalidThreshold { name: "min_health", .. })
        ));
    }
}
