//! Routing policies: decide CLASSICAL vs QUANTUM intent for each step.
//!
//! Two implementations share the `choose(features, sla) -> RouteIntent`
//! capability: a static rule gate and an online contextual bandit. The
//! variant is selected once at orchestrator construction; the orchestrator
//! drives the bandit's learning with exactly one update per step using the
//! realized reward.

mod bandit;
mod rule;

pub use bandit::ContextualBanditPolicy;
pub use rule::RulePolicy;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::{Route, Sla};
use crate::feature::Features;

/// Routing intent emitted by a policy. Policies never emit the fallback
/// route; that is a governance outcome, not an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteIntent {
    Classical,
    Quantum,
}

impl RouteIntent {
    /// Returns the stable string form used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Classical => "CLASSICAL",
            Self::Quantum => "QUANTUM",
        }
    }
}

impl std::fmt::Display for RouteIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by policy construction. Out-of-range parameters are
/// configuration defects and always fatal.
#[derive(Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum PolicyError {
    /// Exploration probability outside `[0, 1]`.
    #[error("invalid exploration probability: {eps} (must be in [0, 1])")]
    InvalidEpsilon {
        /// The rejected value.
        eps: f64,
    },

    /// A threshold that must be a ratio lies outside `[0, 1]`.
    #[error("invalid {name} threshold: {value} (must be in [0, 1])")]
    InvalidThreshold {
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Tagged selection over the two routing policies, fixed at orchestrator
/// construction.
#[derive(Debug)]
pub enum PolicySelector {
    /// Static rule gate.
    Rule(RulePolicy),
    /// Online contextual bandit.
    Bandit(ContextualBanditPolicy),
}

impl PolicySelector {
    /// Policy name recorded in every [`ExecRecord`](crate::contract::ExecRecord).
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Rule(_) => "rule",
            Self::Bandit(_) => "bandit",
        }
    }

    /// Decides the intended route for the step.
    pub fn choose(&mut self, features: &Features, sla: &Sla) -> RouteIntent {
        match self {
            Self::Rule(policy) => policy.choose(features, sla),
            Self::Bandit(policy) => policy.choose(features, sla),
        }
    }

    /// Feeds the realized reward back into the learner. A no-op for the rule
    /// policy; must be called exactly once per step by the orchestrator.
    pub fn learn(&mut self, features: &Features, sla: &Sla, route: Route, reward: f64) {
        if let Self::Bandit(policy) = self {
            policy.update(features, sla, route, reward);
        }
    }

    /// Number of learning updates applied so far, when the policy learns.
    #[must_use]
    pub const fn update_count(&self) -> Option<u64> {
        match self {
            Self::Rule(_) => None,
            Self::Bandit(policy) => Some(policy.updates()),
        }
    }
}
