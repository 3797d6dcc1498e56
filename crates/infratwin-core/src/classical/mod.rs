//! Deterministic classical baseline solver.
//!
//! Always available and side-effect free: the governance layer relies on this
//! path as the unconditional fallback target, so it must never fail and must
//! return the same outcome for the same inputs.

use serde::{Deserialize, Serialize};

use crate::contract::{Action, ActionMode};
use crate::feature::Features;
use crate::registry::TwinState;

/// Outcome of one classical solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalOutcome {
    pub action: Action,
    pub objective: f64,
    pub confidence: f64,
}

/// Deterministic baseline policy/action generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClassicalSolver;

impl ClassicalSolver {
    /// Creates a solver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a safe damping action with its objective and confidence.
    ///
    /// The damping factor is the clipped magnitude of the first two state
    /// dimensions scaled by two; the objective charges both instability and
    /// the cost of acting; confidence degrades with first-dimension
    /// volatility.
    #[must_use]
    pub fn solve(&self, state: &TwinState, features: &Features) -> ClassicalOutcome {
        let magnitude = state.x1.abs() + state.x2.abs();
        let damp = (magnitude * 2.0).clamp(0.0, 5.0);
        let objective = -(1.2 * magnitude + 0.3 * state.x3.abs() + 0.05 * damp);
        let confidence = (0.85 - 0.10 * features.sig1).clamp(0.4, 0.9);
        ClassicalOutcome {
            action: Action {
                damp,
                mode: ActionMode::BaselineClassical,
            },
            objective,
            confidence,
        }
    }
}
