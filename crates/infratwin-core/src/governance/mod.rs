//! Governance layer: latency control, fallback triggers, result validation.
//!
//! All three components are pure predicate/decision functions over timing and
//! result metadata. They never mutate anything and never fail; unsafe
//! outcomes surface as reason codes that the orchestrator records and acts
//! on. Validation is fail-closed: anything not positively verifiable is
//! invalid.

use serde::{Deserialize, Serialize};

use crate::contract::{JobStatus, QuantumResult};

/// Default ceiling on the noise proxy before a quantum result is rejected.
pub const DEFAULT_MAX_NOISE: f64 = 0.15;

/// Reason codes recorded whenever a step falls back, is invalidated, or
/// breaches its SLA. String forms are stable audit identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FallbackReason {
    /// The gateway job reached a terminal FAILED state.
    JobFailed,
    /// The attempt was cancelled (deadline-driven, synthesized locally).
    JobCancelled,
    /// Queue time exceeded the SLA's maximum.
    QueueTimeout,
    /// Cost proxy exceeded the SLA's maximum.
    CostBreach,
    /// Noise proxy exceeded the configured ceiling.
    NoiseTooHigh,
    /// Result status was not SUCCEEDED.
    NotSucceeded,
    /// Result carried no decision object.
    MissingDecision,
    /// The decision's damping value was absent or outside `[0, 5]`.
    DecisionOutOfBounds,
    /// Result carried no objective value.
    MissingObjective,
    /// Umbrella code set whenever the validator rejected the result.
    ResultInvalid,
    /// The whole step exceeded its latency deadline.
    SlaBreach,
}

impl FallbackReason {
    /// Returns the stable string form used in records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::JobFailed => "JOB_FAILED",
            Self::JobCancelled => "JOB_CANCELLED",
            Self::QueueTimeout => "QUEUE_TIMEOUT",
            Self::CostBreach => "COST_BREACH",
            Self::NoiseTooHigh => "NOISE_TOO_HIGH",
            Self::NotSucceeded => "NOT_SUCCEEDED",
            Self::MissingDecision => "MISSING_DECISION",
            Self::DecisionOutOfBounds => "DECISION_OUT_OF_BOUNDS",
            Self::MissingObjective => "MISSING_OBJECTIVE",
            Self::ResultInvalid => "RESULT_INVALID",
            Self::SlaBreach => "SLA_BREACH",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pure latency deadline predicate.
#[derive(Debug, Clone, Copy)]
pub struct LatencyController {
    deadline_ms: u64,
}

impl LatencyController {
    /// Creates a controller for a fixed per-step deadline.
    #[must_use]
    pub const fn new(deadline_ms: u64) -> Self {
        Self { deadline_ms }
    }

    /// Returns `true` if `elapsed_ms` exceeds the deadline.
    #[must_use]
    pub const fn breach(&self, elapsed_ms: u64) -> bool {
        elapsed_ms > self.deadline_ms
    }
}

/// Multi-reason fallback decision over a quantum attempt's metadata.
///
/// Reasons are independent and additive; any non-empty reason set triggers a
/// fallback.
#[derive(Debug, Clone, Copy)]
pub struct FallbackManager {
    max_queue_ms: u64,
    max_cost: f64,
    max_noise: f64,
}

impl FallbackManager {
    /// Creates a manager with the default noise ceiling.
    #[must_use]
    pub const fn new(max_queue_ms: u64, max_cost: f64) -> Self {
        Self {
            max_queue_ms,
            max_cost,
            max_noise: DEFAULT_MAX_NOISE,
        }
    }

    /// Overrides the noise ceiling.
    #[must_use]
    pub const fn with_max_noise(mut self, max_noise: f64) -> Self {
        self.max_noise = max_noise;
        self
    }

    /// Evaluates all fallback triggers against the attempt's metadata.
    /// Absent metadata (`None`) does not trigger the corresponding reason.
    #[must_use]
    pub fn should_fallback(
        &self,
        status: JobStatus,
        queue_ms: Option<u64>,
        cost: Option<f64>,
        noise: Option<f64>,
    ) -> (bool, Vec<FallbackReason>) {
        let mut reasons = Vec::new();
        match status {
            JobStatus::Failed => reasons.push(FallbackReason::JobFailed),
            JobStatus::Cancelled => reasons.push(FallbackReason::JobCancelled),
            _ => {},
        }
        if queue_ms.is_some_and(|q| q > self.max_queue_ms) {
            reasons.push(FallbackReason::QueueTimeout);
        }
        if cost.is_some_and(|c| c > self.max_cost) {
            reasons.push(FallbackReason::CostBreach);
        }
        if noise.is_some_and(|n| n > self.max_noise) {
            reasons.push(FallbackReason::NoiseTooHigh);
        }
        (!reasons.is_empty(), reasons)
    }
}

/// Fail-closed structural validation of a quantum result.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResultValidator;

impl ResultValidator {
    /// Creates a validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a result. A non-SUCCEEDED status short-circuits with
    /// `NOT_SUCCEEDED`; otherwise the decision object, its damping bounds,
    /// and the objective value are all required.
    #[must_use]
    pub fn validate(&self, result: &QuantumResult) -> (bool, Vec<FallbackReason>) {
        let mut reasons = Vec::new();
        if result.status != JobStatus::Succeeded {
            reasons.push(FallbackReason::NotSucceeded);
            return (false, reasons);
        }

        let solution = result.solution.as_ref();
        match solution.and_then(|s| s.decision.as_ref()) {
            None => reasons.push(FallbackReason::MissingDecision),
            Some(decision) => {
                if !decision.damp.is_finite() || !(0.0..=5.0).contains(&decision.damp) {
                    reasons.push(FallbackReason::DecisionOutOfBounds);
                }
            },
        }
        if solution.and_then(|s| s.objective_value).is_none() {
            reasons.push(FallbackReason::MissingObjective);
        }
        (reasons.is_empty(), reasons)
    }
}
