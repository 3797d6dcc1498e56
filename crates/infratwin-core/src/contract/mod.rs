//! Data contracts shared across the decision loop.
//!
//! Every type here is serde-serializable: the `qre_json` / `result_json`
//! audit fields in [`ExecRecord`] are frozen `serde_json` snapshots of the
//! envelope exactly as submitted and the result exactly as received, and the
//! export collaborator consumes the history as a flat table.
//!
//! String forms of the enums are stable SCREAMING_SNAKE identifiers; they are
//! part of the audit record format and must not change casually.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::governance::FallbackReason;

/// Version tag carried by every [`Qre`].
pub const QRE_VERSION: &str = "1.0";

/// One telemetry sample produced externally per twin per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Identifier of the producing twin/agent.
    pub source_id: String,
    /// Sample timestamp.
    pub ts: DateTime<Utc>,
    /// Named signal values (`x1`, `x2`, `x3`, ...).
    pub values: HashMap<String, f64>,
}

/// Risk classification derived from twin health each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskClass {
    Critical,
    High,
    Medium,
    Low,
}

impl RiskClass {
    /// Returns the stable string form used in records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl std::fmt::Display for RiskClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved execution path of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Route {
    Classical,
    Quantum,
    FallbackClassical,
}

impl Route {
    /// Returns the stable string form used in records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Classical => "CLASSICAL",
            Self::Quantum => "QUANTUM",
            Self::FallbackClassical => "FALLBACK_CLASSICAL",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle status of a gateway job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Returns `true` once the job can no longer change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns the stable string form used in records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-step latency/cost/risk contract. Derived fresh each step from the
/// current risk classification; never persisted across steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sla {
    /// Hard latency deadline for the whole step, in milliseconds.
    pub deadline_ms: u64,
    /// Maximum tolerated gateway queue time, in milliseconds.
    pub max_queue_ms: u64,
    /// Maximum tolerated cost proxy for a quantum attempt.
    pub max_cost: f64,
    /// Risk classification the contract was derived from.
    pub risk_class: RiskClass,
}

/// Quantum algorithm selector carried in a [`QuantumConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Algorithm {
    Qaoa,
    Vqe,
    Sampling,
}

/// Preferred backend kinds, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendKind {
    Qpu,
    Simulator,
}

/// Static-ish parameters for one quantum submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantumConfig {
    pub algorithm: Algorithm,
    pub shots: u32,
    pub depth: u32,
    pub backend_preference: Vec<BackendKind>,
    pub seed: u64,
}

impl Default for QuantumConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Qaoa,
            shots: 2000,
            depth: 3,
            backend_preference: vec![BackendKind::Qpu, BackendKind::Simulator],
            seed: 42,
        }
    }
}

/// Sparse synthetic QUBO payload emitted by the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProblemStub {
    /// Linear biases as `(variable, bias)` pairs.
    pub linear: Vec<(String, f64)>,
    /// Quadratic couplings as `((variable, variable), weight)` pairs.
    pub quadratic: Vec<((String, String), f64)>,
}

/// A named constraint hint forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintHint {
    pub name: String,
    pub kind: String,
    pub weight: f64,
}

/// The combinatorial problem payload of a [`Qre`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSpec {
    /// Problem family, e.g. `COMBINATORIAL_OPT`.
    pub kind: String,
    /// Encoding form, e.g. `QUBO`.
    pub form: String,
    /// Objective descriptor.
    pub objective: String,
    /// Number of symbolic variables.
    pub variables: usize,
    /// The discrete-regime proxy the sizing was derived from.
    pub discrete_ratio: f64,
    /// Sparse synthetic payload.
    pub qubo: ProblemStub,
    /// Constraint hints forwarded opaquely.
    pub constraints_hint: Vec<ConstraintHint>,
}

/// Snapshot of the twin the envelope was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinContext {
    pub twin_id: String,
    pub level: String,
    pub topology_ref: String,
    pub timestamp: DateTime<Utc>,
}

/// Declared fallback behavior carried for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackSpec {
    /// Fallback policy identifier, e.g. `CLASSICAL_ON_FAILURE`.
    pub policy: String,
    /// Reason codes that trigger the fallback.
    pub reasons_to_trigger: Vec<FallbackReason>,
}

/// Correlation metadata tying an envelope to a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceContext {
    pub correlation_id: String,
    pub step_id: u64,
}

/// Quantum Request Envelope: the full request sent to the gateway.
/// Immutable once built; one per quantum attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qre {
    pub qre_version: String,
    pub twin_context: TwinContext,
    pub problem: ProblemSpec,
    pub sla: Sla,
    pub quantum_config: QuantumConfig,
    pub fallback: FallbackSpec,
    pub trace: TraceContext,
}

/// Control action applied back to a twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Damping factor in `[0, 5]`.
    pub damp: f64,
    /// Which path produced the action.
    pub mode: ActionMode,
}

/// Origin of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    BaselineClassical,
    QuantumCandidate,
}

/// Backend metadata attached to a [`QuantumResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendMeta {
    pub provider: String,
    pub backend_id: String,
    pub mode: BackendKind,
    /// Sampled queue time in milliseconds, when known.
    pub queue_ms: Option<u64>,
    /// Modeled execution time in milliseconds, when known.
    pub exec_ms: Option<u64>,
}

/// Candidate solution returned by the backend.
///
/// Fields are optional on purpose: this mirrors a remote wire payload, and
/// the [`ResultValidator`](crate::governance::ResultValidator) fails closed
/// on anything absent or out of bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Solution {
    pub best_bitstring: Option<String>,
    pub decision: Option<Action>,
    pub objective_value: Option<f64>,
    pub confidence: Option<f64>,
}

/// Diagnostics attached to a [`QuantumResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Diagnostics {
    pub shots: Option<u32>,
    pub depth: Option<u32>,
    pub noise_proxy: Option<f64>,
    pub cost: Option<f64>,
}

/// Normalized outcome of one quantum attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumResult {
    pub correlation_id: String,
    pub step_id: u64,
    pub backend: BackendMeta,
    pub status: JobStatus,
    pub solution: Option<Solution>,
    pub diagnostics: Diagnostics,
    pub error: Option<String>,
}

/// Audit-grade record of one orchestrated step. Append-only; immutable once
/// appended to the registry history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecRecord {
    pub step_id: u64,
    pub ts: DateTime<Utc>,
    pub twin_id: String,
    pub route: Route,
    /// Name of the routing policy in effect (`rule` or `bandit`).
    pub policy: String,
    /// Gateway queue time for the quantum attempt, if one was made.
    pub queue_ms: Option<u64>,
    /// Total elapsed wall time of the step, in milliseconds.
    pub elapsed_ms: u64,
    pub latency_breach: bool,
    pub fallback_reasons: Vec<FallbackReason>,
    pub objective_value: f64,
    pub confidence: f64,
    pub noise_proxy: Option<f64>,
    pub cost: Option<f64>,
    /// Frozen JSON snapshot of the submitted [`Qre`], for audit.
    pub qre_json: Option<String>,
    /// Frozen JSON snapshot of the received [`QuantumResult`], for audit.
    pub result_json: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_string_forms_are_stable() {
        assert_eq!(Route::Classical.as_str(), "CLASSICAL");
        assert_eq!(Route::Quantum.as_str(), "QUANTUM");
        assert_eq!(Route::FallbackClassical.as_str(), "FALLBACK_CLASSICAL");
        assert_eq!(RiskClass::Critical.as_str(), "CRITICAL");
        assert_eq!(JobStatus::Cancelled.as_str(), "CANCELLED");
    }

    #[test]
    fn test_job_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_route_serializes_screaming_snake() {
        let json = serde_json::to_string(&Route::FallbackClassical).unwrap();
        assert_eq!(json, "\"FALLBACK_CLASSICAL\"");
        let back: Route = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Route::FallbackClassical);
    }

    #[test]
    fn test_exec_record_round_trips_with_absent_audit_fields() {
        let record = ExecRecord {
            step_id: 1,
            ts: Utc::now(),
            twin_id: "infra:asset:001".to_string(),
            route: Route::Classical,
            policy: "rule".to_string(),
            queue_ms: None,
            elapsed_ms: 3,
            latency_breach: false,
            fallback_reasons: vec![],
            objective_value: -1.25,
            confidence: 0.8,
            noise_proxy: None,
            cost: None,
            qre_json: None,
            result_json: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: ExecRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
