//! Hybrid orchestrator: the per-step state machine composing feature
//! extraction, risk classification, routing, the quantum attempt, and
//! governance into exactly one `(Action, ExecRecord)` pair per step.
//!
//! # State machine per step
//!
//! 1. Extract features; classify risk from health; derive the SLA.
//! 2. Ask the configured policy for the intended route.
//! 3. Always run the classical solver so a safe result exists
//!    unconditionally.
//! 4. On QUANTUM intent: build and freeze the envelope, submit, poll
//!    cooperatively until a terminal status or 90 % of the deadline
//!    (then synthesize CANCELLED locally), fetch and freeze the result,
//!    evaluate fallback triggers and validation, and either adopt the
//!    quantum outcome or revert to the precomputed classical one.
//! 5. Check the latency deadline; a breach records `SLA_BREACH` and
//!    downgrades a still-QUANTUM route to FALLBACK_CLASSICAL.
//! 6. With the bandit policy, apply exactly one learning update using the
//!    realized reward.
//!
//! Operational faults are recovered locally and surface only as
//! `fallback_reasons` and `latency_breach` on the record. Errors returned
//! from [`HybridOrchestrator::step`] always indicate configuration or
//! programming defects.

use std::sync::Arc;

use thiserror::Error;

use crate::classical::{ClassicalOutcome, ClassicalSolver};
use crate::clock::Clock;
use crate::contract::{
    ConstraintHint, ExecRecord, FallbackSpec, JobStatus, ProblemSpec, Qre, QuantumConfig,
    RiskClass, Route, Sla, TraceContext, TwinContext, QRE_VERSION,
};
use crate::feature::{FeatureExtractor, Features};
use crate::gateway::{GatewayError, QuantumGateway};
use crate::governance::{FallbackManager, FallbackReason, LatencyController, ResultValidator};
use crate::policy::{PolicyError, PolicySelector, RouteIntent};
use crate::registry::TwinState;

/// Smallest and largest synthetic problem sizes; actual size grows linearly
/// with the discrete-regime proxy.
const MIN_PROBLEM_VARS: usize = 200;
const PROBLEM_VARS_SPAN: f64 = 1_400.0;

/// Errors raised by orchestrator construction and stepping. All of these are
/// configuration or programming defects; operational faults never surface
/// here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OrchestratorError {
    /// Constructor parameters are out of range.
    #[error("invalid orchestrator configuration: {reason}")]
    InvalidConfig {
        /// What is out of range.
        reason: String,
    },

    /// `step_id` must be strictly increasing per orchestrator instance.
    #[error("non-monotonic step id {step_id}: last processed was {last}")]
    NonMonotonicStepId {
        /// The offending step id.
        step_id: u64,
        /// The last accepted step id.
        last: u64,
    },

    /// The gateway rejected an envelope or handle.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Policy construction failed.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// An audit snapshot could not be serialized.
    #[error("failed to freeze audit snapshot: {0}")]
    Audit(#[from] serde_json::Error),
}

/// Tunable parameters of the per-step state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Cooperative wait between gateway polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Fraction of the SLA deadline after which a pending quantum attempt is
    /// force-cancelled. In `(0, 1]`.
    pub deadline_fraction: f64,
    /// Noise ceiling handed to the fallback manager.
    pub max_noise: f64,
    /// Shots requested per quantum submission.
    pub quantum_shots: u32,
    /// Circuit depth requested per quantum submission.
    pub quantum_depth: u32,
    /// When set, replaces the risk-derived SLA deadline. Must be non-zero.
    pub sla_deadline_override_ms: Option<u64>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 20,
            deadline_fraction: 0.90,
            max_noise: crate::governance::DEFAULT_MAX_NOISE,
            quantum_shots: 2000,
            quantum_depth: 3,
            sla_deadline_override_ms: None,
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<(), OrchestratorError> {
        if self.poll_interval_ms == 0 {
            return Err(OrchestratorError::InvalidConfig {
                reason: "poll_interval_ms must be >= 1".to_string(),
            });
        }
        if !(self.deadline_fraction > 0.0 && self.deadline_fraction <= 1.0) {
            return Err(OrchestratorError::InvalidConfig {
                reason: format!(
                    "deadline_fraction {} outside (0, 1]",
                    self.deadline_fraction
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.max_noise) {
            return Err(OrchestratorError::InvalidConfig {
                reason: format!("max_noise {} outside [0, 1]", self.max_noise),
            });
        }
        if self.quantum_shots == 0 {
            return Err(OrchestratorError::InvalidConfig {
                reason: "quantum_shots must be >= 1".to_string(),
            });
        }
        if self.quantum_depth == 0 {
            return Err(OrchestratorError::InvalidConfig {
                reason: "quantum_depth must be >= 1".to_string(),
            });
        }
        if self.sla_deadline_override_ms == Some(0) {
            return Err(OrchestratorError::InvalidConfig {
                reason: "sla_deadline_override_ms must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Result of one orchestrated step: the action to apply to the twin and the
/// audit record to append to the history.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub action: crate::contract::Action,
    pub record: ExecRecord,
}

/// Per-step control plane over one gateway, one extractor, and one policy.
///
/// Steps are strictly sequential and not re-entrant; the only suspension
/// point is the cooperative poll loop of a quantum attempt.
#[derive(Debug)]
pub struct HybridOrchestrator<G: QuantumGateway> {
    gateway: G,
    classical: ClassicalSolver,
    extractor: FeatureExtractor,
    policy: PolicySelector,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    last_step_id: Option<u64>,
}

impl<G: QuantumGateway> HybridOrchestrator<G> {
    /// Creates an orchestrator. The routing policy is fixed for the lifetime
    /// of the instance.
    pub fn new(
        gateway: G,
        extractor: FeatureExtractor,
        policy: PolicySelector,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            gateway,
            classical: ClassicalSolver::new(),
            extractor,
            policy,
            clock,
            config,
            last_step_id: None,
        })
    }

    /// The active routing policy.
    #[must_use]
    pub const fn policy(&self) -> &PolicySelector {
        &self.policy
    }

    /// The gateway behind this orchestrator.
    #[must_use]
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    fn classify_risk(health: f64) -> RiskClass {
        if health < 0.15 {
            RiskClass::Critical
        } else if health < 0.35 {
            RiskClass::High
        } else if health < 0.60 {
            RiskClass::Medium
        } else {
            RiskClass::Low
        }
    }

    fn derive_sla(&self, risk_class: RiskClass) -> Sla {
        let deadline_ms = self.config.sla_deadline_override_ms.unwrap_or(match risk_class {
            RiskClass::High => 25_000,
            _ => 20_000,
        });
        Sla {
            deadline_ms,
            max_queue_ms: 60_000,
            max_cost: 3.0,
            risk_class,
        }
    }

    fn build_qre(
        &self,
        state: &TwinState,
        features: &Features,
        sla: &Sla,
        step_id: u64,
        correlation_id: &str,
    ) -> Qre {
        // Problem size grows with how combinatorial the regime looks.
        let n_vars = MIN_PROBLEM_VARS
            + (PROBLEM_VARS_SPAN * features.discrete_ratio.clamp(0.0, 1.0)) as usize;
        let qubo = self.extractor.build_problem_stub(features, n_vars);

        Qre {
            qre_version: QRE_VERSION.to_string(),
            twin_context: TwinContext {
                twin_id: state.twin_id.clone(),
                level: state.level.as_str().to_string(),
                topology_ref: state.topology_ref.clone(),
                timestamp: state.ts,
            },
            problem: ProblemSpec {
                kind: "COMBINATORIAL_OPT".to_string(),
                form: "QUBO".to_string(),
                objective: "min_cost_with_constraints".to_string(),
                variables: n_vars,
                discrete_ratio: features.discrete_ratio,
                qubo,
                constraints_hint: vec![
                    ConstraintHint {
                        name: "stability".to_string(),
                        kind: "penalty".to_string(),
                        weight: 10.0,
                    },
                    ConstraintHint {
                        name: "safety_bounds".to_string(),
                        kind: "hard_or_penalty".to_string(),
                        weight: 50.0,
                    },
                ],
            },
            sla: sla.clone(),
            quantum_config: QuantumConfig {
                shots: self.config.quantum_shots,
                depth: self.config.quantum_depth,
                ..QuantumConfig::default()
            },
            fallback: FallbackSpec {
                policy: "CLASSICAL_ON_FAILURE".to_string(),
                reasons_to_trigger: vec![
                    FallbackReason::QueueTimeout,
                    FallbackReason::JobFailed,
                    FallbackReason::NoiseTooHigh,
                    FallbackReason::CostBreach,
                    FallbackReason::SlaBreach,
                ],
            },
            trace: TraceContext {
                correlation_id: correlation_id.to_string(),
                step_id,
            },
        }
    }

    /// Executes one step against the twin's current state.
    ///
    /// Always produces exactly one action and one record; gateway failures
    /// and invalid results are recovered via fallback and never raised.
    pub fn step(
        &mut self,
        state: &TwinState,
        step_id: u64,
        correlation_id: &str,
    ) -> Result<StepOutcome, OrchestratorError> {
        if let Some(last) = self.last_step_id {
            if step_id <= last {
                return Err(OrchestratorError::NonMonotonicStepId { step_id, last });
            }
        }
        self.last_step_id = Some(step_id);

        let t0 = self.clock.now_ms();
        let features = self.extractor.update(state);
        let risk_class = Self::classify_risk(features.health);
        let sla = self.derive_sla(risk_class);

        let intent = self.policy.choose(&features, &sla);
        tracing::debug!(
            step_id,
            twin_id = %state.twin_id,
            risk = risk_class.as_str(),
            intent = intent.as_str(),
            policy = self.policy.name(),
            "route decided"
        );

        let latency = LatencyController::new(sla.deadline_ms);
        let fallback_mgr = FallbackManager::new(sla.max_queue_ms, sla.max_cost)
            .with_max_noise(self.config.max_noise);
        let validator = ResultValidator::new();

        // The classical outcome is always computed so a safe result exists
        // unconditionally.
        let classical = self.classical.solve(state, &features);

        let mut route = Route::Classical;
        let ClassicalOutcome {
            mut action,
            mut objective,
            mut confidence,
        } = classical.clone();
        let mut reasons: Vec<FallbackReason> = Vec::new();
        let mut queue_ms = None;
        let mut noise_proxy = None;
        let mut cost = None;
        let mut qre_json = None;
        let mut result_json = None;

        if intent == RouteIntent::Quantum {
            let qre = self.build_qre(state, &features, &sla, step_id, correlation_id);
            qre_json = Some(serde_json::to_string(&qre)?);

            let handle = self.gateway.submit(&qre)?;
            let poll_budget_ms =
                (self.config.deadline_fraction * sla.deadline_ms as f64) as u64;

            let mut cancelled = false;
            loop {
                let status = self.gateway.poll(&handle)?;
                if status.is_terminal() {
                    break;
                }
                if self.clock.now_ms().saturating_sub(t0) > poll_budget_ms {
                    // Deadline-driven cancellation is synthesized locally;
                    // the gateway is not contacted again to flip state.
                    cancelled = true;
                    break;
                }
                self.clock.sleep_ms(self.config.poll_interval_ms);
            }

            let result = self.gateway.get_result(&handle)?;
            result_json = Some(serde_json::to_string(&result)?);

            let governed_status = if cancelled {
                JobStatus::Cancelled
            } else {
                result.status
            };
            queue_ms = result.backend.queue_ms;
            noise_proxy = result.diagnostics.noise_proxy;
            cost = result.diagnostics.cost;

            let (must_fallback, trigger_reasons) =
                fallback_mgr.should_fallback(governed_status, queue_ms, cost, noise_proxy);
            let (valid, validation_reasons) = validator.validate(&result);

            for reason in trigger_reasons {
                push_unique(&mut reasons, reason);
            }
            if !valid {
                push_unique(&mut reasons, FallbackReason::ResultInvalid);
                for reason in validation_reasons {
                    push_unique(&mut reasons, reason);
                }
            }

            let adopted = if must_fallback || !valid {
                None
            } else {
                result.solution.and_then(|solution| {
                    solution.decision.zip(solution.objective_value).map(
                        |(decision, objective_value)| {
                            (decision, objective_value, solution.confidence.unwrap_or(0.5))
                        },
                    )
                })
            };

            match adopted {
                Some((decision, objective_value, result_confidence)) => {
                    route = Route::Quantum;
                    action = decision;
                    objective = objective_value;
                    confidence = result_confidence;
                },
                None => {
                    route = Route::FallbackClassical;
                    tracing::debug!(
                        step_id,
                        twin_id = %state.twin_id,
                        reasons = ?reasons,
                        "quantum attempt rejected, reverting to classical"
                    );
                },
            }
        }

        let elapsed_ms = self.clock.now_ms().saturating_sub(t0);
        let latency_breach = latency.breach(elapsed_ms);
        if latency_breach {
            push_unique(&mut reasons, FallbackReason::SlaBreach);
            if route == Route::Quantum {
                route = Route::FallbackClassical;
                action = classical.action.clone();
                objective = classical.objective;
                confidence = classical.confidence;
            }
            tracing::warn!(
                step_id,
                twin_id = %state.twin_id,
                elapsed_ms,
                deadline_ms = sla.deadline_ms,
                "latency deadline breached"
            );
        }

        // Realized reward for the online learner: one update per step.
        let mut reward = objective - 0.000_8 * elapsed_ms as f64;
        if route == Route::FallbackClassical {
            reward -= 0.2;
        }
        self.policy.learn(&features, &sla, route, reward);

        let record = ExecRecord {
            step_id,
            ts: state.ts,
            twin_id: state.twin_id.clone(),
            route,
            policy: self.policy.name().to_string(),
            queue_ms,
            elapsed_ms,
            latency_breach,
            fallback_reasons: reasons,
            objective_value: objective,
            confidence,
            noise_proxy,
            cost,
            qre_json,
            result_json,
        };
        tracing::debug!(
            step_id,
            twin_id = %state.twin_id,
            route = route.as_str(),
            elapsed_ms,
            "step resolved"
        );

        Ok(StepOutcome { action, record })
    }
}

fn push_unique(reasons: &mut Vec<FallbackReason>, reason: FallbackReason) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}
