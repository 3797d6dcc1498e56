//! Simulated remote quantum gateway.
//!
//! [`QuantumGateway`] is the provider seam: a real cloud adapter would
//! implement the same `submit`/`poll`/`get_result` surface. [`SimulatedQpu`]
//! models the operational texture of a remote QPU — queueing, execution time,
//! noise, cost, and failure — against a shared [`Clock`], with no execution
//! thread of its own: readiness is a deterministic clock comparison.
//!
//! # Contracts
//!
//! - `get_result` before readiness returns a PENDING result with an
//!   explanatory error and never mutates terminal state.
//! - Once readiness is reached, the first observation (a `poll` or a
//!   `get_result`) freezes exactly one terminal outcome; every later call
//!   returns the same outcome.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, Normal, StandardNormal};
use thiserror::Error;

use crate::clock::Clock;
use crate::contract::{
    BackendKind, BackendMeta, Diagnostics, JobStatus, Qre, QuantumResult, RiskClass, Solution,
};
use crate::contract::{Action, ActionMode};

/// Milliseconds after submission during which `poll` still reports PENDING.
const PENDING_GRACE_MS: u64 = 200;

/// Gateway-side ticket for one submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    /// Gateway-assigned job identifier.
    pub job_id: String,
    /// Submission time in clock milliseconds.
    pub submit_ms: u64,
    /// Modeled readiness time in clock milliseconds.
    pub ready_ms: u64,
}

/// Errors raised by gateway operations. These indicate programming or
/// configuration defects; operational failure of a job is a terminal
/// [`JobStatus::Failed`] result, not an error.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    /// The handle does not belong to this gateway instance.
    #[error("unknown job: {job_id}")]
    UnknownJob {
        /// The unknown job id.
        job_id: String,
    },

    /// The request envelope is structurally unusable.
    #[error("malformed quantum request envelope: {reason}")]
    MalformedEnvelope {
        /// What is missing or out of range.
        reason: String,
    },

    /// Constructor parameters are out of range.
    #[error("invalid gateway configuration: {reason}")]
    InvalidConfig {
        /// What is out of range.
        reason: String,
    },
}

/// Provider-agnostic asynchronous quantum job interface.
pub trait QuantumGateway {
    /// Submits an envelope, returning a job ticket.
    fn submit(&mut self, qre: &Qre) -> Result<JobHandle, GatewayError>;

    /// Re-evaluates the job's lifecycle state. At readiness this settles
    /// the terminal outcome and reports its status.
    fn poll(&mut self, handle: &JobHandle) -> Result<JobStatus, GatewayError>;

    /// Retrieves the job's result, freezing the terminal outcome on first
    /// retrieval after readiness.
    fn get_result(&mut self, handle: &JobHandle) -> Result<QuantumResult, GatewayError>;
}

/// Configuration for the simulated QPU.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedQpuConfig {
    /// Seed for the gateway's stochastic model.
    pub seed: u64,
    /// When set, replaces the modeled failure probability entirely.
    /// Must lie in `[0, 1]`.
    pub failure_override: Option<f64>,
}

impl Default for SimulatedQpuConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            failure_override: None,
        }
    }
}

#[derive(Debug)]
struct JobRecord {
    qre: Qre,
    submit_ms: u64,
    ready_ms: u64,
    queue_ms: u64,
    exec_ms: u64,
    terminal: Option<QuantumResult>,
}

/// Simulated cloud QPU with queueing, noise, cost, and failure modeling.
pub struct SimulatedQpu {
    config: SimulatedQpuConfig,
    clock: Arc<dyn Clock>,
    rng: StdRng,
    jobs: HashMap<String, JobRecord>,
    job_counter: u64,
}

impl std::fmt::Debug for SimulatedQpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedQpu")
            .field("config", &self.config)
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

impl SimulatedQpu {
    /// Creates a simulated QPU over the given clock.
    pub fn new(
        config: SimulatedQpuConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError> {
        if let Some(p) = config.failure_override {
            if !(0.0..=1.0).contains(&p) || !p.is_finite() {
                return Err(GatewayError::InvalidConfig {
                    reason: format!("failure_override {p} outside [0, 1]"),
                });
            }
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            clock,
            rng,
            jobs: HashMap::new(),
            job_counter: 0,
        })
    }

    fn validate_envelope(qre: &Qre) -> Result<(), GatewayError> {
        if qre.qre_version.is_empty() {
            return Err(GatewayError::MalformedEnvelope {
                reason: "empty qre_version".to_string(),
            });
        }
        if qre.trace.correlation_id.is_empty() {
            return Err(GatewayError::MalformedEnvelope {
                reason: "empty correlation_id".to_string(),
            });
        }
        if qre.problem.variables == 0 {
            return Err(GatewayError::MalformedEnvelope {
                reason: "problem has zero variables".to_string(),
            });
        }
        if qre.quantum_config.shots == 0 {
            return Err(GatewayError::MalformedEnvelope {
                reason: "zero shots".to_string(),
            });
        }
        Ok(())
    }

    fn failure_probability(&self, n_vars: usize, risk: RiskClass) -> f64 {
        if let Some(p) = self.config.failure_override {
            return p;
        }
        let mut p = 0.03 + 0.000_02 * n_vars as f64;
        match risk {
            RiskClass::High => p += 0.03,
            RiskClass::Critical => p += 0.06,
            RiskClass::Medium | RiskClass::Low => {},
        }
        p
    }

    fn backend_meta(queue_ms: Option<u64>, exec_ms: Option<u64>) -> BackendMeta {
        BackendMeta {
            provider: "SIM_QPU".to_string(),
            backend_id: "sim-qpu-1".to_string(),
            mode: BackendKind::Qpu,
            queue_ms,
            exec_ms,
        }
    }

    /// Decides and freezes the terminal outcome of a ready job.
    fn resolve_terminal(&mut self, job_id: &str) -> QuantumResult {
        // Split borrows: everything needed from the record is copied out
        // before sampling.
        let (qre, queue_ms, exec_ms) = {
            let record = self.jobs.get(job_id).expect("caller verified job exists");
            (record.qre.clone(), record.queue_ms, record.exec_ms)
        };
        let n_vars = qre.problem.variables;
        let shots = qre.quantum_config.shots;
        let depth = qre.quantum_config.depth;

        let noise_jitter: f64 = Normal::new(0.0, 0.005)
            .expect("finite normal parameters")
            .sample(&mut self.rng);
        let noise_proxy = (0.03 + 0.02 * f64::from(depth) + 0.000_01 * n_vars as f64
            + noise_jitter)
            .clamp(0.0, 0.25);
        let cost = (0.25 + 0.000_2 * f64::from(shots) + 0.003 * f64::from(depth)
            + 0.000_01 * n_vars as f64)
            .clamp(0.1, 10.0);

        let p_fail = self.failure_probability(n_vars, qre.sla.risk_class);
        let failed = self.rng.gen::<f64>() < p_fail;

        let result = if failed {
            tracing::debug!(job_id, noise_proxy, cost, "simulated QPU job failed");
            QuantumResult {
                correlation_id: qre.trace.correlation_id.clone(),
                step_id: qre.trace.step_id,
                backend: Self::backend_meta(Some(queue_ms), None),
                status: JobStatus::Failed,
                solution: None,
                diagnostics: Diagnostics {
                    shots: Some(shots),
                    depth: Some(depth),
                    noise_proxy: Some(noise_proxy),
                    cost: Some(cost),
                },
                error: Some("simulated QPU job failure".to_string()),
            }
        } else {
            let len = n_vars.min(64);
            let bitstring: String = (0..len)
                .map(|_| {
                    let draw: f64 = StandardNormal.sample(&mut self.rng);
                    if draw > 0.0 { '1' } else { '0' }
                })
                .collect();
            let ones = bitstring.chars().filter(|&c| c == '1').count();
            let damp = (0.5 + 5.0 * ones as f64 / len.max(1) as f64).clamp(0.0, 5.0);

            // Objective and confidence deliberately degrade as noise grows.
            let objective = -(0.9 + 1.5 * noise_proxy) * (0.8 + self.rng.gen::<f64>());
            let confidence = (0.80 - 1.8 * noise_proxy).clamp(0.2, 0.85);

            tracing::debug!(job_id, noise_proxy, cost, damp, "simulated QPU job succeeded");
            QuantumResult {
                correlation_id: qre.trace.correlation_id.clone(),
                step_id: qre.trace.step_id,
                backend: Self::backend_meta(Some(queue_ms), Some(exec_ms)),
                status: JobStatus::Succeeded,
                solution: Some(Solution {
                    best_bitstring: Some(bitstring),
                    decision: Some(Action {
                        damp,
                        mode: ActionMode::QuantumCandidate,
                    }),
                    objective_value: Some(objective),
                    confidence: Some(confidence),
                }),
                diagnostics: Diagnostics {
                    shots: Some(shots),
                    depth: Some(depth),
                    noise_proxy: Some(noise_proxy),
                    cost: Some(cost),
                },
                error: None,
            }
        };

        self.jobs
            .get_mut(job_id)
            .expect("caller verified job exists")
            .terminal = Some(result.clone());
        result
    }
}

impl QuantumGateway for SimulatedQpu {
    fn submit(&mut self, qre: &Qre) -> Result<JobHandle, GatewayError> {
        Self::validate_envelope(qre)?;

        self.job_counter += 1;
        let job_id = format!("qjob-{:06}", self.job_counter);
        let now = self.clock.now_ms();

        let n_vars = qre.problem.variables;
        let gamma = Gamma::<f64>::new(2.0, 6000.0).expect("finite gamma parameters");
        let base_queue: f64 = gamma.sample(&mut self.rng).clamp(1_000.0, 90_000.0);
        let queue_ms = (base_queue + 2.0 * n_vars as f64) as u64;

        let shots = qre.quantum_config.shots;
        let depth = qre.quantum_config.depth;
        let exec_jitter: f64 = Normal::new(0.0, 30.0)
            .expect("finite normal parameters")
            .sample(&mut self.rng);
        let exec_ms = (150.0 + 0.02 * f64::from(shots) + 120.0 * f64::from(depth) + exec_jitter)
            .clamp(150.0, 4_000.0) as u64;

        let ready_ms = now + queue_ms + exec_ms;
        tracing::debug!(
            job_id,
            n_vars,
            queue_ms,
            exec_ms,
            correlation_id = %qre.trace.correlation_id,
            "quantum job submitted"
        );

        self.jobs.insert(
            job_id.clone(),
            JobRecord {
                qre: qre.clone(),
                submit_ms: now,
                ready_ms,
                queue_ms,
                exec_ms,
                terminal: None,
            },
        );

        Ok(JobHandle {
            job_id,
            submit_ms: now,
            ready_ms,
        })
    }

    fn poll(&mut self, handle: &JobHandle) -> Result<JobStatus, GatewayError> {
        let (submit_ms, ready_ms, terminal_status) = {
            let record = self
                .jobs
                .get(&handle.job_id)
                .ok_or_else(|| GatewayError::UnknownJob {
                    job_id: handle.job_id.clone(),
                })?;
            (
                record.submit_ms,
                record.ready_ms,
                record.terminal.as_ref().map(|t| t.status),
            )
        };
        if let Some(status) = terminal_status {
            return Ok(status);
        }
        let now = self.clock.now_ms();
        if now >= ready_ms {
            // Readiness freezes the terminal outcome; later polls and
            // fetches observe the same status.
            return Ok(self.resolve_terminal(&handle.job_id).status);
        }
        if now < submit_ms + PENDING_GRACE_MS {
            Ok(JobStatus::Pending)
        } else {
            Ok(JobStatus::Running)
        }
    }

    fn get_result(&mut self, handle: &JobHandle) -> Result<QuantumResult, GatewayError> {
        let record = self
            .jobs
            .get(&handle.job_id)
            .ok_or_else(|| GatewayError::UnknownJob {
                job_id: handle.job_id.clone(),
            })?;

        if let Some(terminal) = &record.terminal {
            return Ok(terminal.clone());
        }

        if self.clock.now_ms() < record.ready_ms {
            // Not ready: emulate provider behavior with a non-terminal
            // result. Terminal state is left untouched.
            return Ok(QuantumResult {
                correlation_id: record.qre.trace.correlation_id.clone(),
                step_id: record.qre.trace.step_id,
                backend: Self::backend_meta(None, None),
                status: JobStatus::Pending,
                solution: None,
                diagnostics: Diagnostics::default(),
                error: Some("result requested before ready".to_string()),
            });
        }

        Ok(self.resolve_terminal(&handle.job_id))
    }
}
