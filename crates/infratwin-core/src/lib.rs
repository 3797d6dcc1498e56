//! infratwin-core - governed hybrid quantum/classical decision loop.
//!
//! This crate implements the control plane that routes each step of a set of
//! digital twins either to a deterministic classical solver or to a simulated
//! remote quantum compute service, under latency, cost, and noise governance,
//! with automatic fallback to the classical path whenever the quantum path is
//! unsafe, too slow, too costly, or invalid.
//!
//! # Architecture
//!
//! ```text
//! Telemetry
//!     |
//!     v
//! TwinRegistry (state update)
//!     |
//!     v
//! FeatureExtractor (window stats + problem stub)
//!     |
//!     v
//! risk classification -> SLA derivation
//!     |
//!     v
//! RoutingPolicy (rule | contextual bandit)
//!     |
//!     +-- CLASSICAL --> ClassicalSolver
//!     |
//!     +-- QUANTUM ----> SimulatedQpu (submit/poll/get_result)
//!                           |
//!                           v
//!                  FallbackManager + ResultValidator
//!                           |
//!                           v
//!                  adopt quantum result, or revert to classical
//!     |
//!     v
//! LatencyController (SLA breach check)
//!     |
//!     v
//! (Action, ExecRecord) -> TwinRegistry (apply + append)
//! ```
//!
//! # Failure semantics
//!
//! Operational faults (simulated backend failure, queue/cost/noise breach,
//! invalid result, SLA breach) are recovered locally via fallback and recorded
//! as explicit reason codes; they never abort a step. Configuration and
//! programming defects (unknown twin id, malformed envelope, out-of-range
//! parameters, non-monotonic step ids) propagate as errors.

pub mod classical;
pub mod clock;
pub mod contract;
pub mod feature;
pub mod gateway;
pub mod governance;
pub mod orchestrator;
pub mod policy;
pub mod registry;

pub use classical::{ClassicalOutcome, ClassicalSolver};
pub use clock::{Clock, SimClock, SystemClock};
pub use contract::{
    Action, ActionMode, BackendMeta, ConstraintHint, Diagnostics, ExecRecord, FallbackSpec,
    JobStatus, ProblemSpec, ProblemStub, Qre, QuantumConfig, QuantumResult, RiskClass, Route,
    Sla, Solution, Telemetry, TraceContext, TwinContext, QRE_VERSION,
};
pub use feature::{FeatureExtractor, Features};
pub use gateway::{
    GatewayError, JobHandle, QuantumGateway, SimulatedQpu, SimulatedQpuConfig,
};
pub use governance::{FallbackManager, FallbackReason, LatencyController, ResultValidator};
pub use orchestrator::{
    HybridOrchestrator, OrchestratorConfig, OrchestratorError, StepOutcome,
};
pub use policy::{ContextualBanditPolicy, PolicyError, PolicySelector, RouteIntent, RulePolicy};
pub use registry::{RegistryError, TwinLevel, TwinRegistry, TwinState};
