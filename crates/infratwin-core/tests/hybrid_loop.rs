//! End-to-end tests of the governed decision loop: registry, features,
//! routing, the simulated gateway, governance, and the audit history.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use infratwin_core::{
    Clock, ContextualBanditPolicy, FallbackReason, FallbackSpec, FeatureExtractor,
    HybridOrchestrator, JobStatus, OrchestratorConfig, PolicySelector, ProblemSpec, ProblemStub,
    QuantumConfig, QuantumGateway, QuantumResult, Qre, RiskClass, Route, RulePolicy, SimClock,
    SimulatedQpu, SimulatedQpuConfig, Sla, Telemetry, TraceContext, TwinContext, TwinLevel,
    TwinRegistry, QRE_VERSION,
};

const BASE_EPOCH_SECS: i64 = 1_700_000_000;

fn telemetry_at(twin_id: &str, tick: u64, x1: f64, x2: f64, x3: f64) -> Telemetry {
    let ts: DateTime<Utc> =
        DateTime::from_timestamp(BASE_EPOCH_SECS + tick as i64, 0).unwrap();
    Telemetry {
        source_id: twin_id.to_string(),
        ts,
        values: HashMap::from([
            ("x1".to_string(), x1),
            ("x2".to_string(), x2),
            ("x3".to_string(), x3),
        ]),
    }
}

/// Signals that sit exactly on the 0.1 ladder, so the discrete-regime proxy
/// stays high and the rule policy keeps choosing the quantum path while
/// health stays comfortably out of the risk bands.
fn ladder_signals(tick: u64) -> (f64, f64, f64) {
    let x1 = (tick % 10) as f64 / 10.0;
    let x2 = ((tick + 3) % 10) as f64 / 10.0;
    let x3 = (tick % 5) as f64 / 10.0;
    (x1, x2, x3)
}

/// Drives `steps` round-robin steps over `twin_count` twins and returns the
/// registry with its history plus the orchestrator for policy introspection.
fn run_loop(
    steps: u64,
    twin_count: usize,
    policy: PolicySelector,
    config: OrchestratorConfig,
    gateway_config: SimulatedQpuConfig,
    signals: impl Fn(u64) -> (f64, f64, f64),
) -> (TwinRegistry, HybridOrchestrator<SimulatedQpu>) {
    let clock: Arc<dyn Clock> = Arc::new(SimClock::new(0));
    let gateway = SimulatedQpu::new(gateway_config, Arc::clone(&clock)).unwrap();
    let mut orchestrator = HybridOrchestrator::new(
        gateway,
        FeatureExtractor::new(12).unwrap(),
        policy,
        clock,
        config,
    )
    .unwrap();

    let mut registry = TwinRegistry::new();
    let twin_ids: Vec<String> = (0..twin_count)
        .map(|i| format!("infra:asset:{i:03}"))
        .collect();
    for id in &twin_ids {
        registry
            .create(id.clone(), TwinLevel::Asset, "graph://grid/demo")
            .unwrap();
    }

    for step_id in 1..=steps {
        let twin_id = &twin_ids[(step_id as usize - 1) % twin_count];
        let (x1, x2, x3) = signals(step_id);
        registry
            .update_from_telemetry(twin_id, &telemetry_at(twin_id, step_id, x1, x2, x3))
            .unwrap();
        let state = registry.twin(twin_id).unwrap().clone();
        let outcome = orchestrator.step(&state, step_id, "run-e2e").unwrap();
        registry.apply_action(twin_id, outcome.action).unwrap();
        registry.append(outcome.record);
    }

    (registry, orchestrator)
}

#[test]
fn test_quantum_route_implies_validated_success_and_bounded_action() {
    let (registry, _) = run_loop(
        40,
        3,
        PolicySelector::Rule(RulePolicy::default()),
        OrchestratorConfig::default(),
        SimulatedQpuConfig::default(),
        ladder_signals,
    );

    let quantum: Vec<_> = registry
        .history()
        .iter()
        .filter(|r| r.route == Route::Quantum)
        .collect();
    assert!(!quantum.is_empty(), "run produced no adopted quantum steps");

    for record in quantum {
        assert!(record.fallback_reasons.is_empty());
        assert!(!record.latency_breach);
        assert!(record.qre_json.is_some());
        let result: QuantumResult =
            serde_json::from_str(record.result_json.as_deref().unwrap()).unwrap();
        assert_eq!(result.status, JobStatus::Succeeded);
        let damp = result.solution.unwrap().decision.unwrap().damp;
        assert!((0.0..=5.0).contains(&damp), "damp {damp} out of range");
    }
}

#[test]
fn test_fallback_reasons_match_fallback_route_exactly() {
    let (registry, _) = run_loop(
        60,
        3,
        PolicySelector::Rule(RulePolicy::default()),
        OrchestratorConfig::default(),
        SimulatedQpuConfig::default(),
        ladder_signals,
    );

    for record in registry.history() {
        let fell_back = record.route == Route::FallbackClassical;
        assert_eq!(
            fell_back,
            !record.fallback_reasons.is_empty(),
            "step {}: route {} with reasons {:?}",
            record.step_id,
            record.route,
            record.fallback_reasons
        );
        let mut seen = std::collections::HashSet::new();
        for reason in &record.fallback_reasons {
            assert!(seen.insert(reason), "duplicate reason {reason:?}");
        }
    }
}

#[test]
fn test_health_stays_bounded_across_a_noisy_run() {
    let (registry, _) = run_loop(
        50,
        2,
        PolicySelector::Rule(RulePolicy::default()),
        OrchestratorConfig::default(),
        SimulatedQpuConfig::default(),
        |tick| {
            // Large swings drive health against both clamp edges.
            let t = tick as f64;
            ((t / 3.0).sin() * 9.0, (t / 4.0).cos() * 9.0, t % 1.0)
        },
    );

    for id in registry.twin_ids() {
        let health = registry.twin(id).unwrap().health;
        assert!((0.0..=1.0).contains(&health));
    }
    assert_eq!(registry.history().len(), 50);
}

#[test]
fn test_identical_seeds_replay_bit_identical_histories() {
    let run = || {
        run_loop(
            30,
            3,
            PolicySelector::Rule(RulePolicy::default()),
            OrchestratorConfig::default(),
            SimulatedQpuConfig::default(),
            ladder_signals,
        )
        .0
    };
    let first = run();
    let second = run();
    assert_eq!(first.history(), second.history());
}

#[test]
fn test_critical_risk_is_never_routed_to_quantum() {
    // x1 = 6.0 pins health at 0.1 while staying on the discrete ladder.
    let (registry, _) = run_loop(
        30,
        1,
        PolicySelector::Rule(RulePolicy::default()),
        OrchestratorConfig::default(),
        SimulatedQpuConfig::default(),
        |_| (6.0, 0.0, 0.0),
    );

    for record in registry.history() {
        assert_eq!(record.route, Route::Classical);
        assert!(record.qre_json.is_none());
    }
}

#[test]
fn test_forced_backend_failure_always_falls_back_with_job_failed() {
    // A generous deadline keeps the poll loop from cancelling first, so every
    // attempt reaches the backend's terminal FAILED state.
    let (registry, _) = run_loop(
        30,
        2,
        PolicySelector::Rule(RulePolicy::default()),
        OrchestratorConfig {
            sla_deadline_override_ms: Some(200_000),
            ..OrchestratorConfig::default()
        },
        SimulatedQpuConfig {
            failure_override: Some(1.0),
            ..SimulatedQpuConfig::default()
        },
        ladder_signals,
    );

    let attempts: Vec<_> = registry
        .history()
        .iter()
        .filter(|r| r.result_json.is_some())
        .collect();
    assert!(!attempts.is_empty());
    for record in attempts {
        assert_eq!(record.route, Route::FallbackClassical);
        assert!(record
            .fallback_reasons
            .iter()
            .any(|r| r.as_str() == "JOB_FAILED"));
        assert_ne!(record.route, Route::Quantum);
    }
}

#[test]
fn test_tiny_deadline_breaches_and_downgrades_every_attempt() {
    // A fully open rule gate attempts quantum on every step even though the
    // overridden deadline makes success impossible.
    let open_gate = RulePolicy::new(0.0, 0.0, 0).unwrap();
    let (registry, _) = run_loop(
        20,
        1,
        PolicySelector::Rule(open_gate),
        OrchestratorConfig {
            sla_deadline_override_ms: Some(1),
            ..OrchestratorConfig::default()
        },
        SimulatedQpuConfig::default(),
        ladder_signals,
    );

    assert_eq!(registry.history().len(), 20);
    for record in registry.history() {
        assert!(record.latency_breach);
        assert_eq!(record.route, Route::FallbackClassical);
        assert!(record
            .fallback_reasons
            .iter()
            .any(|r| r.as_str() == "SLA_BREACH"));
    }
}

#[test]
fn test_bandit_learns_exactly_once_per_step() {
    let steps = 500;
    let (registry, orchestrator) = run_loop(
        steps,
        5,
        PolicySelector::Bandit(ContextualBanditPolicy::new(7).unwrap()),
        OrchestratorConfig::default(),
        SimulatedQpuConfig::default(),
        ladder_signals,
    );

    assert_eq!(registry.history().len(), steps as usize);
    assert_eq!(orchestrator.policy().update_count(), Some(steps));
}

#[test]
fn test_result_fetch_is_idempotent_after_terminal() {
    let clock: Arc<dyn Clock> = Arc::new(SimClock::new(0));
    let mut gateway =
        SimulatedQpu::new(SimulatedQpuConfig::default(), Arc::clone(&clock)).unwrap();

    let qre = Qre {
        qre_version: QRE_VERSION.to_string(),
        twin_context: TwinContext {
            twin_id: "infra:asset:000".to_string(),
            level: "asset".to_string(),
            topology_ref: "graph://grid/demo".to_string(),
            timestamp: DateTime::from_timestamp(BASE_EPOCH_SECS, 0).unwrap(),
        },
        problem: ProblemSpec {
            kind: "COMBINATORIAL_OPT".to_string(),
            form: "QUBO".to_string(),
            objective: "min_cost_with_constraints".to_string(),
            variables: 800,
            discrete_ratio: 0.5,
            qubo: ProblemStub::default(),
            constraints_hint: vec![],
        },
        sla: Sla {
            deadline_ms: 20_000,
            max_queue_ms: 60_000,
            max_cost: 3.0,
            risk_class: RiskClass::Low,
        },
        quantum_config: QuantumConfig::default(),
        fallback: FallbackSpec {
            policy: "CLASSICAL_ON_FAILURE".to_string(),
            reasons_to_trigger: vec![FallbackReason::JobFailed],
        },
        trace: TraceContext {
            correlation_id: "run-e2e".to_string(),
            step_id: 1,
        },
    };

    let handle = gateway.submit(&qre).unwrap();
    clock.sleep_ms(200_000);
    assert!(gateway.poll(&handle).unwrap().is_terminal());
    let first = gateway.get_result(&handle).unwrap();
    let second = gateway.get_result(&handle).unwrap();
    assert_eq!(first, second);
}
