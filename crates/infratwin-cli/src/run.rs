//! Demo run driver: wires the telemetry simulator, the registry, and the
//! orchestrator into a round-robin loop and prints a summary.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use infratwin_core::{
    Clock, ContextualBanditPolicy, FeatureExtractor, HybridOrchestrator, OrchestratorConfig,
    PolicySelector, Route, RulePolicy, SimClock, SimulatedQpu, SimulatedQpuConfig, SystemClock,
    TwinLevel, TwinRegistry,
};

use crate::export;
use crate::telemetry::EdgeAgentSim;

/// Parameters of one demo run.
pub struct RunArgs {
    pub steps: u64,
    pub twins: usize,
    pub policy: String,
    pub seed: u64,
    pub window: usize,
    pub export: Option<PathBuf>,
    pub real_time: bool,
}

pub fn run(args: &RunArgs) -> Result<()> {
    anyhow::ensure!(args.steps >= 1, "--steps must be at least 1");
    anyhow::ensure!(args.twins >= 1, "--twins must be at least 1");

    // Simulated time by default: modeled queue waits of up to 90 s per
    // quantum attempt would otherwise dominate the demo wall clock.
    let clock: Arc<dyn Clock> = if args.real_time {
        Arc::new(SystemClock)
    } else {
        Arc::new(SimClock::new(0))
    };

    let policy = match args.policy.as_str() {
        "bandit" => PolicySelector::Bandit(ContextualBanditPolicy::new(args.seed)?),
        _ => PolicySelector::Rule(RulePolicy::default()),
    };
    let gateway = SimulatedQpu::new(
        SimulatedQpuConfig {
            seed: args.seed,
            ..SimulatedQpuConfig::default()
        },
        Arc::clone(&clock),
    )?;
    let mut orchestrator = HybridOrchestrator::new(
        gateway,
        FeatureExtractor::new(args.window)?,
        policy,
        Arc::clone(&clock),
        OrchestratorConfig::default(),
    )?;

    let mut registry = TwinRegistry::new();
    let twin_ids: Vec<String> = (0..args.twins)
        .map(|i| format!("infra:asset:{i:03}"))
        .collect();
    for id in &twin_ids {
        registry
            .create(id.clone(), TwinLevel::Asset, "graph://grid/demo")
            .context("failed to register twin")?;
    }

    let mut sim = EdgeAgentSim::new(args.seed, chrono::Utc::now());
    let correlation_id = format!("run-{}", args.seed);

    for step_id in 1..=args.steps {
        let twin_id = &twin_ids[(step_id as usize - 1) % args.twins];
        let sample = sim.sample(twin_id);
        registry
            .update_from_telemetry(twin_id, &sample)
            .context("telemetry ingestion failed")?;
        let state = registry.twin(twin_id)?.clone();
        let outcome = orchestrator.step(&state, step_id, &correlation_id)?;
        registry.apply_action(twin_id, outcome.action)?;
        registry.append(outcome.record);
    }

    print_summary(&registry, &orchestrator);

    if let Some(dir) = &args.export {
        let written = export::write_history(dir, registry.history())?;
        println!("exported {written} records to {}", dir.display());
    }

    Ok(())
}

fn print_summary(registry: &TwinRegistry, orchestrator: &HybridOrchestrator<SimulatedQpu>) {
    let history = registry.history();
    let total = history.len();
    let count = |route: Route| history.iter().filter(|r| r.route == route).count();
    let breaches = history.iter().filter(|r| r.latency_breach).count();
    let mean = |f: fn(&infratwin_core::ExecRecord) -> f64| {
        if total == 0 {
            0.0
        } else {
            history.iter().map(f).sum::<f64>() / total as f64
        }
    };
    let mean_elapsed = mean(|r| r.elapsed_ms as f64);
    let mean_objective = mean(|r| r.objective_value);

    let mut reasons: BTreeMap<&str, usize> = BTreeMap::new();
    for record in history {
        for reason in &record.fallback_reasons {
            *reasons.entry(reason.as_str()).or_default() += 1;
        }
    }

    println!("steps:              {total}");
    println!("  classical:        {}", count(Route::Classical));
    println!("  quantum:          {}", count(Route::Quantum));
    println!("  fallback:         {}", count(Route::FallbackClassical));
    println!("latency breaches:   {breaches}");
    println!("mean elapsed (ms):  {mean_elapsed:.1}");
    println!("mean objective:     {mean_objective:.4}");
    if let Some(updates) = orchestrator.policy().update_count() {
        println!("bandit updates:     {updates}");
    }
    if !reasons.is_empty() {
        println!("fallback reasons:");
        for (reason, n) in reasons {
            println!("  {reason}: {n}");
        }
    }
    for id in registry.twin_ids() {
        if let Ok(twin) = registry.twin(id) {
            println!("twin {id}: health {:.3}", twin.health);
        }
    }
}
