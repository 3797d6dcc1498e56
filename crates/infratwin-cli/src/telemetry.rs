//! Synthetic edge telemetry source.
//!
//! Stands in for the fleet of edge agents a deployed loop would ingest from:
//! each twin gets smooth oscillating signals with a little seeded noise and a
//! strictly increasing timestamp, so runs with the same seed replay the same
//! samples.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use infratwin_core::Telemetry;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

const NOISE_SCALE: f64 = 0.05;

/// Deterministic per-run telemetry generator.
pub struct EdgeAgentSim {
    rng: StdRng,
    base_ts: DateTime<Utc>,
    ticks: HashMap<String, u64>,
}

impl EdgeAgentSim {
    /// Creates a generator whose output is fully determined by the seed and
    /// the order of `sample` calls.
    #[must_use]
    pub fn new(seed: u64, base_ts: DateTime<Utc>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_ts,
            ticks: HashMap::new(),
        }
    }

    fn noise(&mut self) -> f64 {
        let n: f64 = StandardNormal.sample(&mut self.rng);
        NOISE_SCALE * n
    }

    /// Produces the next sample for a twin. Timestamps advance by one second
    /// per tick per twin.
    pub fn sample(&mut self, twin_id: &str) -> Telemetry {
        let tick = self.ticks.entry(twin_id.to_string()).or_insert(0);
        *tick += 1;
        let tick = *tick;
        let t = tick as f64;

        let x1 = (t / 6.0).sin() + self.noise();
        let x2 = (t / 8.0).cos() + self.noise();
        let x3 = (tick % 20) as f64 / 20.0 + self.noise();

        Telemetry {
            source_id: twin_id.to_string(),
            ts: self.base_ts + Duration::seconds(tick as i64),
            values: HashMap::from([
                ("x1".to_string(), x1),
                ("x2".to_string(), x2),
                ("x3".to_string(), x3),
            ]),
        }
    }
}
