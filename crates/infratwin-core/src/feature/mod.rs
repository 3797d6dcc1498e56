//! Feature extraction: bounded sliding-window statistics per twin, plus the
//! synthetic combinatorial problem payload for quantum submissions.

use std::collections::{HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::ProblemStub;
use crate::registry::TwinState;

/// Floor added to every standard deviation to avoid zero denominators on
/// constant windows.
const SIGMA_EPSILON: f64 = 1e-6;

/// Tolerance for the discrete-ladder proximity test on `x3`.
const LADDER_ATOL: f64 = 0.03;

/// Upper bounds on the synthetic problem payload, independent of `n_vars`.
const MAX_LINEAR_TERMS: usize = 12;
const MAX_QUADRATIC_TERMS: usize = 20;

/// Errors raised by extractor construction.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeatureError {
    /// The sliding window must hold at least one sample.
    #[error("invalid extractor window size: {window} (must be >= 1)")]
    InvalidWindow {
        /// The rejected window size.
        window: usize,
    },
}

/// Bounded feature vector computed over a twin's recent state samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Features {
    pub mu1: f64,
    pub mu2: f64,
    pub mu3: f64,
    pub sig1: f64,
    pub sig2: f64,
    pub sig3: f64,
    /// Fraction of windowed `x3` samples lying within [`LADDER_ATOL`] of the
    /// nearest multiple of 0.1; a proxy for how combinatorial the twin's
    /// current regime looks.
    pub discrete_ratio: f64,
    pub health: f64,
}

/// Per-twin sliding-window feature extractor.
///
/// Windows are keyed by twin id. Each window has fixed capacity; the oldest
/// sample is evicted first. Access is single-step-at-a-time per twin by
/// construction of the orchestrator loop.
#[derive(Debug)]
pub struct FeatureExtractor {
    window: usize,
    buffers: HashMap<String, VecDeque<(f64, f64, f64)>>,
}

impl FeatureExtractor {
    /// Creates an extractor with the given window capacity.
    pub fn new(window: usize) -> Result<Self, FeatureError> {
        if window == 0 {
            return Err(FeatureError::InvalidWindow { window });
        }
        Ok(Self {
            window,
            buffers: HashMap::new(),
        })
    }

    /// The configured window capacity.
    #[must_use]
    pub const fn window(&self) -> usize {
        self.window
    }

    /// Pushes the twin's current state into its window and computes the
    /// feature vector over the window contents.
    pub fn update(&mut self, state: &TwinState) -> Features {
        let buf = self
            .buffers
            .entry(state.twin_id.clone())
            .or_insert_with(VecDeque::new);
        buf.push_back((state.x1, state.x2, state.x3));
        if buf.len() > self.window {
            buf.pop_front();
        }

        let n = buf.len() as f64;
        let (mut mu1, mut mu2, mut mu3) = (0.0, 0.0, 0.0);
        for &(a, b, c) in buf.iter() {
            mu1 += a;
            mu2 += b;
            mu3 += c;
        }
        mu1 /= n;
        mu2 /= n;
        mu3 /= n;

        let (mut v1, mut v2, mut v3) = (0.0, 0.0, 0.0);
        let mut ladder_hits = 0usize;
        for &(a, b, c) in buf.iter() {
            v1 += (a - mu1).powi(2);
            v2 += (b - mu2).powi(2);
            v3 += (c - mu3).powi(2);
            let nearest = (c * 10.0).round() / 10.0;
            if (c - nearest).abs() <= LADDER_ATOL {
                ladder_hits += 1;
            }
        }

        Features {
            mu1,
            mu2,
            mu3,
            sig1: (v1 / n).sqrt() + SIGMA_EPSILON,
            sig2: (v2 / n).sqrt() + SIGMA_EPSILON,
            sig3: (v3 / n).sqrt() + SIGMA_EPSILON,
            discrete_ratio: ladder_hits as f64 / n,
            health: state.health,
        }
    }

    /// Emits a synthetic sparse QUBO payload over `n_vars` symbolic
    /// variables, deterministically seeded from the feature vector.
    ///
    /// The payload is size-bounded regardless of `n_vars`: at most
    /// [`MAX_LINEAR_TERMS`] linear biases and [`MAX_QUADRATIC_TERMS`]
    /// quadratic couplings.
    #[must_use]
    pub fn build_problem_stub(&self, features: &Features, n_vars: usize) -> ProblemStub {
        if n_vars == 0 {
            return ProblemStub::default();
        }

        let seed = ((features.mu1 * 10_000.0).abs() as u64) % (1 << 32);
        let mut rng = StdRng::seed_from_u64(seed);
        // Unit-variance-scaled normals; parameters are finite constants so
        // construction cannot fail.
        let bias_dist = Normal::new(0.0, 0.5).expect("finite normal parameters");
        let coupling_dist = Normal::new(0.0, 0.25).expect("finite normal parameters");

        let linear: Vec<(String, f64)> =
            rand::seq::index::sample(&mut rng, n_vars, MAX_LINEAR_TERMS.min(n_vars))
                .into_iter()
                .map(|i| (format!("x{i}"), bias_dist.sample(&mut rng)))
                .collect();

        let mut quadratic = Vec::new();
        if n_vars >= 2 {
            for _ in 0..MAX_QUADRATIC_TERMS.min(n_vars) {
                let pair = rand::seq::index::sample(&mut rng, n_vars, 2);
                quadratic.push((
                    (format!("x{}", pair.index(0)), format!("x{}", pair.index(1))),
                    coupling_dist.sample(&mut rng),
                ));
            }
        }

        ProblemStub { linear, quadratic }
    }
}
