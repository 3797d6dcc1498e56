//! Twin state registry: exclusive owner of per-twin state and the
//! append-only execution history.
//!
//! Twins are created once at setup, mutated every step by telemetry ingestion
//! and action application, and never destroyed during a run. Records appended
//! to the history are immutable snapshots; the registry only ever grows it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contract::{Action, ExecRecord, Telemetry};

/// Hierarchy level of a twin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwinLevel {
    Asset,
    Subsystem,
    System,
    SystemOfSystems,
}

impl TwinLevel {
    /// Returns the stable string form used in envelopes and records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Subsystem => "subsystem",
            Self::System => "system",
            Self::SystemOfSystems => "sos",
        }
    }
}

/// State of one digital twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinState {
    pub twin_id: String,
    pub level: TwinLevel,
    pub topology_ref: String,
    pub ts: DateTime<Utc>,
    /// Minimal numeric state vector.
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
    /// Derived health in `[0, 1]`; lower magnitude of `x1`/`x2` means
    /// healthier.
    pub health: f64,
    pub last_action: Option<Action>,
}

/// Errors raised by registry operations. These indicate programming or
/// configuration defects and are always fatal to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A twin with this id already exists.
    #[error("twin already exists: {twin_id}")]
    TwinAlreadyExists {
        /// The duplicate twin id.
        twin_id: String,
    },

    /// The referenced twin was never created.
    #[error("twin not found: {twin_id}")]
    TwinNotFound {
        /// The unknown twin id.
        twin_id: String,
    },
}

/// Registry owning per-twin state and the append-only execution history.
#[derive(Debug, Default)]
pub struct TwinRegistry {
    twins: std::collections::HashMap<String, TwinState>,
    history: Vec<ExecRecord>,
}

impl TwinRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a twin. Fails if the id is already registered.
    pub fn create(
        &mut self,
        twin_id: impl Into<String>,
        level: TwinLevel,
        topology_ref: impl Into<String>,
    ) -> Result<&TwinState, RegistryError> {
        let twin_id = twin_id.into();
        if self.twins.contains_key(&twin_id) {
            return Err(RegistryError::TwinAlreadyExists { twin_id });
        }
        let state = TwinState {
            twin_id: twin_id.clone(),
            level,
            topology_ref: topology_ref.into(),
            ts: Utc::now(),
            x1: 0.0,
            x2: 0.0,
            x3: 0.0,
            health: 1.0,
            last_action: None,
        };
        tracing::debug!(twin_id = %twin_id, level = level.as_str(), "twin created");
        Ok(self.twins.entry(twin_id).or_insert(state))
    }

    /// Merges a telemetry sample into the twin's state vector and recomputes
    /// health. Signal keys absent from the sample keep their previous value.
    pub fn update_from_telemetry(
        &mut self,
        twin_id: &str,
        telemetry: &Telemetry,
    ) -> Result<&TwinState, RegistryError> {
        let state = self
            .twins
            .get_mut(twin_id)
            .ok_or_else(|| RegistryError::TwinNotFound {
                twin_id: twin_id.to_string(),
            })?;
        state.ts = telemetry.ts;
        state.x1 = telemetry.values.get("x1").copied().unwrap_or(state.x1);
        state.x2 = telemetry.values.get("x2").copied().unwrap_or(state.x2);
        state.x3 = telemetry.values.get("x3").copied().unwrap_or(state.x3);
        state.health = (1.0 - 0.15 * state.x1.abs() - 0.10 * state.x2.abs()).clamp(0.0, 1.0);
        Ok(state)
    }

    /// Stores the applied action. A non-zero damping factor attenuates the
    /// first two state dimensions (closed-loop hook).
    pub fn apply_action(
        &mut self,
        twin_id: &str,
        action: Action,
    ) -> Result<&TwinState, RegistryError> {
        let state = self
            .twins
            .get_mut(twin_id)
            .ok_or_else(|| RegistryError::TwinNotFound {
                twin_id: twin_id.to_string(),
            })?;
        if action.damp != 0.0 {
            state.x1 *= 1.0 - 0.02 * action.damp;
            state.x2 *= 1.0 - 0.02 * action.damp;
        }
        state.last_action = Some(action);
        Ok(state)
    }

    /// Returns the current state of a twin.
    pub fn twin(&self, twin_id: &str) -> Result<&TwinState, RegistryError> {
        self.twins
            .get(twin_id)
            .ok_or_else(|| RegistryError::TwinNotFound {
                twin_id: twin_id.to_string(),
            })
    }

    /// Ids of all registered twins, in sorted order.
    #[must_use]
    pub fn twin_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.twins.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Appends one execution record to the history.
    pub fn append(&mut self, record: ExecRecord) {
        self.history.push(record);
    }

    /// The ordered, append-only execution history.
    #[must_use]
    pub fn history(&self) -> &[ExecRecord] {
        &self.history
    }
}
