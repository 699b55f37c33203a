use crate::error::AppError;
use crate::oracle::{DecisionOracle, OracleError, OracleRequest, request_verdict};
use crate::publish::{Publisher, publish_transition};
use crate::sensor::normalizer::{NormalizeError, normalize};
use crate::sensor::{SensorReading, SensorRole};
use crate::state::{Confidence, OccupancyState, OccupancyStateMachine, StateTransition};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

pub mod analyzer;
pub mod history;
pub mod pattern;
pub mod voting;

use history::{DEFAULT_HISTORY_CAPACITY, HistoryStore};
use voting::{AggregateSnapshot, aggregate};

/// Distance (cm) below which a reading counts as "within range".
pub const OCCUPANCY_DISTANCE_CM: f64 = 50.0;
/// Votes needed before occupancy is heuristically confirmed.
pub const MIN_SENSORS_FOR_OCCUPANCY: usize = 2;
pub const VACANCY_TIMEOUT: Duration = Duration::from_secs(30);
pub const ANALYSIS_INTERVAL: Duration = Duration::from_secs(3);
pub const RECENCY_WINDOW: Duration = Duration::from_secs(10);

pub type SharedEngine = Arc<RwLock<FusionEngine>>;

#[derive(Debug, Clone, PartialEq)]
pub struct FusionSettings {
    pub occupancy_distance_cm: f64,
    pub min_sensors_for_occupancy: usize,
    pub vacancy_timeout: Duration,
    pub history_capacity: usize,
    pub analysis_interval: Duration,
    pub recency_window: Duration,
}

impl Default for FusionSettings {
    fn default() -> Self {
        Self {
            occupancy_distance_cm: OCCUPANCY_DISTANCE_CM,
            min_sensors_for_occupancy: MIN_SENSORS_FOR_OCCUPANCY,
            vacancy_timeout: VACANCY_TIMEOUT,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            analysis_interval: ANALYSIS_INTERVAL,
            recency_window: RECENCY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IngestOutcome {
    pub role: SensorRole,
    pub reading: SensorReading,
    /// Whether this event passed the analysis debounce.
    pub analysis_due: bool,
}

/// Snapshot and prompt captured under the engine lock for one analysis cycle.
#[derive(Debug, Clone)]
pub struct PreparedAnalysis {
    pub snapshot: AggregateSnapshot,
    pub request: OracleRequest,
}

/// Owns the sensor histories and the authoritative occupancy state.
#[derive(Debug)]
pub struct FusionEngine {
    settings: FusionSettings,
    history: HistoryStore,
    state: OccupancyStateMachine,
    last_analysis_at: SystemTime,
}

impl FusionEngine {
    pub fn new(settings: FusionSettings) -> Self {
        Self {
            history: HistoryStore::new(settings.history_capacity),
            settings,
            state: OccupancyStateMachine::new(),
            last_analysis_at: UNIX_EPOCH,
        }
    }

    pub fn settings(&self) -> &FusionSettings {
        &self.settings
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn state(&self) -> &OccupancyStateMachine {
        &self.state
    }

    pub fn into_shared(self) -> SharedEngine {
        Arc::new(RwLock::new(self))
    }

    /// Normalize and store an inbound event. Unknown topics return `Ok(None)`.
    pub fn ingest(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: SystemTime,
    ) -> Result<Option<IngestOutcome>, NormalizeError> {
        let Some((role, reading)) = normalize(topic, payload, now)? else {
            debug!(topic, "Ignoring event on unrecognized topic");
            return Ok(None);
        };
        Ok(Some(self.record(role, reading, now)))
    }

    /// Append a reading and apply the analysis debounce: analysis is due on
    /// motion or once the interval has elapsed since the previous analysis.
    pub fn record(&mut self, role: SensorRole, reading: SensorReading, now: SystemTime) -> IngestOutcome {
        self.history.append(role, reading);
        debug!(
            role = role.as_str(),
            motion = reading.motion,
            distance_cm = ?reading.distance_cm,
            "Sensor reading stored"
        );

        let since_last = now
            .duration_since(self.last_analysis_at)
            .unwrap_or(Duration::ZERO);
        let analysis_due = reading.motion || since_last > self.settings.analysis_interval;
        if analysis_due {
            self.last_analysis_at = now;
        }

        IngestOutcome {
            role,
            reading,
            analysis_due,
        }
    }

    pub fn snapshot(&self, now: SystemTime) -> AggregateSnapshot {
        aggregate(&self.history, now, &self.settings)
    }

    pub fn prepare_analysis(&self, now: SystemTime) -> Result<PreparedAnalysis, OracleError> {
        let snapshot = self.snapshot(now);
        info!(
            active = ?snapshot.active_sources,
            votes = snapshot.vote_count(),
            voting_result = %snapshot.voting_result(),
            seconds_since_motion = ?snapshot.time_since_motion().map(|d| d.as_secs_f64()),
            predicted = %snapshot.predicted_state,
            "Aggregated sensor votes"
        );
        let request = OracleRequest::build(&snapshot, &self.history, self.state.current(), &self.settings)?;
        Ok(PreparedAnalysis { snapshot, request })
    }

    /// The transition a verdict would cause, without committing it.
    pub fn propose_transition(
        &self,
        verdict: OccupancyState,
        snapshot: &AggregateSnapshot,
        now: SystemTime,
    ) -> Option<StateTransition> {
        let confidence = Confidence::from_votes(snapshot.vote_count(), self.settings.min_sensors_for_occupancy);
        let transition = self.state.propose(verdict, confidence, now);
        if transition.is_none() {
            debug!(state = %self.state.current(), %verdict, "Occupancy state unchanged");
        }
        transition
    }

    pub fn commit_transition(&mut self, transition: StateTransition) -> bool {
        let committed = self.state.commit(transition);
        if committed {
            info!(
                previous = %transition.previous_state,
                new = %transition.new_state,
                confidence = ?transition.confidence,
                "Occupancy state changed"
            );
        } else {
            warn!(
                current = %self.state.current(),
                expected = %transition.previous_state,
                "Discarding stale occupancy transition"
            );
        }
        committed
    }

    /// Propose and commit in one step, for callers with nothing to publish.
    pub fn apply_verdict(
        &mut self,
        verdict: OccupancyState,
        snapshot: &AggregateSnapshot,
        now: SystemTime,
    ) -> Option<StateTransition> {
        let transition = self.propose_transition(verdict, snapshot, now)?;
        self.commit_transition(transition).then_some(transition)
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionSettings::default())
    }
}

/// Run one analysis cycle: snapshot, consult the oracle without holding the
/// lock, then publish any transition and commit it only once published. A
/// failed publish leaves the state as it was, so the next cycle retries.
pub fn run_analysis(
    engine: &SharedEngine,
    oracle: &dyn DecisionOracle,
    publisher: &dyn Publisher,
    now: SystemTime,
) -> Result<Option<StateTransition>, AppError> {
    let prepared = {
        let guard = engine.read().map_err(|_| AppError::StateLock)?;
        guard.prepare_analysis(now)?
    };

    let Some(reply) = request_verdict(oracle, &prepared.request) else {
        return Ok(None);
    };

    let mut guard = engine.write().map_err(|_| AppError::StateLock)?;
    let Some(transition) = guard.propose_transition(reply.verdict, &prepared.snapshot, now) else {
        return Ok(None);
    };

    if let Err(err) = publish_transition(publisher, &transition, &prepared.snapshot, &reply.raw_text) {
        warn!(error = %err, state = %transition.new_state, "Publish failed, occupancy state kept");
        return Err(err.into());
    }
    if !guard.commit_transition(transition) {
        return Ok(None);
    }
    drop(guard);

    info!(state = %transition.new_state, "Occupancy update published");
    Ok(Some(transition))
}
