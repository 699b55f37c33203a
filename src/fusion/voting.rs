use crate::fusion::FusionSettings;
use crate::fusion::analyzer::{OccupancyVote, VoteSource, analyze_groups};
use crate::fusion::history::HistoryStore;
use crate::state::OccupancyState;
use std::time::{Duration, SystemTime};

/// Per-cycle view of the sensors, rebuilt for every analysis and discarded after.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateSnapshot {
    pub at: SystemTime,
    pub active_sources: Vec<VoteSource>,
    pub votes: Vec<OccupancyVote>,
    pub occupancy_confirmed: bool,
    pub last_motion_at: Option<SystemTime>,
    pub vacancy_timeout: bool,
    pub predicted_state: OccupancyState,
}

impl AggregateSnapshot {
    /// Seconds since the last motion reading; `None` when motion was never seen.
    pub fn time_since_motion(&self) -> Option<Duration> {
        self.last_motion_at
            .map(|at| self.at.duration_since(at).unwrap_or(Duration::ZERO))
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    pub fn voting_result(&self) -> String {
        format!("{}/{}", self.votes.len(), self.active_sources.len())
    }
}

pub fn aggregate(history: &HistoryStore, now: SystemTime, settings: &FusionSettings) -> AggregateSnapshot {
    let analyses = analyze_groups(history, now, settings);
    let active_sources: Vec<VoteSource> = analyses.iter().map(|a| a.source).collect();
    let votes: Vec<OccupancyVote> = analyses.into_iter().filter_map(|a| a.vote).collect();

    let occupancy_confirmed = votes.len() >= settings.min_sensors_for_occupancy;

    let last_motion_at = history.last_motion_at();
    let vacancy_timeout = match last_motion_at {
        Some(at) => now.duration_since(at).unwrap_or(Duration::ZERO) > settings.vacancy_timeout,
        None => true,
    };

    let predicted_state = if vacancy_timeout {
        OccupancyState::Vacant
    } else if occupancy_confirmed {
        OccupancyState::Occupied
    } else {
        OccupancyState::Unknown
    };

    AggregateSnapshot {
        at: now,
        active_sources,
        votes,
        occupancy_confirmed,
        last_motion_at,
        vacancy_timeout,
        predicted_state,
    }
}
