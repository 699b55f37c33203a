use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyState {
    Vacant,
    Occupied,
    Unknown,
}

impl OccupancyState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vacant => "vacant",
            Self::Occupied => "occupied",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn from_votes(votes: usize, min_votes: usize) -> Self {
        if votes >= min_votes { Self::High } else { Self::Low }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub previous_state: OccupancyState,
    pub new_state: OccupancyState,
    pub at: SystemTime,
    pub confidence: Confidence,
}

/// Authoritative occupancy state. Only oracle verdicts move it.
#[derive(Debug, Clone)]
pub struct OccupancyStateMachine {
    current: OccupancyState,
    last_occupied_time: Option<SystemTime>,
    last_vacant_time: Option<SystemTime>,
    last_transition: Option<StateTransition>,
}

impl OccupancyStateMachine {
    pub fn new() -> Self {
        Self {
            current: OccupancyState::Vacant,
            last_occupied_time: None,
            last_vacant_time: None,
            last_transition: None,
        }
    }

    pub fn current(&self) -> OccupancyState {
        self.current
    }

    pub fn last_occupied_time(&self) -> Option<SystemTime> {
        self.last_occupied_time
    }

    pub fn last_vacant_time(&self) -> Option<SystemTime> {
        self.last_vacant_time
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.last_transition.as_ref()
    }

    /// Work out the transition a verdict would cause without applying it.
    /// `Unknown` and same-state verdicts yield nothing, which keeps the last
    /// confirmed state through ambiguous cycles.
    pub fn propose(
        &self,
        verdict: OccupancyState,
        confidence: Confidence,
        at: SystemTime,
    ) -> Option<StateTransition> {
        if verdict == OccupancyState::Unknown || verdict == self.current {
            return None;
        }
        Some(StateTransition {
            previous_state: self.current,
            new_state: verdict,
            at,
            confidence,
        })
    }

    /// Make a proposed transition authoritative. Stale proposals, whose
    /// previous state no longer matches, are rejected.
    pub fn commit(&mut self, transition: StateTransition) -> bool {
        if transition.previous_state != self.current || transition.new_state == OccupancyState::Unknown {
            return false;
        }
        self.current = transition.new_state;
        match transition.new_state {
            OccupancyState::Occupied => self.last_occupied_time = Some(transition.at),
            OccupancyState::Vacant => self.last_vacant_time = Some(transition.at),
            OccupancyState::Unknown => {}
        }
        self.last_transition = Some(transition);
        true
    }

    pub fn apply_verdict(
        &mut self,
        verdict: OccupancyState,
        confidence: Confidence,
        at: SystemTime,
    ) -> Option<StateTransition> {
        let transition = self.propose(verdict, confidence, at)?;
        self.commit(transition).then_some(transition)
    }
}

impl Default for OccupancyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
