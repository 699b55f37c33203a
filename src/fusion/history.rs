use crate::sensor::{SensorReading, SensorRole};
use std::collections::VecDeque;
use std::time::SystemTime;

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// Bounded per-role FIFO of recent readings, kept in arrival order.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    buffers: [VecDeque<SensorReading>; 4],
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffers: std::array::from_fn(|_| VecDeque::with_capacity(capacity + 1)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading, evicting the oldest entries beyond capacity.
    pub fn append(&mut self, role: SensorRole, reading: SensorReading) {
        let buffer = &mut self.buffers[role.index()];
        buffer.push_back(reading);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    pub fn latest(&self, role: SensorRole) -> Option<&SensorReading> {
        self.buffers[role.index()].back()
    }

    /// The last `k` readings in arrival order.
    pub fn recent(&self, role: SensorRole, k: usize) -> Vec<SensorReading> {
        let buffer = &self.buffers[role.index()];
        let skip = buffer.len().saturating_sub(k);
        buffer.iter().skip(skip).copied().collect()
    }

    pub fn history(&self, role: SensorRole) -> &VecDeque<SensorReading> {
        &self.buffers[role.index()]
    }

    /// Most recent observation time of a motion reading across every role.
    pub fn last_motion_at(&self) -> Option<SystemTime> {
        self.buffers
            .iter()
            .filter_map(|buffer| buffer.iter().rev().find(|r| r.motion))
            .map(|r| r.observed_at)
            .max()
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
