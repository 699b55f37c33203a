//! Ingestion and analysis, decoupled.
//!
//! Ingestion appends to history under the engine lock and, when the debounce
//! allows, drops an [`AnalysisRequest`] into a single-slot queue. One worker
//! thread drains that slot and runs the analysis cycle, so a slow oracle call
//! never stalls ingestion. While a request is already pending, further
//! requests are coalesced into it: the worker snapshots history when it picks
//! the request up, so the pending request already covers them.

use crate::error::AppError;
use crate::fusion::{IngestOutcome, SharedEngine, run_analysis};
use crate::oracle::DecisionOracle;
use crate::publish::Publisher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// When coalesced, the pending request keeps the time of the oldest trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub requested_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Queued,
    /// A request was already pending and absorbs this one.
    Coalesced,
    /// The worker is gone.
    Closed,
}

#[derive(Debug, Clone)]
pub struct AnalysisHandle {
    sender: SyncSender<AnalysisRequest>,
}

impl AnalysisHandle {
    pub fn request(&self, request: AnalysisRequest) -> RequestStatus {
        match self.sender.try_send(request) {
            Ok(()) => RequestStatus::Queued,
            Err(TrySendError::Full(_)) => RequestStatus::Coalesced,
            Err(TrySendError::Disconnected(_)) => RequestStatus::Closed,
        }
    }
}

/// Single-slot request queue.
pub fn analysis_channel() -> (AnalysisHandle, Receiver<AnalysisRequest>) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (AnalysisHandle { sender }, receiver)
}

/// Feeds transport events into the engine and schedules analysis.
#[derive(Debug, Clone)]
pub struct EventIngestor {
    engine: SharedEngine,
    analysis: AnalysisHandle,
}

impl EventIngestor {
    pub fn new(engine: SharedEngine, analysis: AnalysisHandle) -> Self {
        Self { engine, analysis }
    }

    pub fn handle_event(&self, topic: &str, payload: &[u8]) -> Result<Option<IngestOutcome>, AppError> {
        self.handle_event_at(topic, payload, SystemTime::now())
    }

    pub fn handle_event_at(
        &self,
        topic: &str,
        payload: &[u8],
        now: SystemTime,
    ) -> Result<Option<IngestOutcome>, AppError> {
        let outcome = {
            let mut guard = self.engine.write().map_err(|_| AppError::StateLock)?;
            guard.ingest(topic, payload, now)?
        };

        if let Some(outcome) = outcome.as_ref()
            && outcome.analysis_due
        {
            let status = self.analysis.request(AnalysisRequest { requested_at: now });
            match status {
                RequestStatus::Queued => debug!(role = outcome.role.as_str(), "Analysis requested"),
                RequestStatus::Coalesced => debug!("Analysis already pending, request coalesced"),
                RequestStatus::Closed => warn!("Analysis worker stopped, request dropped"),
            }
        }

        Ok(outcome)
    }
}

pub struct AnalysisWorker {
    handle: AnalysisHandle,
    stop: Arc<AtomicBool>,
    thread: std::thread::JoinHandle<()>,
}

impl AnalysisWorker {
    pub fn spawn(
        engine: SharedEngine,
        oracle: Arc<dyn DecisionOracle>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        let (handle, receiver) = analysis_channel();
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || worker_loop(receiver, engine, oracle, publisher, stop))
        };
        info!("Analysis worker started");
        Self {
            handle,
            stop,
            thread,
        }
    }

    pub fn handle(&self) -> AnalysisHandle {
        self.handle.clone()
    }

    /// Signal the worker to stop without waiting for an in-flight oracle call.
    pub fn stop(self) {
        self.stop.store(true, Ordering::Relaxed);
        if !self.thread.is_finished() {
            debug!("Analysis worker detached while busy");
        }
    }
}

fn worker_loop(
    receiver: Receiver<AnalysisRequest>,
    engine: SharedEngine,
    oracle: Arc<dyn DecisionOracle>,
    publisher: Arc<dyn Publisher>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Relaxed) {
        let request = match receiver.recv_timeout(STOP_POLL_INTERVAL) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let now = SystemTime::now();
        let oldest_pending = now.duration_since(request.requested_at).unwrap_or(Duration::ZERO);
        debug!(
            oldest_pending_ms = oldest_pending.as_millis() as u64,
            "Running analysis cycle on a fresh snapshot"
        );

        if let Err(err) = run_analysis(&engine, oracle.as_ref(), publisher.as_ref(), now) {
            warn!(error = %err, "Analysis cycle failed");
        }
    }
    info!("Analysis worker stopped");
}
