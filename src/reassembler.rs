//! Receiver-side reassembly state machine.
//!
//! ```text
//! AwaitingFirstFrame ──frame──▶ Accumulating ──silence > threshold──▶ Finalized
//!                                   │  ▲
//!                                   └──┘ new index: append, reset timer
//! ```
//!
//! The receiver has no back-channel and does not know the frame count, so completion is
//! inferred from silence: once at least one frame is buffered and no new index has been seen
//! for longer than the inactivity threshold, the session finalizes.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, trace, warn};

use crate::{stream_digest, Frame, Result, TransferError};

/// Default silence that ends a capture session.
pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(2);

/// What to do when the index sequence has a gap or jumps backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossPolicy {
    /// Log the anomaly and keep the frame.
    #[default]
    LogAndContinue,
    /// Abort the session on the first anomaly.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingFirstFrame,
    Accumulating,
    Finalized,
}

/// A newly accepted index that does not follow the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderingAnomaly {
    pub previous: u64,
    pub current: u64,
}

impl OrderingAnomaly {
    /// Index that would have been contiguous.
    pub fn expected(&self) -> u64 {
        self.previous.wrapping_add(1)
    }
}

/// Result of offering one decoded frame to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Payload was appended. Carries the anomaly if the index was not `last + 1`.
    Appended { anomaly: Option<OrderingAnomaly> },
    /// Same index as the previous frame; nothing appended.
    Duplicate,
    /// Session is already finalized.
    Closed,
}

/// Summary of a finished (or aborted) capture session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub frames_accepted: u64,
    pub duplicates_suppressed: u64,
    /// Accepted frames whose index had already been appended earlier in the session.
    pub revisits: u64,
    pub ordering_anomalies: Vec<OrderingAnomaly>,
    pub corrupt_detections: u64,
    pub ambiguous_samples: u64,
    /// Inclusive index ranges never observed between 0 and the highest index seen.
    pub missing_ranges: Vec<(u64, u64)>,
    pub bytes: u64,
    pub digest: String,
}

/// Capture session: owns the output buffer exclusively.
pub struct Reassembler {
    state: SessionState,
    threshold: Duration,
    policy: LossPolicy,
    last_index: Option<u64>,
    last_activity: Option<Instant>,
    seen: BTreeSet<u64>,
    buffer: Vec<u8>,
    frames_accepted: u64,
    duplicates: u64,
    revisits: u64,
    anomalies: Vec<OrderingAnomaly>,
    corrupt: u64,
    ambiguous: u64,
}

impl Reassembler {
    pub fn new(threshold: Duration, policy: LossPolicy) -> Self {
        Reassembler {
            state: SessionState::AwaitingFirstFrame,
            threshold,
            policy,
            last_index: None,
            last_activity: None,
            seen: BTreeSet::new(),
            buffer: Vec::new(),
            frames_accepted: 0,
            duplicates: 0,
            revisits: 0,
            anomalies: Vec::new(),
            corrupt: 0,
            ambiguous: 0,
        }
    }

    /// Offer a decoded frame observed at `now`.
    ///
    /// # Errors
    /// - `TransferError::OrderingAnomaly` under [`LossPolicy::FailFast`]; the frame is not
    ///   appended and the session should be abandoned.
    pub fn accept(&mut self, frame: Frame, now: Instant) -> Result<FrameOutcome> {
        let anomaly = match (self.state, self.last_index) {
            (SessionState::Finalized, _) => {
                trace!(index = frame.index, "session finalized, frame dropped");
                return Ok(FrameOutcome::Closed);
            }
            (_, Some(last)) if last == frame.index => {
                self.duplicates += 1;
                trace!(index = frame.index, "duplicate detection suppressed");
                return Ok(FrameOutcome::Duplicate);
            }
            (_, Some(last)) if last.checked_add(1) != Some(frame.index) => Some(OrderingAnomaly {
                previous: last,
                current: frame.index,
            }),
            _ => None,
        };

        if let Some(anomaly) = anomaly {
            warn!(
                previous = anomaly.previous,
                current = anomaly.current,
                "index does not immediately follow previous index"
            );
            if self.policy == LossPolicy::FailFast {
                return Err(TransferError::OrderingAnomaly {
                    expected: anomaly.expected(),
                    actual: anomaly.current,
                });
            }
            self.anomalies.push(anomaly);
        }

        if !self.seen.insert(frame.index) {
            self.revisits += 1;
            warn!(index = frame.index, "index re-observed, appending again");
        }

        info!(index = frame.index, len = frame.payload.len(), "frame accepted");
        self.buffer.extend_from_slice(&frame.payload);
        self.frames_accepted += 1;
        self.last_index = Some(frame.index);
        self.last_activity = Some(now);
        self.state = SessionState::Accumulating;

        Ok(FrameOutcome::Appended { anomaly })
    }

    /// Check the inactivity timer. Returns `true` once the session is finalized.
    ///
    /// Before the first frame the timer is not armed, so a session never finalizes on
    /// silence alone.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.state == SessionState::Accumulating {
            if let Some(last) = self.last_activity {
                let idle = now.saturating_duration_since(last);
                if idle > self.threshold {
                    info!(
                        idle_ms = idle.as_millis() as u64,
                        frames = self.frames_accepted,
                        "no new frame within inactivity threshold, finalizing"
                    );
                    self.state = SessionState::Finalized;
                }
            }
        }
        self.state == SessionState::Finalized
    }

    /// Finalize immediately, e.g. when the capture feed has ended.
    pub fn finalize(&mut self) {
        self.state = SessionState::Finalized;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_finalized(&self) -> bool {
        self.state == SessionState::Finalized
    }

    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn anomalies(&self) -> &[OrderingAnomaly] {
        &self.anomalies
    }

    /// Note a detected symbol whose contents did not decode to a frame.
    pub fn record_corrupt(&mut self) {
        self.corrupt += 1;
    }

    /// Note a sample that carried more than one symbol.
    pub fn record_ambiguous(&mut self) {
        self.ambiguous += 1;
    }

    /// Inclusive ranges of indices never appended, up to the highest index seen.
    pub fn missing_ranges(&self) -> Vec<(u64, u64)> {
        let mut missing = Vec::new();
        let mut next_expected = 0u64;
        for &index in &self.seen {
            if index > next_expected {
                missing.push((next_expected, index - 1));
            }
            next_expected = index.saturating_add(1);
        }
        missing
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            frames_accepted: self.frames_accepted,
            duplicates_suppressed: self.duplicates,
            revisits: self.revisits,
            ordering_anomalies: self.anomalies.clone(),
            corrupt_detections: self.corrupt,
            ambiguous_samples: self.ambiguous,
            missing_ranges: self.missing_ranges(),
            bytes: self.buffer.len() as u64,
            digest: format!("{:016x}", stream_digest(&self.buffer)),
        }
    }

    /// Consume the session and hand over the reassembled stream.
    pub fn into_stream(self) -> Vec<u8> {
        self.buffer
    }
}
