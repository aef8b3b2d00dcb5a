//! Transport state and step advance

use serde::{Deserialize, Serialize};

use crate::dispatch::has_notes_from;
use crate::song::Song;
use crate::timing::{self, TOTAL_STEPS};

/// Transport playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// How the step boundary is re-anchored after each advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Anchor moves by exactly one step; drift stays within one frame
    #[default]
    ScheduledBoundary,
    /// Anchor moves to the tick that crossed the boundary; drift accumulates
    LastObservedTick,
}

/// Result of a step advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepAdvance {
    /// Step that is now current
    pub step: usize,
    /// Step the loop would have entered when it was cut short back to 0
    pub shortened_from: Option<usize>,
}

/// Transport controls and position, driven by frame timestamps in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transport {
    pub state: TransportState,
    /// Current step (0..TOTAL_STEPS)
    pub current_step: usize,
    /// Wall time of the last step boundary
    pub last_step_time: f64,
    pub drift_policy: DriftPolicy,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            state: TransportState::Stopped,
            current_step: 0,
            last_step_time: 0.0,
            drift_policy: DriftPolicy::default(),
        }
    }
}

impl Transport {
    pub fn new(drift_policy: DriftPolicy) -> Self {
        Self {
            drift_policy,
            ..Default::default()
        }
    }

    /// Start playing from the current step; returns false if already playing
    pub fn play(&mut self, now: f64) -> bool {
        if self.is_playing() {
            return false;
        }
        self.state = TransportState::Playing;
        self.last_step_time = now;
        true
    }

    /// Pause, keeping the step; returns false if not playing
    pub fn pause(&mut self) -> bool {
        if !self.is_playing() {
            return false;
        }
        self.state = TransportState::Paused;
        true
    }

    /// Stop and rewind to step 0
    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
        self.current_step = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    /// Advance at most one step if a boundary has been crossed by `now`.
    ///
    /// When the next step starts a bar and no audible track has anything at or
    /// beyond it, the loop is cut short back to step 0.
    pub fn advance(&mut self, song: &Song, now: f64) -> Option<StepAdvance> {
        if !self.is_playing() {
            return None;
        }

        let step_duration = song.step_duration();
        if now - self.last_step_time < step_duration {
            return None;
        }

        let mut next = (self.current_step + 1) % TOTAL_STEPS;
        let mut shortened_from = None;
        if next != 0 && timing::is_bar_boundary(next) && !has_notes_from(song, next) {
            shortened_from = Some(next);
            next = 0;
        }

        self.current_step = next;
        self.last_step_time = match self.drift_policy {
            DriftPolicy::LastObservedTick => now,
            DriftPolicy::ScheduledBoundary => {
                let boundary = self.last_step_time + step_duration;
                // A stall longer than a step would otherwise fire a burst of catch-up steps
                if now - boundary >= step_duration { now } else { boundary }
            }
        };

        Some(StepAdvance { step: next, shortened_from })
    }
}
