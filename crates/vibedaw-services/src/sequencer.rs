//! Frame-driven step sequencer: transport clock, note dispatch and the audio session

use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};
use vibedaw_core::timing::PLAY_LEAD_TIME;
use vibedaw_core::{collect_step_notes, DriftPolicy, Song, Transport, TransportState};

use crate::session::{AudioSession, AudioSessionError};

const PLAYHEAD_CAPACITY: usize = 256;

/// Playhead updates for a UI thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayheadEvent {
    StateChanged(TransportState),
    StepChanged(usize),
}

/// Drives a song through an audio session, one frame tick at a time.
///
/// Wall-clock timestamps passed to `play` and `tick` decide step boundaries;
/// notes are placed on the session's audio clock.
pub struct Sequencer {
    transport: Transport,
    session: AudioSession,
    events_tx: Sender<PlayheadEvent>,
    events_rx: Receiver<PlayheadEvent>,
}

impl Sequencer {
    pub fn new(session: AudioSession, drift_policy: DriftPolicy) -> Self {
        let (events_tx, events_rx) = bounded(PLAYHEAD_CAPACITY);
        Self {
            transport: Transport::new(drift_policy),
            session,
            events_tx,
            events_rx,
        }
    }

    pub fn session(&self) -> &AudioSession {
        &self.session
    }

    pub fn current_step(&self) -> usize {
        self.transport.current_step
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn state(&self) -> TransportState {
        self.transport.state
    }

    /// Receiver for playhead events. Events are dropped while it is full.
    pub fn playhead(&self) -> Receiver<PlayheadEvent> {
        self.events_rx.clone()
    }

    /// Queue every sampler track's sample and wait up to `timeout` for them.
    ///
    /// Call before `play`; notes whose sample is still loading are skipped.
    /// Returns false if some samples were still loading at the timeout.
    pub fn preload(&mut self, song: &Song, timeout: Duration) -> bool {
        for track in &song.tracks {
            self.session.preload_track_samples(track);
        }
        let ready = self.session.await_samples(timeout);
        if !ready {
            warn!(?timeout, "Samples still loading, their notes are skipped until ready");
        }
        ready
    }

    /// Start playing from the current step at wall time `now`.
    ///
    /// The audio session is resumed first; if that fails the transport is left
    /// where it was. The current step fires right away, slightly ahead of the
    /// audio clock.
    pub fn play(&mut self, song: &Song, now: f64) -> Result<(), AudioSessionError> {
        if self.transport.is_playing() {
            return Ok(());
        }
        self.session.resume()?;

        for track in &song.tracks {
            self.session.ensure_voice(track);
            self.session.preload_track_samples(track);
        }

        self.transport.play(now);
        info!(step = self.transport.current_step, tempo = song.tempo, "Playing");
        self.emit(PlayheadEvent::StateChanged(TransportState::Playing));

        let start = self.session.now() + PLAY_LEAD_TIME;
        self.dispatch(song, self.transport.current_step, start);
        Ok(())
    }

    /// Pause at the current step and silence whatever is sounding
    pub fn pause(&mut self) {
        if !self.transport.pause() {
            return;
        }
        self.session.clear_scheduled();
        info!(step = self.transport.current_step, "Paused");
        self.emit(PlayheadEvent::StateChanged(TransportState::Paused));
    }

    /// Stop, silence and rewind to step 0
    pub fn stop(&mut self) {
        let previous = self.transport.state;
        let previous_step = self.transport.current_step;
        self.transport.stop();
        self.session.clear_scheduled();

        if previous != TransportState::Stopped {
            info!("Stopped");
            self.emit(PlayheadEvent::StateChanged(TransportState::Stopped));
        }
        if previous_step != 0 {
            self.emit(PlayheadEvent::StepChanged(0));
        }
    }

    /// Per-frame update at wall time `now`. Advances at most one step and
    /// schedules that step's notes one step ahead on the audio clock.
    pub fn tick(&mut self, song: &Song, now: f64) {
        let Some(advance) = self.transport.advance(song, now) else {
            return;
        };

        let step_duration = song.step_duration();
        let start = self.session.now() + step_duration;

        if let Some(abandoned) = advance.shortened_from {
            debug!(abandoned, "Nothing left in the loop, wrapping early");
            self.session.flush_from(start);
        }

        self.emit(PlayheadEvent::StepChanged(advance.step));
        self.dispatch(song, advance.step, start);
    }

    fn dispatch(&mut self, song: &Song, step: usize, start: f64) {
        let events = collect_step_notes(song, step, start, song.step_duration());
        for event in &events {
            match self.session.schedule_note(event) {
                Ok(()) => {}
                Err(e @ AudioSessionError::NotReady(_)) => {
                    debug!(track = %event.track.id, step, "Skipping note: {}", e);
                }
                Err(e) => warn!(track = %event.track.id, step, "Skipping note: {}", e),
            }
        }
    }

    fn emit(&self, event: PlayheadEvent) {
        let _ = self.events_tx.try_send(event);
    }

    /// Stop playback and tear the session down
    pub fn close(&mut self) {
        self.stop();
        self.session.close();
    }
}
