//! Audio session: the graph shared with the audio thread, its output and its samples

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use vibedaw_core::timing::FADE_TIME;
use vibedaw_core::{InstrumentSettings, NoteEvent, Track};

use crate::audio_graph::{AudioGraph, MasterBus, TriggerRecord, Voice, VoiceHandle};
use crate::audio_io::{AudioInitError, CpalBackend, OfflineBackend, OutputBackend};
use crate::config::EngineConfig;
use crate::envelope::{cut_source, fade_out, trigger_sampler, trigger_synth};
use crate::sample_cache::{HttpSampleSource, SampleCache, SampleLoadError, SampleSource};

#[derive(Debug, Error)]
pub enum AudioSessionError {
    #[error("Audio output error: {0}")]
    Init(#[from] AudioInitError),
    #[error("Sample error: {0}")]
    SampleLoad(#[from] SampleLoadError),
    #[error("Sample still loading: {0}")]
    NotReady(String),
    #[error("Audio session closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Suspended,
    Running,
    Closed,
}

/// State shared between the control thread and the audio thread
pub struct SessionState {
    graph: Mutex<AudioGraph>,
    /// Audio clock in seconds, as f64 bits, published after each block
    clock_bits: AtomicU64,
}

impl SessionState {
    pub fn new(graph: AudioGraph) -> Self {
        let now = graph.current_time();
        Self {
            graph: Mutex::new(graph),
            clock_bits: AtomicU64::new(now.to_bits()),
        }
    }

    /// Audio thread entry point: render one block of interleaved frames
    pub fn render(&self, out: &mut [f32], sample_rate: u32, channels: u16) {
        let Ok(mut graph) = self.graph.lock() else {
            out.fill(0.0);
            return;
        };
        graph.set_sample_rate(sample_rate);
        graph.render(out, channels);
        self.clock_bits.store(graph.current_time().to_bits(), Ordering::Release);
    }

    /// Audio clock as of the last rendered block
    pub fn now(&self) -> f64 {
        f64::from_bits(self.clock_bits.load(Ordering::Acquire))
    }

    /// Run `f` with the graph locked. Everything `f` schedules is seen by the
    /// audio thread atomically.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> R {
        let mut graph = self.graph.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut graph)
    }
}

/// Owns the output backend, the shared graph and the sample cache
pub struct AudioSession {
    state: Arc<SessionState>,
    backend: Box<dyn OutputBackend>,
    samples: SampleCache,
    status: SessionStatus,
}

impl AudioSession {
    pub fn new(config: &EngineConfig, backend: Box<dyn OutputBackend>, source: Box<dyn SampleSource>) -> Self {
        let master = MasterBus::new(config.master_gain, config.limiter, config.sample_rate);
        let graph = AudioGraph::new(config.sample_rate, master);
        Self {
            state: Arc::new(SessionState::new(graph)),
            backend,
            samples: SampleCache::new(source),
            status: SessionStatus::Suspended,
        }
    }

    /// Session on the default output device, fetching samples over HTTP or from the sample root
    pub fn realtime(config: &EngineConfig) -> Self {
        let source = HttpSampleSource::new(config.sample_root.clone(), config.fetch_timeout());
        Self::new(config, Box::new(CpalBackend::new()), Box::new(source))
    }

    /// Session without a device; frames are rendered with `render_offline`
    pub fn offline(config: &EngineConfig, source: Box<dyn SampleSource>) -> Self {
        Self::new(config, Box::new(OfflineBackend::new()), source)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> Arc<SessionState> {
        Arc::clone(&self.state)
    }

    /// Start the output. Must succeed before `now` is meaningful.
    pub fn resume(&mut self) -> Result<(), AudioSessionError> {
        match self.status {
            SessionStatus::Running => Ok(()),
            SessionStatus::Closed => Err(AudioSessionError::Closed),
            SessionStatus::Suspended => {
                self.backend.start(Arc::clone(&self.state))?;
                self.status = SessionStatus::Running;
                info!(now = self.now(), "Audio session resumed");
                Ok(())
            }
        }
    }

    /// Audio clock in seconds
    pub fn now(&self) -> f64 {
        self.state.now()
    }

    /// Render `frames` mono frames, advancing the audio clock
    pub fn render_offline(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        let sample_rate = self.state.with_graph(|graph| graph.sample_rate());
        self.state.render(&mut out, sample_rate, 1);
        out
    }

    pub fn ensure_voice(&self, track: &Track) -> VoiceHandle {
        self.state.with_graph(|graph| graph.ensure_voice(track))
    }

    pub fn with_graph<R>(&self, f: impl FnOnce(&mut AudioGraph) -> R) -> R {
        self.state.with_graph(f)
    }

    /// Queue a sampler track's sample ahead of its first note. Returns at once;
    /// failures are logged by the loader and remembered for the session.
    pub fn preload_track_samples(&mut self, track: &Track) {
        let InstrumentSettings::Sampler(settings) = &track.instrument else {
            return;
        };
        self.samples.request(&settings.sample_url);
    }

    /// Block until queued samples have loaded or failed, up to `timeout`
    pub fn await_samples(&mut self, timeout: Duration) -> bool {
        self.samples.wait(timeout)
    }

    pub fn samples(&self) -> &SampleCache {
        &self.samples
    }

    /// Realize one note on its track's voice
    pub fn schedule_note(&mut self, event: &NoteEvent<'_>) -> Result<(), AudioSessionError> {
        if self.status == SessionStatus::Closed {
            return Err(AudioSessionError::Closed);
        }

        let track = event.track;
        let (start, duration) = (event.start_time, event.duration);

        match &track.instrument {
            InstrumentSettings::Sampler(settings) => {
                let Some(buffer) = self.samples.get(&settings.sample_url)? else {
                    return Err(AudioSessionError::NotReady(settings.sample_url.clone()));
                };
                self.state.with_graph(|graph| {
                    graph.ensure_voice(track);
                    let node = graph.allocate_node();
                    let sample_rate = graph.sample_rate();
                    let Some(Voice::Sampler(voice)) = graph.voice_mut(&track.id) else {
                        return;
                    };
                    trigger_sampler(voice, node, buffer, sample_rate, &event.note, settings, start, duration);
                    graph.record_trigger(TriggerRecord { track_id: track.id.clone(), node, start_time: start, duration });
                });
            }
            InstrumentSettings::Synthesizer(settings) => {
                self.state.with_graph(|graph| {
                    let handle = graph.ensure_voice(track);
                    let Some(Voice::Synth(voice)) = graph.voice_mut(&track.id) else {
                        return;
                    };
                    trigger_synth(voice, &event.note, settings, start, duration);
                    let node = handle.oscillator.unwrap_or(handle.gain);
                    graph.record_trigger(TriggerRecord { track_id: track.id.clone(), node, start_time: start, duration });
                });
            }
        }
        Ok(())
    }

    /// Fade every voice out from audio now and stop sounding sources
    pub fn clear_scheduled(&self) {
        let now = self.now();
        self.flush_from(now);
    }

    /// Fade every voice to the floor from `when`, dropping automation scheduled
    /// after it and stopping sampler sources one fade window later
    pub fn flush_from(&self, when: f64) {
        self.state.with_graph(|graph| {
            let mut voices = 0;
            for voice in graph.voices_mut() {
                fade_out(voice.gain_mut(), when);
                if let Voice::Sampler(sampler) = voice {
                    for source in &mut sampler.sources {
                        cut_source(source, when);
                    }
                }
                voices += 1;
            }
            debug!(when, voices, fade = FADE_TIME, "Flushed scheduled notes");
        });
    }

    /// Stop the output, tear down every voice and drop cached samples. Idempotent.
    pub fn close(&mut self) {
        if self.status == SessionStatus::Closed {
            return;
        }
        self.backend.stop();
        self.state.with_graph(|graph| graph.teardown());
        self.samples.clear();
        self.status = SessionStatus::Closed;
        info!("Audio session closed");
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.close();
    }
}
