//! Per-track voice graph and the master bus it renders into

mod buffer_source;
mod master;
mod oscillator;
mod param;

pub use buffer_source::BufferSource;
pub use master::{LimiterConfig, MasterBus};
pub use oscillator::Oscillator;
pub use param::AudioParam;

use std::collections::{HashMap, VecDeque};

use tracing::debug;
use vibedaw_core::{InstrumentKind, InstrumentSettings, Track, TrackId};

const TRIGGER_HISTORY: usize = 256;

/// Identifier of a node in the graph, stable for the node's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Persistent nodes that make up a track's voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceHandle {
    pub track_id: TrackId,
    pub kind: InstrumentKind,
    /// Track-level gain node
    pub gain: NodeId,
    /// Oscillator node (synth voices only)
    pub oscillator: Option<NodeId>,
}

/// Synth voice: one oscillator into one gain, both living as long as the session
#[derive(Debug)]
pub struct SynthVoice {
    pub(crate) gain_node: NodeId,
    pub(crate) oscillator_node: NodeId,
    pub gain: AudioParam,
    pub oscillator: Oscillator,
}

/// Sampler voice: a track gain fed by short-lived buffer sources
#[derive(Debug)]
pub struct SamplerVoice {
    pub(crate) gain_node: NodeId,
    pub gain: AudioParam,
    pub(crate) sources: Vec<BufferSource>,
    /// Most recently triggered source, the one voice stealing cuts off
    pub(crate) current: Option<NodeId>,
}

impl SamplerVoice {
    pub fn sources(&self) -> &[BufferSource] {
        &self.sources
    }

    pub fn current_source_mut(&mut self) -> Option<&mut BufferSource> {
        let current = self.current?;
        self.sources.iter_mut().find(|s| s.id() == current)
    }
}

#[derive(Debug)]
pub enum Voice {
    Synth(SynthVoice),
    Sampler(SamplerVoice),
}

impl Voice {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Self::Synth(_) => InstrumentKind::Synthesizer,
            Self::Sampler(_) => InstrumentKind::Sampler,
        }
    }

    /// The track-level gain parameter
    pub fn gain_mut(&mut self) -> &mut AudioParam {
        match self {
            Self::Synth(v) => &mut v.gain,
            Self::Sampler(v) => &mut v.gain,
        }
    }

    fn handle(&self, track_id: &TrackId) -> VoiceHandle {
        match self {
            Self::Synth(v) => VoiceHandle {
                track_id: track_id.clone(),
                kind: InstrumentKind::Synthesizer,
                gain: v.gain_node,
                oscillator: Some(v.oscillator_node),
            },
            Self::Sampler(v) => VoiceHandle {
                track_id: track_id.clone(),
                kind: InstrumentKind::Sampler,
                gain: v.gain_node,
                oscillator: None,
            },
        }
    }

    /// Stop every running node
    fn shut_down(&mut self, now: f64) {
        match self {
            Self::Synth(v) => v.oscillator.stop(),
            Self::Sampler(v) => {
                for source in &mut v.sources {
                    source.stop(now);
                }
                v.sources.clear();
                v.current = None;
            }
        }
    }
}

/// A note realized on a voice, kept for activity display and diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerRecord {
    pub track_id: TrackId,
    pub node: NodeId,
    pub start_time: f64,
    pub duration: f64,
}

/// The whole signal graph: voices keyed by track, master bus, audio clock
#[derive(Debug)]
pub struct AudioGraph {
    sample_rate: u32,
    frames_rendered: u64,
    voices: HashMap<TrackId, Voice>,
    master: MasterBus,
    next_node: u64,
    triggers: VecDeque<TriggerRecord>,
}

impl AudioGraph {
    pub fn new(sample_rate: u32, master: MasterBus) -> Self {
        Self {
            sample_rate,
            frames_rendered: 0,
            voices: HashMap::new(),
            master,
            next_node: 1,
            triggers: VecDeque::with_capacity(TRIGGER_HISTORY),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Audio clock in seconds
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    /// Switch sample rate while keeping the clock's position in seconds
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate || sample_rate == 0 {
            return;
        }
        let now = self.current_time();
        self.sample_rate = sample_rate;
        self.frames_rendered = (now * sample_rate as f64).round() as u64;
        self.master.set_sample_rate(sample_rate);
    }

    pub(crate) fn allocate_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    /// Get or lazily create the voice for `track`.
    ///
    /// Synth voices keep their oscillator and only pick up the current waveform.
    /// A voice whose instrument kind no longer matches the track is replaced.
    pub fn ensure_voice(&mut self, track: &Track) -> VoiceHandle {
        let now = self.current_time();
        let mut voice = match self.voices.remove(&track.id) {
            Some(voice) if voice.kind() == track.kind() => voice,
            Some(mut old) => {
                debug!(track = %track.id, "Instrument kind changed, rebuilding voice");
                old.shut_down(now);
                self.build_voice(track)
            }
            None => {
                debug!(track = %track.id, kind = ?track.kind(), "Created voice");
                self.build_voice(track)
            }
        };

        if let (Voice::Synth(synth), InstrumentSettings::Synthesizer(settings)) = (&mut voice, &track.instrument) {
            synth.oscillator.waveform = settings.waveform;
        }
        let handle = voice.handle(&track.id);
        self.voices.insert(track.id.clone(), voice);
        handle
    }

    fn build_voice(&mut self, track: &Track) -> Voice {
        let gain_node = self.allocate_node();
        match &track.instrument {
            InstrumentSettings::Synthesizer(settings) => Voice::Synth(SynthVoice {
                gain_node,
                oscillator_node: self.allocate_node(),
                // Silent until the first envelope, the oscillator itself never stops
                gain: AudioParam::new(0.0),
                oscillator: Oscillator::new(settings.waveform),
            }),
            InstrumentSettings::Sampler(settings) => Voice::Sampler(SamplerVoice {
                gain_node,
                gain: AudioParam::new(settings.volume),
                sources: Vec::new(),
                current: None,
            }),
        }
    }

    pub fn voice(&self, track_id: &TrackId) -> Option<&Voice> {
        self.voices.get(track_id)
    }

    pub fn voice_mut(&mut self, track_id: &TrackId) -> Option<&mut Voice> {
        self.voices.get_mut(track_id)
    }

    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.values_mut()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub(crate) fn record_trigger(&mut self, record: TriggerRecord) {
        if self.triggers.len() == TRIGGER_HISTORY {
            self.triggers.pop_front();
        }
        self.triggers.push_back(record);
    }

    /// Most recent note triggers, oldest first
    pub fn recent_triggers(&self) -> impl Iterator<Item = &TriggerRecord> {
        self.triggers.iter()
    }

    /// Stop all oscillators and sources and drop every voice
    pub fn teardown(&mut self) {
        let now = self.current_time();
        for (_, mut voice) in self.voices.drain() {
            voice.shut_down(now);
        }
        self.triggers.clear();
    }

    /// Render interleaved frames; the mono mix is copied to every channel
    pub fn render(&mut self, out: &mut [f32], channels: u16) {
        let channels = channels.max(1) as usize;
        let sample_rate = self.sample_rate as f64;
        let block_start = self.current_time();

        for voice in self.voices.values_mut() {
            prune_voice(voice, block_start);
        }

        for frame in out.chunks_mut(channels) {
            let t = self.frames_rendered as f64 / sample_rate;
            let mut mix = 0.0f32;

            for voice in self.voices.values_mut() {
                mix += match voice {
                    Voice::Synth(v) => v.oscillator.tick(t, sample_rate) * v.gain.value_at(t),
                    Voice::Sampler(v) => {
                        let sources: f32 = v.sources.iter_mut().map(|s| s.tick(t)).sum();
                        sources * v.gain.value_at(t)
                    }
                };
            }

            frame.fill(self.master.process(mix));
            self.frames_rendered += 1;
        }
    }
}

/// Drop finished sources and collapse past automation
fn prune_voice(voice: &mut Voice, now: f64) {
    match voice {
        Voice::Synth(v) => {
            v.gain.prune_before(now);
            v.oscillator.frequency.prune_before(now);
        }
        Voice::Sampler(v) => {
            v.gain.prune_before(now);
            for source in &mut v.sources {
                source.expire(now);
                source.gain.prune_before(now);
            }
            v.sources.retain(|s| !s.is_finished());
            if let Some(current) = v.current {
                if !v.sources.iter().any(|s| s.id() == current) {
                    v.current = None;
                }
            }
        }
    }
}
