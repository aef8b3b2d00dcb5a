//! Instrument settings: the sampler/synthesizer tagged union

use serde::{Deserialize, Serialize};

/// Oscillator shape for synthesizer tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Instrument kind without its settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentKind {
    Sampler,
    Synthesizer,
}

/// Sample playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplerSettings {
    /// Volume (0.0 to 1.0)
    pub volume: f32,
    /// Pan (-1.0 left, 1.0 right), reserved
    #[serde(default)]
    pub pan: f32,
    pub sample_url: String,
    /// Pitch shift in semitones
    #[serde(default)]
    pub pitch: f32,
}

impl SamplerSettings {
    pub fn new(sample_url: impl Into<String>) -> Self {
        Self {
            volume: 1.0,
            pan: 0.0,
            sample_url: sample_url.into(),
            pitch: 0.0,
        }
    }

    /// Playback-rate multiplier for the pitch shift
    pub fn playback_rate(&self) -> f64 {
        2.0_f64.powf(self.pitch as f64 / 12.0)
    }
}

/// Oscillator synth settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthSettings {
    /// Volume (0.0 to 1.0)
    pub volume: f32,
    /// Pan (-1.0 left, 1.0 right), reserved
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub waveform: Waveform,
}

impl SynthSettings {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            volume: 0.7,
            pan: 0.0,
            waveform,
        }
    }
}

/// Kind-specific instrument settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instrumentType", content = "settings", rename_all = "lowercase")]
pub enum InstrumentSettings {
    Sampler(SamplerSettings),
    Synthesizer(SynthSettings),
}

impl InstrumentSettings {
    pub fn kind(&self) -> InstrumentKind {
        match self {
            Self::Sampler(_) => InstrumentKind::Sampler,
            Self::Synthesizer(_) => InstrumentKind::Synthesizer,
        }
    }

    /// Clamp volume to 0..=1 and pan to -1..=1
    pub fn clamped(mut self) -> Self {
        let (volume, pan) = match &mut self {
            Self::Sampler(s) => (&mut s.volume, &mut s.pan),
            Self::Synthesizer(s) => (&mut s.volume, &mut s.pan),
        };
        *volume = if volume.is_nan() { 1.0 } else { volume.clamp(0.0, 1.0) };
        *pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };
        self
    }
}
