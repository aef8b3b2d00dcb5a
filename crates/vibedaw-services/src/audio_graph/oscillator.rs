//! Free-running oscillator for synth voices

use std::f64::consts::TAU;

use vibedaw_core::Waveform;

use super::param::AudioParam;

/// Continuously running oscillator; frequency is automatable
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: AudioParam,
    phase: f64,
    running: bool,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            frequency: AudioParam::new(440.0),
            phase: 0.0,
            running: true,
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Produce the sample at time `t` and advance the phase by one frame
    pub fn tick(&mut self, t: f64, sample_rate: f64) -> f32 {
        if !self.running {
            return 0.0;
        }
        let out = shape(self.waveform, self.phase);
        let frequency = self.frequency.value_at(t) as f64;
        self.phase = (self.phase + frequency / sample_rate).rem_euclid(1.0);
        out
    }
}

/// Waveform value for a phase in [0, 1)
fn shape(waveform: Waveform, phase: f64) -> f32 {
    let value = match waveform {
        Waveform::Sine => (TAU * phase).sin(),
        Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
        Waveform::Sawtooth => 2.0 * phase - 1.0,
        Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
    };
    value as f32
}
