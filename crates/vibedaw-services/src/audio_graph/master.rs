//! Master bus: master gain into a peak limiter using fundsp

use std::fmt;

use fundsp::hacker::*;
use serde::{Deserialize, Serialize};

/// Limiter settings for the master bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    pub threshold_db: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            threshold_db: -9.0,
            attack_ms: 3.0,
            release_ms: 50.0,
        }
    }
}

/// Sum of all voices passes through here before reaching the output
pub struct MasterBus {
    gain: f32,
    config: LimiterConfig,
    threshold_linear: f32,
    limiter: An<Limiter<U1>>,
}

impl MasterBus {
    pub fn new(gain: f32, config: LimiterConfig, sample_rate: u32) -> Self {
        let mut limiter = limiter(config.attack_ms / 1000.0, config.release_ms / 1000.0);
        limiter.set_sample_rate(sample_rate as f64);
        Self {
            gain,
            config,
            threshold_linear: db_amp(config.threshold_db) as f32,
            limiter,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.limiter.set_sample_rate(sample_rate as f64);
    }

    /// Apply master gain and limiting to one mono sample
    pub fn process(&mut self, sample: f32) -> f32 {
        let scaled = sample * self.gain / self.threshold_linear;
        let input = Frame::from([scaled]);
        let output = self.limiter.tick(&input);
        output[0] * self.threshold_linear
    }
}

impl fmt::Debug for MasterBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterBus")
            .field("gain", &self.gain)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;

    #[test]
    fn test_loud_input_settles_under_threshold() {
        let config = LimiterConfig::default();
        let mut bus = MasterBus::new(1.0, config, SAMPLE_RATE);
        let output: Vec<f32> = (0..SAMPLE_RATE).map(|_| bus.process(1.0)).collect();

        let ceiling = db_amp(config.threshold_db) as f32;
        let tail = &output[output.len() / 2..];
        let peak = tail.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak <= ceiling * 1.01, "peak {peak} above ceiling {ceiling}");
        assert!(peak > ceiling * 0.5, "limiter over-attenuated: {peak}");
    }

    #[test]
    fn test_master_gain_applied_below_threshold() {
        let mut bus = MasterBus::new(0.5, LimiterConfig::default(), SAMPLE_RATE);
        let settled = (0..SAMPLE_RATE / 2).map(|_| bus.process(0.1)).last().unwrap_or(0.0);
        assert!((settled - 0.05).abs() < 1e-3, "expected 0.05, got {settled}");
    }
}
