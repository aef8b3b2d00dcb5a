//! Engine settings shared by every audio session

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vibedaw_core::DriftPolicy;

use crate::audio_graph::LimiterConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate used for offline rendering and until the device reports its own
    pub sample_rate: u32,
    pub master_gain: f32,
    pub limiter: LimiterConfig,
    pub drift_policy: DriftPolicy,
    /// Directory non-http sample URLs resolve against
    pub sample_root: PathBuf,
    pub fetch_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            master_gain: 0.8,
            limiter: LimiterConfig::default(),
            drift_policy: DriftPolicy::default(),
            sample_root: PathBuf::from("samples"),
            fetch_timeout_secs: 10,
        }
    }
}

impl EngineConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
