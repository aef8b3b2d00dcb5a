use std::path::PathBuf;
use std::time::Duration;

use vibedaw_services::EngineConfig;

#[derive(Debug, serde::Serialize, serde::Deserialize, Default)]
pub struct PlayerConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How long the demo plays before stopping
    pub duration_secs: f64,
    /// Transport ticks per second
    pub frame_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            duration_secs: 8.0,
            frame_rate: 60,
        }
    }
}

impl PlaybackConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate.max(1) as f64)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vibedaw")
        .join("config.toml")
}

pub fn load_config() -> PlayerConfig {
    let path = config_path();
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| toml::from_str(&s).ok())
        .unwrap_or_default()
}
