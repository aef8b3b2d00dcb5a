//! Song: tempo, tags and the ordered track list

use serde::{Deserialize, Serialize};

use crate::timing;
use crate::track::{Track, TrackId};

/// Style tag (no playback semantics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Electronic,
    Rock,
    Jazz,
    Ambient,
    Pop,
    Classical,
    Experimental,
}

/// Mood tag (no playback semantics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Energetic,
    Relaxed,
    Dark,
    Bright,
    Mysterious,
}

/// A song as the editing layer owns it; the audio core only reads it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub name: String,
    /// Tempo in BPM (20-300)
    pub tempo: f64,
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub mood: Mood,
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Creation time, milliseconds since the Unix epoch
    #[serde(default)]
    pub created_at: u64,
    /// Last edit time, milliseconds since the Unix epoch
    #[serde(default)]
    pub updated_at: u64,
}

impl Song {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tempo: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tempo,
            style: Style::default(),
            mood: Mood::default(),
            tracks: Vec::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Seconds per step at the (clamped) song tempo
    pub fn step_duration(&self) -> f64 {
        timing::step_duration(self.tempo)
    }
}
