//! Track representation

use serde::{Deserialize, Serialize};

use crate::instrument::{InstrumentKind, InstrumentSettings};
use crate::note::Note;

/// Unique identifier for tracks
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A sequencer track: one instrument and its step pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    #[serde(flatten)]
    pub instrument: InstrumentSettings,
    /// Notes, looked up by step (order is irrelevant)
    #[serde(rename = "sequence", default)]
    pub notes: Vec<Note>,
    /// Muted state
    #[serde(default)]
    pub mute: bool,
    /// Solo state (stored for the UI, playback ignores it)
    #[serde(default)]
    pub solo: bool,
    /// Display color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Track {
    pub fn new(id: TrackId, name: impl Into<String>, instrument: InstrumentSettings) -> Self {
        Self {
            id,
            name: name.into(),
            instrument,
            notes: Vec::new(),
            mute: false,
            solo: false,
            color: None,
        }
    }

    pub fn with_notes(mut self, notes: impl IntoIterator<Item = Note>) -> Self {
        self.notes.extend(notes);
        self
    }

    pub fn kind(&self) -> InstrumentKind {
        self.instrument.kind()
    }

    /// All notes starting at `step`, duplicates included
    pub fn notes_at(&self, step: usize) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(move |n| n.step as usize == step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{SynthSettings, Waveform};

    #[test]
    fn test_notes_at_keeps_duplicates() {
        let track = Track::new(TrackId::new("t"), "Lead", InstrumentSettings::Synthesizer(SynthSettings::new(Waveform::Square)))
            .with_notes([Note::new(4, 60, 100, 1), Note::new(4, 67, 90, 1), Note::new(5, 60, 100, 1)]);
        assert_eq!(track.notes_at(4).count(), 2);
        assert_eq!(track.notes_at(6).count(), 0);
    }

    #[test]
    fn test_serde_shape() {
        let json = r#"{
            "id": "s1", "name": "Kick", "instrumentType": "sampler",
            "settings": { "volume": 1, "pan": 0, "sampleUrl": "/Kick Basic.wav", "pitch": 0 },
            "sequence": [{ "step": 0, "pitch": 36, "velocity": 100, "duration": 2 }],
            "mute": false, "solo": false
        }"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert_eq!(track.kind(), InstrumentKind::Sampler);
        assert_eq!(track.notes.len(), 1);
        let InstrumentSettings::Sampler(settings) = &track.instrument else {
            panic!("expected sampler settings");
        };
        assert_eq!(settings.sample_url, "/Kick Basic.wav");
    }
}
