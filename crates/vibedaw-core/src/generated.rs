//! Ingestion of model-generated instruments, sequences and tracks.
//!
//! Replies are expected to be bare JSON but are often wrapped in Markdown code
//! fences. Anything numeric may arrive as a float. Notes are repaired where
//! possible and dropped where not, so nothing unplayable reaches a `Track`.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::instrument::InstrumentSettings;
use crate::note::Note;
use crate::track::{Track, TrackId};

/// Instrument proposed for an existing track
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedInstrument {
    pub name: String,
    pub instrument: InstrumentSettings,
}

#[derive(Deserialize)]
struct InstrumentSpec {
    name: String,
    #[serde(flatten)]
    instrument: InstrumentSettings,
}

#[derive(Deserialize)]
struct SequenceSpec {
    #[serde(default)]
    notes: Vec<LooseNote>,
}

#[derive(Deserialize)]
struct TrackSpec {
    name: String,
    #[serde(flatten)]
    instrument: InstrumentSettings,
    #[serde(default)]
    sequence: Vec<LooseNote>,
}

#[derive(Deserialize)]
struct LooseNote {
    step: f64,
    #[serde(default = "default_pitch")]
    pitch: f64,
    #[serde(default = "default_velocity")]
    velocity: f64,
    #[serde(default = "default_duration")]
    duration: f64,
}

fn default_pitch() -> f64 { 60.0 }
fn default_velocity() -> f64 { 100.0 }
fn default_duration() -> f64 { 1.0 }

/// Remove a surrounding ```lang ... ``` fence, if any
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `{ name, instrumentType, settings }`
pub fn parse_instrument_spec(raw: &str) -> Result<GeneratedInstrument> {
    let spec: InstrumentSpec = serde_json::from_str(strip_code_fence(raw))?;
    Ok(GeneratedInstrument {
        name: spec.name,
        instrument: spec.instrument.clamped(),
    })
}

/// Parse `{ notes: [...] }` into playable notes
pub fn parse_sequence_spec(raw: &str) -> Result<Vec<Note>> {
    let spec: SequenceSpec = serde_json::from_str(strip_code_fence(raw))?;
    Ok(repair_notes(spec.notes))
}

/// Parse `{ name, instrumentType, settings, sequence }` into a track with the given id
pub fn parse_track_spec(raw: &str, id: TrackId) -> Result<Track> {
    let spec: TrackSpec = serde_json::from_str(strip_code_fence(raw))?;
    let notes = repair_notes(spec.sequence);
    debug!(track = %id, notes = notes.len(), "Parsed generated track");
    Ok(Track::new(id, spec.name, spec.instrument.clamped()).with_notes(notes))
}

fn repair_notes(raw: Vec<LooseNote>) -> Vec<Note> {
    raw.into_iter()
        .filter_map(|n| match Note::from_loose(n.step, n.pitch, n.velocity, n.duration) {
            Ok(note) => Some(note),
            Err(e) => {
                warn!("Dropping generated note: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VibeDawError;
    use crate::instrument::{InstrumentKind, Waveform};

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[]```"), "[]");
    }

    #[test]
    fn test_parse_instrument_spec() {
        let raw = r#"```json
{"name":"Warm Pad","instrumentType":"synthesizer","settings":{"volume":1.4,"pan":-3,"waveform":"triangle"}}
```"#;
        let generated = parse_instrument_spec(raw).unwrap();
        assert_eq!(generated.name, "Warm Pad");
        let InstrumentSettings::Synthesizer(settings) = generated.instrument else {
            panic!("expected synth");
        };
        assert_eq!(settings.waveform, Waveform::Triangle);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.pan, -1.0);
    }

    #[test]
    fn test_parse_sequence_spec_repairs_notes() {
        let raw = r#"{"notes":[
            {"step":0,"pitch":36,"velocity":100,"duration":2},
            {"step":4.0,"pitch":300,"velocity":90.6,"duration":1},
            {"step":-2,"pitch":36,"velocity":100,"duration":1},
            {"step":8,"pitch":36,"velocity":100,"duration":0}
        ]}"#;
        let notes = parse_sequence_spec(raw).unwrap();
        assert_eq!(notes, vec![Note::new(0, 36, 100, 2), Note::new(4, 127, 91, 1)]);
    }

    #[test]
    fn test_parse_track_spec() {
        let raw = r#"{"name":"Snare","instrumentType":"sampler",
            "settings":{"volume":0.8,"pan":0,"sampleUrl":"/Snare Mid.wav","pitch":0},
            "sequence":[{"step":4,"pitch":38,"velocity":110,"duration":1},{"step":12}]}"#;
        let track = parse_track_spec(raw, TrackId::new("gen-1")).unwrap();
        assert_eq!(track.id.as_str(), "gen-1");
        assert_eq!(track.kind(), InstrumentKind::Sampler);
        assert_eq!(track.notes, vec![Note::new(4, 38, 110, 1), Note::new(12, 60, 100, 1)]);
        assert!(!track.mute);
    }

    #[test]
    fn test_malformed_reply_is_an_error() {
        assert!(matches!(parse_sequence_spec("sure! here are notes"), Err(VibeDawError::Json(_))));
    }
}
