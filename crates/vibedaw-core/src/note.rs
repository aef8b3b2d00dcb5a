//! Step-sequenced note representation

use serde::{Deserialize, Serialize};

use crate::error::InvalidNoteError;

const MIDI_MAX: u8 = 127;

/// A single note in a track's step sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Position in the sequence (1/16 note resolution, 0-based)
    pub step: u32,
    /// MIDI note number (0-127, 60 = middle C)
    pub pitch: u8,
    /// Velocity (0-127)
    pub velocity: u8,
    /// Length in steps
    pub duration: u32,
}

impl Note {
    pub fn new(step: u32, pitch: u8, velocity: u8, duration: u32) -> Self {
        Self {
            step,
            pitch,
            velocity,
            duration,
        }
    }

    /// Build a note from loosely typed numbers (user input, model output).
    ///
    /// Pitch and velocity are rounded and clamped into MIDI range; a negative
    /// step or a duration below one step cannot be repaired and is rejected.
    pub fn from_loose(step: f64, pitch: f64, velocity: f64, duration: f64) -> Result<Self, InvalidNoteError> {
        if !step.is_finite() || step < 0.0 {
            return Err(InvalidNoteError::Step(step));
        }
        let rounded_duration = duration.round();
        if !rounded_duration.is_finite() || rounded_duration < 1.0 {
            return Err(InvalidNoteError::Duration(duration));
        }

        Ok(Self {
            step: step.round().min(u32::MAX as f64) as u32,
            pitch: clamp_midi(pitch),
            velocity: clamp_midi(velocity),
            duration: rounded_duration.min(u32::MAX as f64) as u32,
        })
    }

    /// Return a copy that is safe to play: MIDI fields clamped, zero duration rejected
    pub fn sanitized(&self) -> Result<Self, InvalidNoteError> {
        if self.duration == 0 {
            return Err(InvalidNoteError::Duration(0.0));
        }
        Ok(Self {
            pitch: self.pitch.min(MIDI_MAX),
            velocity: self.velocity.min(MIDI_MAX),
            ..*self
        })
    }

    /// Linear gain for this note's velocity
    pub fn velocity_gain(&self) -> f32 {
        self.velocity.min(MIDI_MAX) as f32 / MIDI_MAX as f32
    }
}

fn clamp_midi(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, MIDI_MAX as f64) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_loose_clamps_midi_fields() {
        let note = Note::from_loose(4.0, 140.0, -3.0, 2.2).unwrap();
        assert_eq!(note, Note::new(4, 127, 0, 2));
    }

    #[test]
    fn test_from_loose_rejects_unplayable() {
        assert_eq!(Note::from_loose(-1.0, 60.0, 100.0, 1.0), Err(InvalidNoteError::Step(-1.0)));
        assert_eq!(Note::from_loose(0.0, 60.0, 100.0, 0.2), Err(InvalidNoteError::Duration(0.2)));
        assert!(Note::from_loose(f64::NAN, 60.0, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_sanitized() {
        let loud = Note::new(0, 200, 255, 1).sanitized().unwrap();
        assert_eq!((loud.pitch, loud.velocity), (127, 127));
        assert!(Note::new(0, 60, 100, 0).sanitized().is_err());
    }

    #[test]
    fn test_velocity_gain() {
        assert_eq!(Note::new(0, 60, 127, 1).velocity_gain(), 1.0);
        assert_eq!(Note::new(0, 60, 0, 1).velocity_gain(), 0.0);
    }
}
