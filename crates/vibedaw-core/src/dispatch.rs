//! Note dispatch: which notes fire on a step

use tracing::warn;

use crate::note::Note;
use crate::song::Song;
use crate::track::Track;

/// A note resolved for playback, with audio-clock timing
#[derive(Debug, Clone, Copy)]
pub struct NoteEvent<'a> {
    pub track: &'a Track,
    pub note: Note,
    /// Audio-clock start time in seconds
    pub start_time: f64,
    /// Audible length in seconds
    pub duration: f64,
}

/// Collect every note that starts on `step` across the non-muted tracks.
///
/// Duplicated steps on one track are all returned. Notes whose MIDI fields are
/// out of range are clamped; notes that cannot be repaired are skipped.
pub fn collect_step_notes(song: &Song, step: usize, start_time: f64, step_duration: f64) -> Vec<NoteEvent<'_>> {
    song.tracks
        .iter()
        .filter(|track| !track.mute)
        .flat_map(|track| {
            track.notes_at(step).filter_map(move |note| match note.sanitized() {
                Ok(note) => Some(NoteEvent {
                    track,
                    note,
                    start_time,
                    duration: note.duration as f64 * step_duration,
                }),
                Err(e) => {
                    warn!(track = %track.id, step, "Skipping note: {}", e);
                    None
                }
            })
        })
        .collect()
}

/// True if a non-muted track has a note at or beyond `step`
pub fn has_notes_from(song: &Song, step: usize) -> bool {
    song.tracks
        .iter()
        .filter(|t| !t.mute)
        .flat_map(|t| t.notes.iter())
        .any(|n| n.step as usize >= step)
}
