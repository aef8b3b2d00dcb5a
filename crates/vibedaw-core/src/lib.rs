//! vibedaw-core: Domain types, timing and sequencing logic for the vibedaw step sequencer

pub mod dispatch;
mod error;
pub mod generated;
mod instrument;
mod note;
mod song;
pub mod timing;
mod track;
mod transport;

pub use dispatch::{collect_step_notes, has_notes_from, NoteEvent};
pub use error::{InvalidNoteError, Result, VibeDawError};
pub use generated::{GeneratedInstrument, parse_instrument_spec, parse_sequence_spec, parse_track_spec};
pub use instrument::{InstrumentKind, InstrumentSettings, SamplerSettings, SynthSettings, Waveform};
pub use note::Note;
pub use song::{Mood, Song, Style};
pub use track::{Track, TrackId};
pub use transport::{DriftPolicy, StepAdvance, Transport, TransportState};
