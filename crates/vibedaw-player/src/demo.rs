//! Built-in demo song: a C major run over a four-on-the-floor kick

use vibedaw_core::{
    InstrumentSettings, Mood, Note, SamplerSettings, Song, Style, SynthSettings, Track, TrackId, Waveform,
};

const MELODY: [(u32, u8, u8, u32); 8] = [
    (0, 60, 100, 2),
    (2, 62, 90, 2),
    (4, 64, 100, 2),
    (6, 65, 90, 2),
    (8, 67, 100, 2),
    (10, 69, 90, 2),
    (12, 71, 100, 2),
    (14, 72, 110, 4),
];

const KICKS: [u32; 4] = [0, 4, 8, 12];

pub fn demo_song() -> Song {
    let synth = Track::new(
        TrackId::new("demo-synth"),
        "Synth",
        InstrumentSettings::Synthesizer(SynthSettings::new(Waveform::Sine)),
    )
    .with_notes(MELODY.iter().map(|&(step, pitch, velocity, duration)| Note::new(step, pitch, velocity, duration)));

    let kick = Track::new(
        TrackId::new("demo-kick"),
        "Kick",
        InstrumentSettings::Sampler(SamplerSettings::new("/Kick Basic.wav")),
    )
    .with_notes(KICKS.iter().map(|&step| Note::new(step, 36, 100, 2)));

    let mut song = Song::new("demo", "Demo", 120.0).with_track(synth).with_track(kick);
    song.style = Style::Electronic;
    song.mood = Mood::Energetic;
    song
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibedaw_core::timing::STEPS_PER_BAR;

    #[test]
    fn test_demo_fits_one_bar() {
        let song = demo_song();
        assert_eq!(song.tracks.len(), 2);
        let last = song.tracks.iter().filter_map(|t| t.notes.iter().map(|n| n.step).max()).max();
        assert!(last.is_some_and(|step| (step as usize) < STEPS_PER_BAR));
    }
}
