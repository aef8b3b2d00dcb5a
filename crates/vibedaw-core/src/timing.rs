//! Grid and timing constants shared by the transport and the audio side

/// Steps in one bar (1/16 notes)
pub const STEPS_PER_BAR: usize = 16;
/// Bars in the pattern grid
pub const BARS: usize = 4;
/// Length of the full loop in steps
pub const TOTAL_STEPS: usize = STEPS_PER_BAR * BARS;

pub const MIN_TEMPO: f64 = 20.0;
pub const MAX_TEMPO: f64 = 300.0;

/// Fade window for click-free envelopes (seconds)
pub const FADE_TIME: f64 = 0.01;
/// Smallest gain an exponential ramp may target
pub const GAIN_FLOOR: f32 = 0.0001;
/// Audio lead time for the notes dispatched by `play`
pub const PLAY_LEAD_TIME: f64 = 0.1;
/// Time constant of the synth pitch glide (seconds)
pub const GLIDE_TIME_CONSTANT: f64 = 0.005;

/// Duration of one step (a 1/16 note) in seconds; tempo is clamped to 20-300 BPM
pub fn step_duration(tempo: f64) -> f64 {
    let tempo = if tempo.is_nan() { MIN_TEMPO } else { tempo.clamp(MIN_TEMPO, MAX_TEMPO) };
    60.0 / tempo / 4.0
}

/// Equal-tempered frequency of a MIDI note (A4 = 69 = 440 Hz)
pub fn midi_to_frequency(pitch: u8) -> f64 {
    440.0 * 2.0_f64.powf((pitch as f64 - 69.0) / 12.0)
}

/// True when `step` starts a bar
pub fn is_bar_boundary(step: usize) -> bool {
    step % STEPS_PER_BAR == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_duration() {
        assert!((step_duration(120.0) - 0.125).abs() < 1e-12);
        assert!((step_duration(60.0) - 0.25).abs() < 1e-12);
        for tempo in (20..=300).step_by(7) {
            let tempo = tempo as f64;
            assert!((step_duration(tempo) - 60.0 / tempo / 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_step_duration_clamps_tempo() {
        assert_eq!(step_duration(5.0), step_duration(MIN_TEMPO));
        assert_eq!(step_duration(1000.0), step_duration(MAX_TEMPO));
    }

    #[test]
    fn test_midi_to_frequency() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-9);
        assert!((midi_to_frequency(81) - 880.0).abs() < 1e-9);
        assert!((midi_to_frequency(60) - 261.6256).abs() < 1e-3);
    }
}
