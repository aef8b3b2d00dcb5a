//! Click-free note envelopes and monophonic sampler voice stealing

use std::sync::Arc;

use tracing::trace;
use vibedaw_core::timing::{midi_to_frequency, FADE_TIME, GAIN_FLOOR, GLIDE_TIME_CONSTANT};
use vibedaw_core::{Note, SamplerSettings, SynthSettings};

use crate::audio_graph::{AudioParam, BufferSource, NodeId, SamplerVoice, SynthVoice};
use crate::sample_cache::SampleBuffer;

/// Schedule attack, sustain, release and a hard zero on `gain`.
///
/// Everything already scheduled at or after `start` is cancelled first, so a
/// new note cleanly pre-empts an envelope still in flight.
pub fn apply_gain_envelope(gain: &mut AudioParam, start: f64, duration: f64, target: f32) {
    let fade = FADE_TIME.min(duration / 2.0);
    let target = if target > GAIN_FLOOR { target } else { GAIN_FLOOR };
    let end = start + duration;

    gain.cancel_scheduled_values(start);
    gain.set_value_at_time(GAIN_FLOOR, start);
    gain.exponential_ramp_to_value_at_time(target, start + fade);
    gain.set_value_at_time(target, end - fade);
    gain.exponential_ramp_to_value_at_time(GAIN_FLOOR, end);
    gain.set_value_at_time(0.0, end + fade);
}

/// Fade `gain` to the floor from `when`, dropping anything scheduled after it.
///
/// The value reached at `when` is held first, so a fade that lands inside a
/// release ramp decays from where the ramp was instead of jumping back up.
pub fn fade_out(gain: &mut AudioParam, when: f64) {
    let held = gain.value_at(when);
    gain.cancel_scheduled_values(when);
    gain.set_value_at_time(held, when);
    gain.set_target_at_time(GAIN_FLOOR, when, FADE_TIME / 5.0);
}

/// Decay a buffer source from `when` and stop it two fades later, never extending its life
pub fn cut_source(source: &mut BufferSource, when: f64) {
    fade_out(&mut source.gain, when);
    let stop = when + FADE_TIME * 2.0;
    source.stop(source.stop_time().map_or(stop, |t| t.min(stop)));
}

/// Play a note on the track's persistent oscillator: pitch glide plus envelope
pub fn trigger_synth(voice: &mut SynthVoice, note: &Note, settings: &SynthSettings, start: f64, duration: f64) {
    let frequency = midi_to_frequency(note.pitch);
    voice.oscillator.frequency.cancel_scheduled_values(start);
    voice.oscillator.frequency.set_target_at_time(frequency as f32, start, GLIDE_TIME_CONSTANT);

    let target = note.velocity_gain() * settings.volume;
    apply_gain_envelope(&mut voice.gain, start, duration, target);
    trace!(pitch = note.pitch, frequency, start, duration, "Synth note");
}

/// Play a sample on a sampler track, cutting off whatever the track was playing.
///
/// A sampler track sounds at most one source at a time: the previous source
/// decays from `start` and is stopped shortly after, then a fresh source with
/// its own note gain starts at `start`.
pub fn trigger_sampler(
    voice: &mut SamplerVoice,
    source_id: NodeId,
    buffer: Arc<SampleBuffer>,
    output_sample_rate: u32,
    note: &Note,
    settings: &SamplerSettings,
    start: f64,
    duration: f64,
) {
    if let Some(previous) = voice.current_source_mut() {
        cut_source(previous, start);
    }

    // Restore the track volume in case a stop faded the track gain
    voice.gain.cancel_scheduled_values(start);
    voice.gain.set_value_at_time(settings.volume, start);

    let mut source = BufferSource::new(source_id, buffer, settings.playback_rate(), output_sample_rate);
    apply_gain_envelope(&mut source.gain, start, duration, note.velocity_gain());
    source.start(start);
    source.stop(start + duration + FADE_TIME * 2.0);

    voice.sources.push(source);
    voice.current = Some(source_id);
    trace!(source = source_id.0, start, duration, "Sampler note");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_graph::{AudioGraph, LimiterConfig, MasterBus, Voice};
    use vibedaw_core::{InstrumentSettings, SamplerSettings, Track, TrackId, Waveform};

    fn near(actual: f32, expected: f32, tolerance: f32) -> bool {
        (actual - expected).abs() <= tolerance
    }

    #[test]
    fn test_envelope_shape() {
        let mut gain = AudioParam::new(0.0);
        let (t0, d, target) = (2.0, 0.25, 0.6);
        apply_gain_envelope(&mut gain, t0, d, target);

        assert!(near(gain.value_at(t0), GAIN_FLOOR, 1e-6));
        assert!(gain.value_at(t0 + 0.005) < target);
        assert!(near(gain.value_at(t0 + FADE_TIME), target, 1e-5));
        assert!(near(gain.value_at(t0 + 0.1), target, 1e-6));
        assert!(near(gain.value_at(t0 + d - FADE_TIME), target, 1e-6));
        assert!(gain.value_at(t0 + d - 0.005) < target);
        assert!(near(gain.value_at(t0 + d), GAIN_FLOOR, 1e-6));
        assert_eq!(gain.value_at(t0 + d + FADE_TIME), 0.0);
    }

    #[test]
    fn test_envelope_attack_is_monotonic() {
        let mut gain = AudioParam::new(0.0);
        apply_gain_envelope(&mut gain, 0.0, 0.5, 1.0);
        let samples: Vec<f32> = (0..=10).map(|i| gain.value_at(i as f64 * 0.001)).collect();
        assert!(samples.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_silent_note_never_targets_zero() {
        let mut gain = AudioParam::new(0.0);
        apply_gain_envelope(&mut gain, 0.0, 0.5, 0.0);
        assert!(near(gain.value_at(0.2), GAIN_FLOOR, 1e-9));
    }

    #[test]
    fn test_short_note_shrinks_fade() {
        let mut gain = AudioParam::new(0.0);
        apply_gain_envelope(&mut gain, 0.0, 0.01, 1.0);
        assert!(near(gain.value_at(0.005), 1.0, 1e-5));
        assert!(near(gain.value_at(0.01), GAIN_FLOOR, 1e-6));
    }

    #[test]
    fn test_new_envelope_preempts_old() {
        let mut gain = AudioParam::new(0.0);
        apply_gain_envelope(&mut gain, 0.0, 1.0, 1.0);
        apply_gain_envelope(&mut gain, 0.5, 0.25, 0.5);
        assert!(near(gain.value_at(0.4), 1.0, 1e-6));
        assert!(near(gain.value_at(0.6), 0.5, 1e-6));
        // The first note's release at 1.0 is gone
        assert_eq!(gain.value_at(0.9), 0.0);
    }

    #[test]
    fn test_fade_inside_release_holds_value() {
        let mut gain = AudioParam::new(0.0);
        apply_gain_envelope(&mut gain, 0.0, 0.5, 1.0);
        let when = 0.495;
        let before = gain.value_at(when);
        assert!(before < 0.5, "release should be under way: {before}");

        fade_out(&mut gain, when);
        assert!(near(gain.value_at(when), before, 1e-6));
        let after: Vec<f32> = (1..=10).map(|i| gain.value_at(when + i as f64 * 0.0005)).collect();
        assert!(after.iter().all(|v| *v <= before));
        assert!(after.windows(2).all(|w| w[1] <= w[0]));
        assert!(near(gain.value_at(0.49), 1.0, 1e-6));
    }

    fn sampler_voice(graph: &mut AudioGraph) -> &mut SamplerVoice {
        let track = Track::new(TrackId::new("kick"), "Kick", InstrumentSettings::Sampler(SamplerSettings::new("/kick.wav")));
        graph.ensure_voice(&track);
        match graph.voice_mut(&track.id) {
            Some(Voice::Sampler(voice)) => voice,
            _ => panic!("expected sampler voice"),
        }
    }

    #[test]
    fn test_sampler_steals_previous_source() {
        let mut graph = AudioGraph::new(48000, MasterBus::new(0.8, LimiterConfig::default(), 48000));
        let buffer = Arc::new(SampleBuffer { data: vec![0.5; 48000], sample_rate: 48000 });
        let settings = SamplerSettings::new("/kick.wav");
        let note = Note::new(0, 60, 127, 4);
        let voice = sampler_voice(&mut graph);

        trigger_sampler(voice, NodeId(100), Arc::clone(&buffer), 48000, &note, &settings, 1.0, 0.5);
        trigger_sampler(voice, NodeId(101), Arc::clone(&buffer), 48000, &note, &settings, 1.25, 0.5);

        assert_eq!(voice.sources().len(), 2);
        assert_eq!(voice.current, Some(NodeId(101)));
        let earlier = &voice.sources()[0];
        let later = &voice.sources()[1];
        assert_eq!(earlier.stop_time(), Some(1.25 + FADE_TIME * 2.0));

        let decay: Vec<f32> = (0..8).map(|i| earlier.gain.value_at(1.25 + i as f64 * 0.002)).collect();
        assert!(decay.windows(2).all(|w| w[1] < w[0]));
        assert!(later.gain.value_at(1.3) > earlier.gain.value_at(1.3));
        assert!(near(voice.gain.value_at(1.25), settings.volume, 1e-6));
    }

    #[test]
    fn test_cut_never_extends_source() {
        let buffer = Arc::new(SampleBuffer { data: vec![0.5; 100], sample_rate: 48000 });
        let mut source = BufferSource::new(NodeId(1), buffer, 1.0, 48000);
        source.start(0.0);
        source.stop(0.005);
        cut_source(&mut source, 0.0);
        assert_eq!(source.stop_time(), Some(0.005));
    }

    #[test]
    fn test_synth_glides_to_pitch() {
        let mut graph = AudioGraph::new(48000, MasterBus::new(0.8, LimiterConfig::default(), 48000));
        let track = Track::new(TrackId::new("lead"), "Lead", InstrumentSettings::Synthesizer(SynthSettings::new(Waveform::Sine)));
        graph.ensure_voice(&track);
        let Some(Voice::Synth(voice)) = graph.voice_mut(&track.id) else {
            panic!("expected synth voice");
        };
        let settings = SynthSettings { volume: 0.5, ..SynthSettings::new(Waveform::Sine) };
        trigger_synth(voice, &Note::new(0, 81, 127, 2), &settings, 1.0, 0.25);

        let frequency = &voice.oscillator.frequency;
        assert!(near(frequency.value_at(1.0), 440.0, 1e-3));
        let mid = frequency.value_at(1.002);
        assert!(mid > 440.0 && mid < 880.0);
        assert!(near(frequency.value_at(1.05), 880.0, 0.1));
        assert!(near(voice.gain.value_at(1.1), 0.5, 1e-5));
    }
}
