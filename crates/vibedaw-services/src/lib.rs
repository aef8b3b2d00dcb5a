//! vibedaw-services: Audio graph, envelopes, sample loading, output and the sequencer

pub mod audio_graph;
pub mod audio_io;
pub mod config;
pub mod envelope;
pub mod sample_cache;
pub mod sequencer;
pub mod session;

pub use audio_graph::{AudioGraph, AudioParam, LimiterConfig, MasterBus, NodeId, TriggerRecord, Voice, VoiceHandle};
pub use audio_io::{AudioInitError, CpalBackend, OfflineBackend, OutputBackend, RealtimeOutputStream};
pub use config::EngineConfig;
pub use envelope::{apply_gain_envelope, trigger_sampler, trigger_synth};
pub use sample_cache::{HttpSampleSource, SampleBuffer, SampleCache, SampleLoadError, SampleSource};
pub use sequencer::{PlayheadEvent, Sequencer};
pub use session::{AudioSession, AudioSessionError, SessionState, SessionStatus};
