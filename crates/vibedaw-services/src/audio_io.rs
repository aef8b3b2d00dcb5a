//! Audio output backends the session renders through

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::session::SessionState;

#[derive(Debug, Error)]
pub enum AudioInitError {
    #[error("No audio output devices found")]
    NoDevices,
    #[error("Failed to get default output config: {0}")]
    ConfigError(String),
    #[error("Failed to build output stream: {0}")]
    StreamError(String),
}

/// Something that pulls rendered frames out of a session
pub trait OutputBackend {
    /// Begin rendering `state`; called once when the session resumes
    fn start(&mut self, state: Arc<SessionState>) -> Result<(), AudioInitError>;

    /// Stop rendering and release the device, if any
    fn stop(&mut self);
}

/// Real-time output stream that pulls interleaved f32 frames from a callback
pub struct RealtimeOutputStream {
    stop_flag: Arc<AtomicBool>,
    sample_rate: u32,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    /// Start a stream on the default output device
    pub fn start<F>(sample_callback: F) -> Result<Self, AudioInitError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioInitError::NoDevices)?;

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioInitError::ConfigError(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();

        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let config: StreamConfig = supported_config.into();
        let callback = Arc::new(Mutex::new(sample_callback));

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if stop_clone.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let Ok(mut cb) = callback.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    cb(data, sample_rate, channels);
                },
                move |err| error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioInitError::StreamError(e.to_string()))?;

        stream.play().map_err(|e| AudioInitError::StreamError(e.to_string()))?;

        info!(
            device = %device.name().unwrap_or_default(),
            sample_rate,
            channels,
            "Started realtime output stream"
        );

        Ok(Self { stop_flag, sample_rate, _stream: stream })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

impl Drop for RealtimeOutputStream {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
    }
}

/// Renders through the default cpal output device
#[derive(Default)]
pub struct CpalBackend {
    stream: Option<RealtimeOutputStream>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputBackend for CpalBackend {
    fn start(&mut self, state: Arc<SessionState>) -> Result<(), AudioInitError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let render_state = Arc::clone(&state);
        let stream = RealtimeOutputStream::start(move |buffer, sample_rate, channels| {
            render_state.render(buffer, sample_rate, channels);
        })?;

        // Notes may be scheduled before the first callback arrives
        let sample_rate = stream.sample_rate();
        state.with_graph(|graph| graph.set_sample_rate(sample_rate));

        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop();
            info!("Stopped realtime output stream");
        }
    }
}

/// No device: the owner renders frames explicitly with `AudioSession::render_offline`
#[derive(Debug, Default)]
pub struct OfflineBackend;

impl OfflineBackend {
    pub fn new() -> Self {
        Self
    }
}

impl OutputBackend for OfflineBackend {
    fn start(&mut self, _state: Arc<SessionState>) -> Result<(), AudioInitError> {
        debug!("Offline backend started");
        Ok(())
    }

    fn stop(&mut self) {}
}
