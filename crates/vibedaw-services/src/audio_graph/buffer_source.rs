//! One-shot sample playback node with its own note gain

use std::sync::Arc;

use super::param::AudioParam;
use super::NodeId;
use crate::sample_cache::SampleBuffer;

/// Transient source created per sampler note, discarded once finished
#[derive(Debug)]
pub struct BufferSource {
    id: NodeId,
    buffer: Arc<SampleBuffer>,
    /// Source frames consumed per output frame
    rate: f64,
    start_time: f64,
    stop_time: Option<f64>,
    position: f64,
    finished: bool,
    /// Note-level gain the envelope is applied to
    pub gain: AudioParam,
}

impl BufferSource {
    pub fn new(id: NodeId, buffer: Arc<SampleBuffer>, playback_rate: f64, output_sample_rate: u32) -> Self {
        let rate = playback_rate * buffer.sample_rate as f64 / output_sample_rate as f64;
        Self {
            id,
            buffer,
            rate,
            start_time: f64::INFINITY,
            stop_time: None,
            position: 0.0,
            finished: false,
            gain: AudioParam::new(1.0),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn start(&mut self, when: f64) {
        self.start_time = when;
    }

    /// Schedule the stop; a later call replaces an earlier one
    pub fn stop(&mut self, when: f64) {
        self.stop_time = Some(when);
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn stop_time(&self) -> Option<f64> {
        self.stop_time
    }

    /// Ran past its stop time or its last frame
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mark finished if `t` is past the scheduled stop
    pub fn expire(&mut self, t: f64) {
        if self.stop_time.is_some_and(|stop| t >= stop) {
            self.finished = true;
        }
    }

    /// Output sample at time `t` (note gain applied), advancing one frame once started
    pub fn tick(&mut self, t: f64) -> f32 {
        if self.finished || t < self.start_time {
            return 0.0;
        }
        if self.stop_time.is_some_and(|stop| t >= stop) {
            self.finished = true;
            return 0.0;
        }

        let data = &self.buffer.data;
        let idx = self.position as usize;
        if idx + 1 >= data.len() {
            self.finished = true;
            return data.get(idx).copied().unwrap_or(0.0) * self.gain.value_at(t);
        }

        // Linear interpolation
        let frac = (self.position - idx as f64) as f32;
        let sample = data[idx] + frac * (data[idx + 1] - data[idx]);
        self.position += self.rate;

        sample * self.gain.value_at(t)
    }
}
