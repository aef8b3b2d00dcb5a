//! Sample fetching, WAV decoding and the per-session buffer cache

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error)]
pub enum SampleLoadError {
    #[error("Failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },
    #[error("Failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },
}

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<f32>,
    pub sample_rate: u32,
}

/// Where sample bytes come from
pub trait SampleSource: Send {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SampleLoadError>;
}

/// Fetches `http(s)://` URLs over the network and everything else from a local root
pub struct HttpSampleSource {
    root: PathBuf,
    agent: ureq::Agent,
}

impl HttpSampleSource {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    fn local_path(&self, url: &str) -> PathBuf {
        self.root.join(url.trim_start_matches('/'))
    }
}

impl SampleSource for HttpSampleSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SampleLoadError> {
        let network = |reason: String| SampleLoadError::Network { url: url.to_string(), reason };

        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self.agent.get(url).call().map_err(|e| network(e.to_string()))?;
            let mut bytes = Vec::new();
            response
                .into_reader()
                .read_to_end(&mut bytes)
                .map_err(|e| network(e.to_string()))?;
            return Ok(bytes);
        }

        let path = self.local_path(url);
        std::fs::read(&path).map_err(|e| network(format!("{}: {e}", path.display())))
    }
}

/// Decode WAV bytes to mono f32, averaging channels
pub fn decode_wav(url: &str, bytes: &[u8]) -> Result<SampleBuffer, SampleLoadError> {
    let decode = |reason: String| SampleLoadError::Decode { url: url.to_string(), reason };

    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| decode(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let raw_samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f32 / max_val))
                .collect::<Result<_, _>>()
                .map_err(|e| decode(e.to_string()))?
        }
    };

    if raw_samples.is_empty() {
        return Err(decode("no audio frames".into()));
    }

    let data = if channels == 1 {
        raw_samples
    } else {
        raw_samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(SampleBuffer { data, sample_rate: spec.sample_rate })
}

/// Where a URL's load stands
enum Slot {
    Pending,
    Ready(Arc<SampleBuffer>),
    Failed(SampleLoadError),
}

struct Loaded {
    url: String,
    result: Result<SampleBuffer, SampleLoadError>,
}

/// Decoded buffers by URL; lives as long as the audio session.
///
/// Fetching and decoding happen on a loader thread, so nothing here waits on
/// I/O except `wait`. A URL that failed stays failed for the session.
pub struct SampleCache {
    requests: Sender<String>,
    results: Receiver<Loaded>,
    slots: HashMap<String, Slot>,
}

impl SampleCache {
    pub fn new(source: Box<dyn SampleSource>) -> Self {
        let (requests, request_rx) = unbounded::<String>();
        let (result_tx, results) = unbounded::<Loaded>();

        thread::spawn(move || Self::load_loop(source, request_rx, result_tx));

        Self {
            requests,
            results,
            slots: HashMap::new(),
        }
    }

    fn load_loop(source: Box<dyn SampleSource>, requests: Receiver<String>, results: Sender<Loaded>) {
        while let Ok(url) = requests.recv() {
            let result = source.fetch(&url).and_then(|bytes| decode_wav(&url, &bytes));
            if results.send(Loaded { url, result }).is_err() {
                break;
            }
        }
        debug!("Sample loader stopped");
    }

    /// Queue a load for `url` unless it is already known
    pub fn request(&mut self, url: &str) {
        if self.slots.contains_key(url) {
            return;
        }
        let slot = match self.requests.send(url.to_string()) {
            Ok(()) => {
                debug!(url, "Queued sample load");
                Slot::Pending
            }
            Err(_) => Slot::Failed(SampleLoadError::Network {
                url: url.to_string(),
                reason: "sample loader stopped".into(),
            }),
        };
        self.slots.insert(url.to_string(), slot);
    }

    /// Collect finished loads without blocking
    pub fn poll(&mut self) {
        while let Ok(loaded) = self.results.try_recv() {
            self.settle(loaded);
        }
    }

    /// The decoded buffer if it is ready, `None` while it is still loading.
    ///
    /// Unknown URLs are queued. A failed load returns its error every time
    /// without fetching again.
    pub fn get(&mut self, url: &str) -> Result<Option<Arc<SampleBuffer>>, SampleLoadError> {
        self.poll();
        self.request(url);
        match self.slots.get(url) {
            Some(Slot::Ready(buffer)) => Ok(Some(Arc::clone(buffer))),
            Some(Slot::Failed(e)) => Err(e.clone()),
            Some(Slot::Pending) | None => Ok(None),
        }
    }

    /// Block until every queued load has finished or `timeout` passes.
    /// Returns true when nothing is left pending.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.pending() == 0 {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(loaded) => self.settle(loaded),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return self.pending() == 0;
                }
            }
        }
    }

    fn settle(&mut self, loaded: Loaded) {
        let Loaded { url, result } = loaded;
        let slot = match result {
            Ok(buffer) => {
                info!(url = %url, frames = buffer.data.len(), sample_rate = buffer.sample_rate, "Loaded sample");
                Slot::Ready(Arc::new(buffer))
            }
            Err(e) => {
                warn!(url = %url, "Sample unavailable for this session: {}", e);
                Slot::Failed(e)
            }
        };
        self.slots.insert(url, slot);
    }

    /// Whether a decoded buffer for `url` is ready
    pub fn contains(&self, url: &str) -> bool {
        matches!(self.slots.get(url), Some(Slot::Ready(_)))
    }

    /// Loads still in flight
    pub fn pending(&self) -> usize {
        self.slots.values().filter(|s| matches!(s, Slot::Pending)).count()
    }

    /// Number of decoded buffers
    pub fn len(&self) -> usize {
        self.slots.values().filter(|s| matches!(s, Slot::Ready(_))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        debug!(buffers = self.len(), "Clearing sample cache");
        self.slots.clear();
    }
}

impl std::fmt::Debug for SampleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCache")
            .field("buffers", &self.len())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory WAV bytes of `frames` frames of a constant value
    pub(crate) fn wav_bytes(frames: usize, channels: u16, sample_rate: u32, value: f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..frames * channels as usize {
                writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    /// Serves fixed WAV bytes for known URLs and counts fetches
    pub(crate) struct MemorySource {
        pub files: HashMap<String, Vec<u8>>,
        pub fetches: Arc<AtomicUsize>,
    }

    impl MemorySource {
        pub(crate) fn with(url: &str, bytes: Vec<u8>) -> Self {
            Self {
                files: HashMap::from([(url.to_string(), bytes)]),
                fetches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl SampleSource for MemorySource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, SampleLoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.files.get(url).cloned().ok_or_else(|| SampleLoadError::Network {
                url: url.to_string(),
                reason: "404".into(),
            })
        }
    }

    /// Sleeps before failing, like a host that never answers
    pub(crate) struct SlowDeadSource {
        pub delay: Duration,
        pub fetches: Arc<AtomicUsize>,
    }

    impl SampleSource for SlowDeadSource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, SampleLoadError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Err(SampleLoadError::Network { url: url.to_string(), reason: "timed out".into() })
        }
    }

    fn loaded(cache: &mut SampleCache, url: &str) -> Result<Option<Arc<SampleBuffer>>, SampleLoadError> {
        cache.request(url);
        assert!(cache.wait(Duration::from_secs(2)));
        cache.get(url)
    }

    #[test]
    fn test_load_is_memoized() {
        let source = MemorySource::with("/kick.wav", wav_bytes(100, 1, 44100, 0.5));
        let fetches = Arc::clone(&source.fetches);
        let mut cache = SampleCache::new(Box::new(source));

        let first = loaded(&mut cache, "/kick.wav").unwrap().unwrap();
        let second = cache.get("/kick.wav").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.data.len(), 100);
        assert!((first.data[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_missing_sample_is_network_error() {
        let mut cache = SampleCache::new(Box::new(MemorySource::with("/kick.wav", Vec::new())));
        assert!(matches!(loaded(&mut cache, "/snare.wav"), Err(SampleLoadError::Network { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let mut cache = SampleCache::new(Box::new(MemorySource::with("/kick.wav", b"not a wav".to_vec())));
        assert!(matches!(loaded(&mut cache, "/kick.wav"), Err(SampleLoadError::Decode { .. })));
        assert!(!cache.contains("/kick.wav"));
    }

    #[test]
    fn test_failed_load_is_remembered() {
        let source = MemorySource::with("/kick.wav", b"RIFF".to_vec());
        let fetches = Arc::clone(&source.fetches);
        let mut cache = SampleCache::new(Box::new(source));
        assert!(loaded(&mut cache, "/kick.wav").is_err());
        assert!(cache.get("/kick.wav").is_err());
        cache.request("/kick.wav");
        assert!(cache.wait(Duration::from_millis(10)));
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_does_not_wait_for_slow_source() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let source = SlowDeadSource { delay: Duration::from_millis(300), fetches: Arc::clone(&fetches) };
        let mut cache = SampleCache::new(Box::new(source));

        let started = Instant::now();
        assert!(matches!(cache.get("http://unreachable.invalid/kick.wav"), Ok(None)));
        assert!(matches!(cache.get("http://unreachable.invalid/kick.wav"), Ok(None)));
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(cache.pending(), 1);

        assert!(!cache.wait(Duration::from_millis(1)));
        assert!(cache.wait(Duration::from_secs(2)));
        assert!(cache.get("http://unreachable.invalid/kick.wav").is_err());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stereo_is_mixed_to_mono() {
        let buffer = decode_wav("/pad.wav", &wav_bytes(50, 2, 22050, 0.25)).unwrap();
        assert_eq!(buffer.data.len(), 50);
        assert_eq!(buffer.sample_rate, 22050);
        assert!((buffer.data[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_local_path_resolution() {
        let source = HttpSampleSource::new("/srv/samples", Duration::from_secs(1));
        assert_eq!(source.local_path("/Kick Basic.wav"), PathBuf::from("/srv/samples/Kick Basic.wav"));
    }
}
