use crate::error::AppError;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Cursor;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const RECORDING_MIME_TYPE: &str = "audio/wav";

/// Receives mono sample chunks from the device callback, in arrival order.
pub type ChunkSender = UnboundedSender<Vec<f32>>;

/// Microphone trait - implement for real hardware and mocks.
pub trait MicrophoneSource: Send {
    /// Acquire the input device and start delivering chunks to `sink`.
    /// Returns the sample rate of the delivered samples.
    fn open(&mut self, sink: ChunkSender) -> Result<u32, AppError>;

    /// Stop delivering chunks and release the device. Must be idempotent.
    fn close(&mut self);
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CaptureState {
    Idle,
    /// The device is being acquired.
    Starting,
    Recording,
    Processing,
}

struct RecordingSession {
    chunks: UnboundedReceiver<Vec<f32>>,
    sample_rate: u32,
}

/// One finished recording, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
    pub chunk_count: usize,
}

impl RecordedAudio {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn samples_to_wav(samples: &[f32], sample_rate: u32) -> anyhow::Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec)?;
        for &sample in samples {
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer.write_sample(sample_i16)?;
        }
        writer.finalize()?;
    }

    Ok(buffer.into_inner())
}

/// A microphone taken out of the controller so it can be opened without
/// blocking readers of the capture state.
pub struct PendingStart {
    source: Box<dyn MicrophoneSource>,
}

impl PendingStart {
    /// Acquire the device. May block for as long as the platform takes.
    pub fn open(mut self) -> OpenedDevice {
        let (sink, chunks) = unbounded_channel();
        let outcome = self.source.open(sink);
        OpenedDevice {
            source: self.source,
            chunks,
            outcome,
        }
    }
}

pub struct OpenedDevice {
    source: Box<dyn MicrophoneSource>,
    chunks: UnboundedReceiver<Vec<f32>>,
    outcome: Result<u32, AppError>,
}

/// Idle → Starting → Recording → Processing → Idle.
///
/// Only one recording/transcription cycle exists at a time; the guard lives
/// here rather than in the callers.
pub struct AudioCaptureController {
    /// Out on loan to a `PendingStart` while `Starting`.
    source: Option<Box<dyn MicrophoneSource>>,
    state: CaptureState,
    session: Option<RecordingSession>,
    cancel_requested: bool,
}

impl AudioCaptureController {
    pub fn new(source: Box<dyn MicrophoneSource>) -> Self {
        Self {
            source: Some(source),
            state: CaptureState::Idle,
            session: None,
            cancel_requested: false,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == CaptureState::Idle
    }

    /// Reserve the device for a new recording. Returns `None` if a cycle is
    /// already active. The caller opens the returned `PendingStart` without
    /// holding any lock on this controller, then hands it to `finish_start`.
    pub fn begin_start(&mut self) -> Option<PendingStart> {
        if self.state != CaptureState::Idle {
            debug!("Ignoring start request while {:?}", self.state);
            return None;
        }
        let source = self.source.take()?;

        self.state = CaptureState::Starting;
        self.cancel_requested = false;
        Some(PendingStart { source })
    }

    /// Install the outcome of `PendingStart::open`. Returns `Ok(false)` if the
    /// recording was cancelled while the device was being acquired.
    pub fn finish_start(&mut self, opened: OpenedDevice) -> Result<bool, AppError> {
        let OpenedDevice {
            mut source,
            chunks,
            outcome,
        } = opened;

        if self.cancel_requested {
            source.close();
            self.source = Some(source);
            self.cancel_requested = false;
            self.state = CaptureState::Idle;
            info!("Recording cancelled while the microphone was starting");
            return Ok(false);
        }
        self.source = Some(source);

        match outcome {
            Ok(sample_rate) => {
                self.session = Some(RecordingSession {
                    chunks,
                    sample_rate,
                });
                self.state = CaptureState::Recording;
                info!("Recording started ({} Hz)", sample_rate);
                Ok(true)
            }
            Err(err) => {
                self.state = CaptureState::Idle;
                Err(err)
            }
        }
    }

    /// Release the device and hand back everything captured so far.
    pub fn stop_recording(&mut self) -> Result<RecordedAudio, AppError> {
        if self.state != CaptureState::Recording {
            return Err(AppError::Busy);
        }

        self.close_source();
        let Some(mut session) = self.session.take() else {
            self.state = CaptureState::Idle;
            return Err(AppError::Busy);
        };

        let mut chunks = Vec::new();
        while let Ok(chunk) = session.chunks.try_recv() {
            chunks.push(chunk);
        }
        let chunk_count = chunks.len();
        let samples = chunks.concat();

        let bytes = if samples.is_empty() {
            Vec::new()
        } else {
            match samples_to_wav(&samples, session.sample_rate) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Failed to encode recording: {}", e);
                    self.state = CaptureState::Idle;
                    return Err(AppError::DeviceAccess(format!(
                        "Failed to encode the recording: {}",
                        e
                    )));
                }
            }
        };

        info!(
            "Recording stopped: {} chunks, {} samples, {} bytes",
            chunk_count,
            samples.len(),
            bytes.len()
        );
        self.state = CaptureState::Processing;
        Ok(RecordedAudio {
            bytes,
            mime_type: RECORDING_MIME_TYPE,
            chunk_count,
        })
    }

    /// Transcription finished, successfully or not.
    pub fn finish(&mut self) {
        if self.state == CaptureState::Processing {
            self.state = CaptureState::Idle;
        }
    }

    /// Abandon an active recording without transcribing it.
    pub fn cancel(&mut self) {
        match self.state {
            CaptureState::Recording => {
                self.close_source();
                self.session = None;
                self.state = CaptureState::Idle;
                info!("Recording cancelled");
            }
            CaptureState::Starting => self.cancel_requested = true,
            _ => {}
        }
    }

    fn close_source(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.close();
        }
    }
}

impl Drop for AudioCaptureController {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock microphone that delivers a fixed set of chunks once opened.
    #[derive(Clone, Default)]
    pub(crate) struct MockMicrophone {
        pub chunks: Vec<Vec<f32>>,
        pub should_fail: bool,
        pub opened: Arc<AtomicUsize>,
        pub closed: Arc<AtomicUsize>,
    }

    impl MockMicrophone {
        pub(crate) fn with_chunks(chunks: Vec<Vec<f32>>) -> Self {
            Self {
                chunks,
                ..Default::default()
            }
        }

        pub(crate) fn that_fails() -> Self {
            Self {
                should_fail: true,
                ..Default::default()
            }
        }
    }

    impl MicrophoneSource for MockMicrophone {
        fn open(&mut self, sink: ChunkSender) -> Result<u32, AppError> {
            if self.should_fail {
                return Err(AppError::DeviceAccess("mock failure".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            for chunk in &self.chunks {
                sink.send(chunk.clone()).unwrap();
            }
            Ok(16000)
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn start(c: &mut AudioCaptureController) -> Result<bool, AppError> {
        match c.begin_start() {
            Some(pending) => c.finish_start(pending.open()),
            None => Ok(false),
        }
    }

    #[test]
    fn starts_idle() {
        let c = AudioCaptureController::new(Box::new(MockMicrophone::default()));
        assert_eq!(c.state(), CaptureState::Idle);
    }

    #[test]
    fn zero_chunks_still_completes_the_cycle() {
        let mut c = AudioCaptureController::new(Box::new(MockMicrophone::default()));
        assert!(start(&mut c).unwrap());
        assert_eq!(c.state(), CaptureState::Recording);

        let audio = c.stop_recording().unwrap();
        assert_eq!(c.state(), CaptureState::Processing);
        assert!(audio.is_empty());
        assert_eq!(audio.chunk_count, 0);

        c.finish();
        assert_eq!(c.state(), CaptureState::Idle);
    }

    #[test]
    fn chunks_are_joined_in_arrival_order() {
        let mic = MockMicrophone::with_chunks(vec![vec![0.5, 0.25], vec![-0.5]]);
        let mut c = AudioCaptureController::new(Box::new(mic));
        start(&mut c).unwrap();
        let audio = c.stop_recording().unwrap();

        assert_eq!(audio.mime_type, "audio/wav");
        assert_eq!(audio.chunk_count, 2);
        let reader = hound::WavReader::new(Cursor::new(audio.bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        let samples: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![16383, 8191, -16383]);
    }

    #[test]
    fn start_while_active_is_a_noop() {
        let mic = MockMicrophone::default();
        let opened = mic.opened.clone();
        let mut c = AudioCaptureController::new(Box::new(mic));

        assert!(start(&mut c).unwrap());
        assert!(!start(&mut c).unwrap());
        c.stop_recording().unwrap();
        assert!(!start(&mut c).unwrap());
        assert_eq!(c.state(), CaptureState::Processing);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn device_failure_stays_idle() {
        let mut c = AudioCaptureController::new(Box::new(MockMicrophone::that_fails()));
        let err = start(&mut c).unwrap_err();
        assert!(matches!(err, AppError::DeviceAccess(_)));
        assert!(c.is_idle());
    }

    #[test]
    fn stop_outside_recording_is_rejected() {
        let mut c = AudioCaptureController::new(Box::new(MockMicrophone::default()));
        assert_eq!(c.stop_recording().unwrap_err(), AppError::Busy);
    }

    #[test]
    fn cancel_releases_the_device() {
        let mic = MockMicrophone::with_chunks(vec![vec![0.1]]);
        let closed = mic.closed.clone();
        let mut c = AudioCaptureController::new(Box::new(mic));
        start(&mut c).unwrap();

        c.cancel();
        assert!(c.is_idle());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_while_recording_releases_the_device() {
        let mic = MockMicrophone::default();
        let closed = mic.closed.clone();
        {
            let mut c = AudioCaptureController::new(Box::new(mic));
            start(&mut c).unwrap();
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn state_is_readable_while_the_device_is_acquired() {
        let mut c = AudioCaptureController::new(Box::new(MockMicrophone::default()));
        let pending = c.begin_start().unwrap();
        assert_eq!(c.state(), CaptureState::Starting);
        assert!(c.begin_start().is_none());

        assert!(c.finish_start(pending.open()).unwrap());
        assert_eq!(c.state(), CaptureState::Recording);
    }

    #[test]
    fn cancel_while_starting_closes_the_opened_device() {
        let mic = MockMicrophone::default();
        let closed = mic.closed.clone();
        let mut c = AudioCaptureController::new(Box::new(mic));

        let pending = c.begin_start().unwrap();
        c.cancel();
        assert!(!c.finish_start(pending.open()).unwrap());

        assert!(c.is_idle());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(start(&mut c).unwrap());
    }

    #[test]
    fn failed_open_returns_the_device_for_a_retry() {
        let mut c = AudioCaptureController::new(Box::new(MockMicrophone::that_fails()));
        assert!(start(&mut c).is_err());
        assert!(start(&mut c).is_err());
        assert!(c.is_idle());
    }
}
