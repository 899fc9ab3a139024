//! Background audio capture: accumulates device blocks into fixed-duration
//! chunks and persists them without losing samples across chunk boundaries
//! or device outages.

use crossbeam_channel::bounded;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{AudioConfig, CaptureConfig};
use crate::error::CaptureError;

use super::chunk::AudioChunk;
use super::chunk_writer::ChunkWriter;
use super::input::{AudioInput, DeviceSelector, InputDevice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Capturing,
    Stopping,
    Stopped,
    Errored,
}

impl CaptureState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Errored => "errored",
        }
    }
}

/// Shared record of one capture session.
///
/// The capture thread is the only writer of `chunks` and `chunk_counter`;
/// the orchestrator reads `state` to poll for device failure. Every access
/// from either thread goes through the same mutex.
#[derive(Debug, Default)]
struct CaptureSession {
    state: CaptureState,
    chunk_counter: u64,
    chunks: Vec<AudioChunk>,
    failed_sequences: Vec<u64>,
    reconnect_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub chunk_duration_seconds: u64,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_dir: PathBuf,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl CaptureSettings {
    pub fn from_config(audio: &AudioConfig, capture: &CaptureConfig) -> Self {
        Self {
            chunk_duration_seconds: audio.chunk_duration_seconds,
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            chunk_dir: audio.audio_dir.clone(),
            max_reconnect_attempts: capture.max_reconnect_attempts,
            reconnect_delay: Duration::from_secs(capture.reconnect_delay_seconds),
        }
    }

    fn samples_per_chunk(&self) -> usize {
        self.chunk_duration_seconds as usize * self.sample_rate as usize * self.channels as usize
    }
}

/// Owns the background capture loop for the duration of a pipeline run.
pub struct AudioCaptureEngine {
    opener: Arc<dyn InputDevice>,
    settings: CaptureSettings,
    shared: Arc<Mutex<CaptureSession>>,
    handle: Option<JoinHandle<()>>,
}

impl AudioCaptureEngine {
    pub fn new(opener: Arc<dyn InputDevice>, settings: CaptureSettings) -> Self {
        Self {
            opener,
            settings,
            shared: Arc::new(Mutex::new(CaptureSession::default())),
            handle: None,
        }
    }

    /// Begin capturing on a background thread.
    ///
    /// Fails fast if the device cannot be opened. Calling `start` while
    /// already capturing is a no-op.
    pub fn start(&mut self, selector: DeviceSelector) -> Result<(), CaptureError> {
        {
            let mut session = self.shared.lock().unwrap();
            if session.state == CaptureState::Capturing {
                warn!("Audio capture already in progress");
                return Ok(());
            }
            *session = CaptureSession {
                state: CaptureState::Capturing,
                ..CaptureSession::default()
            };
        }

        // The capture thread opens the device (cpal streams cannot cross
        // threads) and reports the first open result back before looping.
        let (ready_tx, ready_rx) = bounded::<Result<(), CaptureError>>(1);
        let opener = Arc::clone(&self.opener);
        let shared = Arc::clone(&self.shared);
        let settings = self.settings.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || match opener.open(selector) {
                Ok(input) => {
                    let _ = ready_tx.send(Ok(()));
                    capture_loop(input, opener, selector, settings, shared);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| CaptureError::device(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.handle = Some(handle);
                info!("Audio capture started on device {}", selector);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                self.shared.lock().unwrap().state = CaptureState::Idle;
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                self.shared.lock().unwrap().state = CaptureState::Idle;
                Err(CaptureError::device(
                    "capture thread exited before reporting readiness",
                ))
            }
        }
    }

    /// Stop capturing and return every chunk produced, in sequence order.
    ///
    /// Blocks until the capture loop has exited and any trailing partial
    /// buffer has been flushed. Safe to call when not capturing.
    pub fn stop(&mut self) -> Vec<AudioChunk> {
        {
            let mut session = self.shared.lock().unwrap();
            match session.state {
                CaptureState::Capturing => {
                    info!("Stopping audio capture...");
                    session.state = CaptureState::Stopping;
                }
                CaptureState::Errored => {}
                _ => warn!("No audio capture in progress"),
            }
        }

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Capture thread panicked");
            }
        }

        let mut session = self.shared.lock().unwrap();
        if matches!(
            session.state,
            CaptureState::Stopping | CaptureState::Capturing
        ) {
            session.state = CaptureState::Stopped;
        }
        info!(
            "Audio capture stopped. Total chunks: {}",
            session.chunks.len()
        );
        session.chunks.clone()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.lock().unwrap().state
    }

    /// Chunks produced so far, ordered by sequence number.
    pub fn list_chunks(&self) -> Vec<AudioChunk> {
        self.shared.lock().unwrap().chunks.clone()
    }

    /// Sequence numbers whose chunk write failed. These stay reserved so
    /// numbering remains dense apart from the recorded misses.
    pub fn failed_sequences(&self) -> Vec<u64> {
        self.shared.lock().unwrap().failed_sequences.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.lock().unwrap().reconnect_attempts
    }
}

fn capture_loop(
    first: Box<dyn AudioInput>,
    opener: Arc<dyn InputDevice>,
    selector: DeviceSelector,
    settings: CaptureSettings,
    shared: Arc<Mutex<CaptureSession>>,
) {
    let writer = ChunkWriter::new(settings.chunk_dir.clone());
    let samples_per_chunk = settings.samples_per_chunk();
    let mut buffer: Vec<f32> = Vec::with_capacity(samples_per_chunk);
    let mut input: Option<Box<dyn AudioInput>> = Some(first);
    let mut consecutive_failures: u32 = 0;

    loop {
        if shared.lock().unwrap().state != CaptureState::Capturing {
            break;
        }

        match input.as_mut() {
            Some(device) => match device.read_block() {
                Ok(block) => {
                    consecutive_failures = 0;
                    buffer.extend_from_slice(&block);
                    // Drain exactly one chunk's worth at a time; the
                    // remainder carries into the next chunk.
                    while buffer.len() >= samples_per_chunk {
                        let chunk: Vec<f32> = buffer.drain(..samples_per_chunk).collect();
                        flush_chunk(&writer, &chunk, &settings, &shared, false);
                    }
                }
                Err(e) => {
                    input = None;
                    if !register_failure(&shared, &settings, &mut consecutive_failures, &e) {
                        break;
                    }
                }
            },
            None => {
                thread::sleep(settings.reconnect_delay);
                match opener.open(selector) {
                    Ok(device) => {
                        info!("Capture device reacquired");
                        input = Some(device);
                    }
                    Err(e) => {
                        if !register_failure(&shared, &settings, &mut consecutive_failures, &e) {
                            break;
                        }
                    }
                }
            }
        }
    }

    // Whatever ended the loop, never drop buffered samples.
    if !buffer.is_empty() {
        info!("Finalizing partial audio chunk ({} samples)", buffer.len());
        flush_chunk(&writer, &buffer, &settings, &shared, true);
    }
}

fn flush_chunk(
    writer: &ChunkWriter,
    samples: &[f32],
    settings: &CaptureSettings,
    shared: &Arc<Mutex<CaptureSession>>,
    is_partial: bool,
) {
    let sequence = shared.lock().unwrap().chunk_counter;

    match writer.write(
        samples,
        sequence,
        settings.sample_rate,
        settings.channels,
        is_partial,
    ) {
        Ok(chunk) => {
            let mut session = shared.lock().unwrap();
            session.chunks.push(chunk);
            session.chunk_counter += 1;
        }
        Err(e) => {
            error!("{}", e);
            let mut session = shared.lock().unwrap();
            session.failed_sequences.push(sequence);
            // The sequence number is spent; numbering stays dense apart
            // from this recorded miss.
            session.chunk_counter += 1;
        }
    }
}

/// Returns false once the allowed consecutive failures are exhausted and
/// the session has been transitioned to Errored.
fn register_failure(
    shared: &Arc<Mutex<CaptureSession>>,
    settings: &CaptureSettings,
    consecutive_failures: &mut u32,
    err: &CaptureError,
) -> bool {
    *consecutive_failures += 1;
    let mut session = shared.lock().unwrap();
    session.reconnect_attempts += 1;

    error!(
        "Audio capture error (attempt {}/{}): {}",
        consecutive_failures, settings.max_reconnect_attempts, err
    );

    if *consecutive_failures >= settings.max_reconnect_attempts {
        error!("Max reconnection attempts reached. Audio capture failed.");
        session.state = CaptureState::Errored;
        return false;
    }

    info!(
        "Attempting to reconnect in {:?}...",
        settings.reconnect_delay
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Input that replays a scripted sequence of read results, then idles.
    struct ScriptedInput {
        blocks: VecDeque<Result<Vec<f32>, CaptureError>>,
    }

    impl AudioInput for ScriptedInput {
        fn read_block(&mut self) -> Result<Vec<f32>, CaptureError> {
            match self.blocks.pop_front() {
                Some(result) => result,
                None => {
                    thread::sleep(Duration::from_millis(2));
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Device whose successive `open` calls replay scripted outcomes.
    struct ScriptedDevice {
        opens: Mutex<VecDeque<Result<Vec<Result<Vec<f32>, CaptureError>>, ()>>>,
        open_count: AtomicUsize,
    }

    impl ScriptedDevice {
        fn new(opens: Vec<Result<Vec<Result<Vec<f32>, CaptureError>>, ()>>) -> Arc<Self> {
            Arc::new(Self {
                opens: Mutex::new(opens.into()),
                open_count: AtomicUsize::new(0),
            })
        }
    }

    impl InputDevice for ScriptedDevice {
        fn open(&self, _selector: DeviceSelector) -> Result<Box<dyn AudioInput>, CaptureError> {
            self.open_count.fetch_add(1, Ordering::SeqCst);
            match self.opens.lock().unwrap().pop_front() {
                Some(Ok(blocks)) => Ok(Box::new(ScriptedInput {
                    blocks: blocks.into(),
                })),
                Some(Err(())) | None => Err(CaptureError::device("scripted open failure")),
            }
        }
    }

    fn test_settings(dir: &std::path::Path) -> CaptureSettings {
        CaptureSettings {
            chunk_duration_seconds: 1,
            sample_rate: 10,
            channels: 1,
            chunk_dir: dir.to_path_buf(),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(1),
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_fails_fast_when_device_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![Err(())]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        assert!(engine.start(DeviceSelector::Default).is_err());
        assert_eq!(engine.state(), CaptureState::Idle);
    }

    #[test]
    fn test_buffer_fills_plus_trailing_partial() {
        let dir = tempfile::tempdir().unwrap();
        // Two full chunks (10 samples each) plus 5 trailing samples. The
        // trailing samples ride in with the second block, so they are
        // already buffered once the second chunk is visible.
        let device = ScriptedDevice::new(vec![Ok(vec![
            Ok(vec![0.1; 10]),
            Ok(vec![0.2; 15]),
        ])]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.list_chunks().len() == 2);

        let chunks = engine.stop();
        assert_eq!(chunks.len(), 3);
        assert_eq!(engine.state(), CaptureState::Stopped);

        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        assert!(!chunks[0].is_partial);
        assert!(!chunks[1].is_partial);
        assert!(chunks[2].is_partial);
        assert!((chunks[2].duration_seconds - 0.5).abs() < 1e-9);
        assert!(chunks.iter().all(|c| c.path.exists()));
    }

    #[test]
    fn test_stop_with_empty_buffer_produces_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        // Exactly two chunks worth of samples, nothing left over.
        let device = ScriptedDevice::new(vec![Ok(vec![Ok(vec![0.0; 10]), Ok(vec![0.0; 10])])]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.list_chunks().len() == 2);

        let chunks = engine.stop();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| !c.is_partial));
    }

    #[test]
    fn test_chunk_boundary_carries_remainder_without_loss() {
        let dir = tempfile::tempdir().unwrap();
        // Blocks of 7 samples against a 10-sample chunk size: boundaries
        // never align with block edges.
        let device = ScriptedDevice::new(vec![Ok(vec![
            Ok((0..7).map(|i| i as f32).collect()),
            Ok((7..14).map(|i| i as f32).collect()),
            Ok((14..21).map(|i| i as f32).collect()),
        ])]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.list_chunks().len() == 2);
        let chunks = engine.stop();

        assert_eq!(chunks.len(), 3);
        let mut all: Vec<f32> = Vec::new();
        for chunk in &chunks {
            let mut reader = hound::WavReader::open(&chunk.path).unwrap();
            all.extend(reader.samples::<f32>().map(|s| s.unwrap()));
        }
        let expected: Vec<f32> = (0..21).map(|i| i as f32).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_fewer_than_three_failures_continues_capture() {
        let dir = tempfile::tempdir().unwrap();
        // One chunk, then a read error; reacquisition succeeds and a
        // second chunk arrives on the new input.
        let device = ScriptedDevice::new(vec![
            Ok(vec![
                Ok(vec![0.1; 10]),
                Err(CaptureError::device("unplugged")),
            ]),
            Ok(vec![Ok(vec![0.2; 10])]),
        ]);
        let mut engine = AudioCaptureEngine::new(device.clone(), test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.list_chunks().len() == 2);

        let chunks = engine.stop();
        assert_eq!(engine.state(), CaptureState::Stopped);
        assert_eq!(engine.reconnect_attempts(), 1);
        // Sequence continuity preserved across the outage.
        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(device.open_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_three_consecutive_failures_transitions_to_errored() {
        let dir = tempfile::tempdir().unwrap();
        // First open succeeds, the read fails, then both reopen attempts
        // fail: three consecutive failures in total.
        let device = ScriptedDevice::new(vec![
            Ok(vec![Err(CaptureError::device("unplugged"))]),
            Err(()),
            Err(()),
        ]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.state() == CaptureState::Errored);
        assert_eq!(engine.reconnect_attempts(), 3);

        let chunks = engine.stop();
        assert!(chunks.is_empty());
        assert_eq!(engine.state(), CaptureState::Errored);
    }

    #[test]
    fn test_errored_exit_still_flushes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![
            Ok(vec![
                Ok(vec![0.5; 4]),
                Err(CaptureError::device("unplugged")),
            ]),
            Err(()),
            Err(()),
        ]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.state() == CaptureState::Errored);

        let chunks = engine.stop();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_partial);
    }

    #[test]
    fn test_start_is_idempotent_while_capturing() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![Ok(vec![Ok(vec![0.0; 10])])]);
        let mut engine = AudioCaptureEngine::new(device.clone(), test_settings(dir.path()));

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| engine.list_chunks().len() == 1);

        // Second start is a no-op: same session, no second device open.
        engine.start(DeviceSelector::Default).unwrap();
        assert_eq!(device.open_count.load(Ordering::SeqCst), 1);

        let chunks = engine.stop();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_write_failure_records_missing_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.chunk_dir = PathBuf::from("/proc/meetdocs-unwritable");

        let device = ScriptedDevice::new(vec![Ok(vec![Ok(vec![0.0; 10])])]);
        let mut engine = AudioCaptureEngine::new(device, settings);

        engine.start(DeviceSelector::Default).unwrap();
        wait_until(|| !engine.failed_sequences().is_empty());

        let chunks = engine.stop();
        assert!(chunks.is_empty());
        assert_eq!(engine.failed_sequences(), vec![0]);
    }

    #[test]
    fn test_stop_without_start_is_safe() {
        let dir = tempfile::tempdir().unwrap();
        let device = ScriptedDevice::new(vec![]);
        let mut engine = AudioCaptureEngine::new(device, test_settings(dir.path()));

        let chunks = engine.stop();
        assert!(chunks.is_empty());
    }
}
