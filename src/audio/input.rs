//! Audio input seam: device opening and blocking block reads.
//!
//! The capture engine never talks to cpal directly; it consumes
//! [`AudioInput`] blocks through an opener, so capture logic is testable
//! without hardware and device loss is recoverable by reopening.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use std::fmt;
use std::time::Duration;
use tracing::{error, info};

use crate::error::CaptureError;

/// Which input device to capture from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    Default,
    Index(usize),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// A live audio input delivering fixed-cadence blocks of interleaved
/// f32 samples. Created and consumed entirely on the capture thread.
pub trait AudioInput {
    /// Blocking read of the next block. A stalled or disconnected device
    /// surfaces as [`CaptureError::Device`].
    fn read_block(&mut self) -> Result<Vec<f32>, CaptureError>;
}

/// Opens [`AudioInput`]s. The opener crosses into the capture thread; the
/// inputs it produces do not.
pub trait InputDevice: Send + Sync {
    fn open(&self, selector: DeviceSelector) -> Result<Box<dyn AudioInput>, CaptureError>;
}

/// Block size delivered to the stream callback, as a fraction of a second.
const BLOCK_SECONDS: f64 = 0.1;

/// How long a silent stream is tolerated before it counts as a device error.
const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// cpal-backed input. The stream callback forwards each buffer into a
/// bounded channel; `read_block` drains it. Stream errors travel through
/// the same channel so the capture loop sees them in order.
pub struct CpalInput {
    // Held to keep the stream alive; dropped to stop it.
    _stream: cpal::Stream,
    rx: Receiver<Result<Vec<f32>, CaptureError>>,
}

impl AudioInput for CpalInput {
    fn read_block(&mut self) -> Result<Vec<f32>, CaptureError> {
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(block) => block,
            Err(RecvTimeoutError::Timeout) => Err(CaptureError::device(
                "audio stream stalled: no samples received",
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CaptureError::device("audio stream closed unexpectedly"))
            }
        }
    }
}

/// Opens cpal input streams at a fixed sample rate and channel count.
pub struct CpalInputDevice {
    sample_rate: u32,
    channels: u16,
}

impl CpalInputDevice {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    fn select_device(&self, selector: DeviceSelector) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        match selector {
            DeviceSelector::Default => host
                .default_input_device()
                .ok_or_else(|| CaptureError::device("no default input device available")),
            DeviceSelector::Index(idx) => {
                let mut devices = host.input_devices().map_err(|e| {
                    CaptureError::device(format!("failed to enumerate input devices: {e}"))
                })?;
                devices
                    .nth(idx)
                    .ok_or_else(|| CaptureError::device(format!("no input device at index {idx}")))
            }
        }
    }
}

impl InputDevice for CpalInputDevice {
    fn open(&self, selector: DeviceSelector) -> Result<Box<dyn AudioInput>, CaptureError> {
        let device = self.select_device(selector)?;

        info!(
            "Opening capture device {} ({})",
            selector,
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        // A couple of seconds of backlog; the capture loop drains far faster.
        let capacity = (2.0 / BLOCK_SECONDS) as usize;
        let (tx, rx) = bounded::<Result<Vec<f32>, CaptureError>>(capacity);

        let data_tx = tx.clone();
        let err_tx = tx;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // A full channel means the consumer died or stalled;
                    // dropping the block here is the only safe option.
                    let _ = data_tx.try_send(Ok(data.to_vec()));
                },
                move |err| {
                    error!("Capture stream error: {}", err);
                    let _ = err_tx.try_send(Err(CaptureError::device(err.to_string())));
                },
                None,
            )
            .map_err(|e| CaptureError::device(format!("failed to open input stream: {e}")))?;

        stream
            .play()
            .map_err(|e| CaptureError::device(format!("failed to start input stream: {e}")))?;

        Ok(Box::new(CpalInput {
            _stream: stream,
            rx,
        }))
    }
}

/// Information about one enumerated input device, for `--list-devices`.
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Enumerate available input devices.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::device(format!("failed to enumerate input devices: {e}")))?;

    let mut infos = Vec::new();
    for (index, device) in devices.enumerate() {
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());
        let (channels, sample_rate) = match device.default_input_config() {
            Ok(cfg) => (cfg.channels(), cfg.sample_rate().0),
            Err(_) => (0, 0),
        };
        infos.push(InputDeviceInfo {
            index,
            name,
            channels,
            sample_rate,
        });
    }

    Ok(infos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_selector_display() {
        assert_eq!(DeviceSelector::Default.to_string(), "default");
        assert_eq!(DeviceSelector::Index(3).to_string(), "3");
    }
}
