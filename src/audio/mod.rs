pub mod capture_engine;
pub mod chunk;
pub mod chunk_writer;
pub mod input;

pub use capture_engine::{AudioCaptureEngine, CaptureSettings, CaptureState};
pub use chunk::AudioChunk;
pub use chunk_writer::ChunkWriter;
pub use input::{
    list_input_devices, AudioInput, CpalInputDevice, DeviceSelector, InputDevice, InputDeviceInfo,
};
