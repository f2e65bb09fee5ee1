//! Audio Engine Module
//!
//! Buffers, WAV file I/O and the real-time side of the host:
//! - [`AudioBuffer`]: non-interleaved f32 blocks
//! - [`AudioEngine`] / [`AudioProcessor`]: control and audio thread halves
//!   of the running graph

pub mod buffer;
pub mod io;
pub mod processor;

pub use buffer::AudioBuffer;
pub use io::{export_wav, generate_test_tone, import_wav, BitDepth};
pub use processor::{AudioEngine, AudioProcessor, GraphCell};
