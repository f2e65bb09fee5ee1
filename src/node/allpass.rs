//! All-pass filter node
//!
//! First-order all-pass (Freeverb style) with one "Buffer Length" parameter
//! in milliseconds. Every built-in node follows the same pattern:
//!
//! - `prepare` sizes the per-channel delay lines from the current parameter
//!   value and discards old audio.
//! - `process` compares the parameter against the last applied value once per
//!   block, resizes synchronously if it moved, then runs the sample loop.
//! - Delay lines reserve room for the longest allowed length at `prepare`,
//!   so a resize on the audio thread never reallocates.

use std::sync::Arc;

use crate::engine::AudioBuffer;
use crate::impl_node_common;
use crate::node::{AudioNode, NodeDescriptor, Parameter, PlayConfig};

// ============================================================================
// Constants
// ============================================================================

/// Class id of the mono variant
pub const ALLPASS_MONO_CLASS: &str = "plexus.allpass.mono";

/// Class id of the stereo variant
pub const ALLPASS_STEREO_CLASS: &str = "plexus.allpass.stereo";

/// Shortest buffer length in milliseconds
const MIN_LENGTH_MS: f32 = 1.0;

/// Longest buffer length in milliseconds
const MAX_LENGTH_MS: f32 = 500.0;

/// Buffer length on construction
const DEFAULT_LENGTH_MS: f32 = 90.0;

/// Feedback coefficient (standard Freeverb value)
const FEEDBACK: f32 = 0.5;

// ============================================================================
// Delay Line
// ============================================================================

/// Circular delay line driving one channel of the all-pass
#[derive(Debug, Clone, Default)]
struct DelayLine {
    buffer: Vec<f32>,
    index: usize,
}

impl DelayLine {
    /// Allocate `len` zeroed samples with room to grow to `capacity`
    fn allocate(&mut self, len: usize, capacity: usize) {
        let mut buffer = Vec::with_capacity(capacity.max(len));
        buffer.resize(len, 0.0);
        self.buffer = buffer;
        self.index = 0;
    }

    /// Change the length keeping existing content
    ///
    /// Shrinking drops the samples past `len`; growing appends silence.
    fn resize(&mut self, len: usize) {
        self.buffer.truncate(len);
        self.buffer.resize(len, 0.0);
        if self.index >= len {
            self.index = 0;
        }
    }

    fn free(&mut self) {
        self.buffer = Vec::new();
        self.index = 0;
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let len = self.buffer.len();
        if len == 0 {
            return input;
        }

        let buffered = self.buffer[self.index];
        self.buffer[self.index] = flush_denormal(input + buffered * FEEDBACK);

        self.index += 1;
        if self.index >= len {
            self.index = 0;
        }

        buffered - input
    }
}

#[inline]
fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1.0e-15 {
        0.0
    } else {
        x
    }
}

// ============================================================================
// All-pass Node
// ============================================================================

/// Mono or stereo all-pass filter node
///
/// # Parameters
/// - `length`: Buffer length in milliseconds (1 to 500, default 90)
///
/// # Example
/// ```
/// use plexus::node::{AllPassFilterNode, AudioNode};
///
/// let mut node = AllPassFilterNode::mono();
/// node.set_length_ms(90.0);
/// node.prepare(44100.0, 512);
/// assert_eq!(node.delay_line_len(0), Some(3969));
/// ```
#[derive(Debug)]
pub struct AllPassFilterNode {
    stereo: bool,
    config: PlayConfig,
    params: Vec<Arc<Parameter>>,
    length: Arc<Parameter>,
    last_length: f32,
    lines: Vec<DelayLine>,
}

impl AllPassFilterNode {
    /// Create a mono or stereo all-pass node
    pub fn new(stereo: bool) -> Self {
        let length = Parameter::shared(
            "length",
            "Buffer Length",
            MIN_LENGTH_MS,
            MAX_LENGTH_MS,
            DEFAULT_LENGTH_MS,
        );
        let channels = if stereo { 2 } else { 1 };
        Self {
            stereo,
            config: PlayConfig::new(),
            params: vec![Arc::clone(&length)],
            last_length: length.value(),
            length,
            lines: vec![DelayLine::default(); channels],
        }
    }

    /// Create a mono node
    pub fn mono() -> Self {
        Self::new(false)
    }

    /// Create a stereo node
    pub fn stereo() -> Self {
        Self::new(true)
    }

    /// Set the buffer length in milliseconds (clamped to 1-500)
    ///
    /// Takes effect at the start of the next processed block.
    pub fn set_length_ms(&self, ms: f32) {
        self.length.set_value(ms);
    }

    /// Current buffer length in milliseconds
    pub fn length_ms(&self) -> f32 {
        self.length.value()
    }

    /// Current delay line size of a channel in samples
    pub fn delay_line_len(&self, channel: usize) -> Option<usize> {
        self.lines.get(channel).map(DelayLine::len)
    }

    /// Current delay line contents of a channel
    pub fn delay_line(&self, channel: usize) -> Option<&[f32]> {
        self.lines.get(channel).map(|line| line.buffer.as_slice())
    }

    fn num_channels(&self) -> usize {
        self.lines.len()
    }

    fn target_len(&self, length_ms: f32) -> usize {
        self.config.ms_to_samples(length_ms).max(1)
    }
}

impl Default for AllPassFilterNode {
    fn default() -> Self {
        Self::mono()
    }
}

impl AudioNode for AllPassFilterNode {
    impl_node_common!();

    fn descriptor(&self) -> NodeDescriptor {
        NodeDescriptor {
            class_id: if self.stereo {
                ALLPASS_STEREO_CLASS
            } else {
                ALLPASS_MONO_CLASS
            },
            name: if self.stereo {
                "AllPass Filter (stereo)"
            } else {
                "AllPass Filter (mono)"
            },
            num_inputs: self.num_channels(),
            num_outputs: self.num_channels(),
            accepts_midi: false,
            produces_midi: false,
        }
    }

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.config.prepare(sample_rate, max_block_size);
        self.last_length = self.length.value();

        let len = self.target_len(self.last_length);
        let capacity = self.target_len(MAX_LENGTH_MS);
        for line in &mut self.lines {
            line.allocate(len, capacity);
        }
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.config.is_prepared() {
            return;
        }

        let length = self.length.value();
        if length != self.last_length {
            let len = self.target_len(length);
            for line in &mut self.lines {
                line.resize(len);
            }
            self.last_length = length;
        }

        let channels = self.num_channels().min(buffer.num_channels());
        for (c, line) in self.lines.iter_mut().enumerate().take(channels) {
            for sample in buffer.channel_mut(c).iter_mut() {
                *sample = line.process(*sample);
            }
        }
    }

    fn release_resources(&mut self) {
        for line in &mut self.lines {
            line.free();
        }
        self.config.release();
    }

    fn program_name(&self, _index: usize) -> String {
        "Parameter".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn impulse(len: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(1, len);
        buffer.set_sample(0, 0, 1.0);
        buffer
    }

    #[test]
    fn test_prepare_sizes_delay_line_from_parameter() {
        let mut node = AllPassFilterNode::mono();
        node.set_length_ms(90.0);
        node.prepare(44100.0, 512);
        assert_eq!(node.delay_line_len(0), Some(3969));
    }

    #[test]
    fn test_stereo_has_two_lines() {
        let mut node = AllPassFilterNode::stereo();
        node.prepare(48000.0, 256);
        let desc = node.descriptor();
        assert_eq!(desc.num_inputs, 2);
        assert_eq!(desc.num_outputs, 2);
        assert_eq!(desc.class_id, ALLPASS_STEREO_CLASS);
        assert_eq!(node.delay_line_len(0), Some(4320));
        assert_eq!(node.delay_line_len(1), Some(4320));
    }

    #[test]
    fn test_impulse_response() {
        let mut node = AllPassFilterNode::mono();
        node.set_length_ms(1.0);
        node.prepare(10000.0, 64);
        assert_eq!(node.delay_line_len(0), Some(10));

        let mut buffer = impulse(25);
        node.process(&mut buffer);

        let out = buffer.channel(0);
        assert_relative_eq!(out[0], -1.0);
        assert_relative_eq!(out[1], 0.0);
        assert_relative_eq!(out[10], 1.0);
        assert_relative_eq!(out[20], 0.5);
    }

    #[test]
    fn test_parameter_change_resizes_before_block() {
        let mut node = AllPassFilterNode::mono();
        node.set_length_ms(10.0);
        node.prepare(44100.0, 128);
        assert_eq!(node.delay_line_len(0), Some(441));

        node.set_length_ms(20.0);
        let mut buffer = AudioBuffer::new(1, 128);
        node.process(&mut buffer);
        assert_eq!(node.delay_line_len(0), Some(882));
    }

    #[test]
    fn test_shrink_then_grow_leaves_silent_tail() {
        let mut node = AllPassFilterNode::mono();
        node.set_length_ms(10.0);
        node.prepare(44100.0, 512);

        // Fill the whole delay line with non-zero history
        let mut buffer = AudioBuffer::new(1, 441);
        buffer.channel_mut(0).fill(0.25);
        node.process(&mut buffer);
        assert!(node.delay_line(0).unwrap().iter().all(|&s| s != 0.0));

        node.set_length_ms(5.0);
        let mut empty = AudioBuffer::new(1, 0);
        node.process(&mut empty);
        let shrunk = node.delay_line_len(0).unwrap();
        assert_eq!(shrunk, 221);

        node.set_length_ms(10.0);
        node.process(&mut empty);
        let line = node.delay_line(0).unwrap();
        assert_eq!(line.len(), 441);
        assert!(line[shrunk..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_resize_during_stream_stays_in_bounds() {
        let mut node = AllPassFilterNode::stereo();
        node.prepare(48000.0, 64);
        let mut buffer = AudioBuffer::new(2, 64);
        for step in 0..200 {
            node.set_length_ms(1.0 + (step * 37 % 500) as f32);
            buffer.channel_mut(0).fill(0.1);
            buffer.channel_mut(1).fill(-0.1);
            node.process(&mut buffer);
            assert!(buffer.channels().flatten().all(|s| s.is_finite()));
        }
    }

    #[test]
    fn test_prepare_discards_previous_audio() {
        let mut node = AllPassFilterNode::mono();
        node.prepare(44100.0, 64);
        let mut buffer = AudioBuffer::new(1, 64);
        buffer.channel_mut(0).fill(1.0);
        node.process(&mut buffer);

        node.prepare(44100.0, 64);
        assert!(node.delay_line(0).unwrap().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_release_makes_node_inert() {
        let mut node = AllPassFilterNode::mono();
        node.prepare(44100.0, 64);
        node.release_resources();
        assert!(!node.is_prepared());
        assert_eq!(node.delay_line_len(0), Some(0));

        let mut buffer = impulse(8);
        node.process(&mut buffer);
        assert_relative_eq!(buffer.channel(0)[0], 1.0);
    }

    #[test]
    fn test_state_round_trip() {
        let node = AllPassFilterNode::mono();
        node.set_length_ms(250.0);
        let blob = node.get_state();

        let mut restored = AllPassFilterNode::mono();
        restored.set_state(&blob);
        assert_relative_eq!(restored.length_ms(), 250.0);
    }

    #[test]
    fn test_malformed_state_is_ignored() {
        let mut node = AllPassFilterNode::mono();
        node.set_length_ms(33.0);
        node.set_state(b"garbage");
        assert_relative_eq!(node.length_ms(), 33.0);
    }

    #[test]
    fn test_programs() {
        let node = AllPassFilterNode::mono();
        assert_eq!(node.num_programs(), 1);
        assert_eq!(node.program_name(0), "Parameter");
        assert_eq!(node.tail_length_seconds(), 0.0);
    }
}
