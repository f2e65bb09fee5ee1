//! Audio nodes
//!
//! Every processing unit in a graph implements [`AudioNode`]: built-in DSP
//! nodes and wrapped third-party plugins alike. Shared behaviour lives in
//! free functions ([`state`], [`parameter::find`]) and the [`PlayConfig`]
//! helper that nodes compose, not in a base type.
//!
//! Lifecycle: construct (channel counts fixed) → [`AudioNode::prepare`] →
//! repeated [`AudioNode::process`] → [`AudioNode::release_resources`].
//! State can be read or written at any point after construction.

mod allpass;
mod gain;
mod passthrough;
pub mod parameter;
pub mod registry;
pub mod state;

use std::sync::Arc;

use crate::engine::AudioBuffer;

pub use allpass::{AllPassFilterNode, ALLPASS_MONO_CLASS, ALLPASS_STEREO_CLASS};
pub use gain::{GainNode, GAIN_MONO_CLASS, GAIN_STEREO_CLASS};
pub use parameter::Parameter;
pub use passthrough::{PassThroughNode, PASSTHROUGH_MONO_CLASS, PASSTHROUGH_STEREO_CLASS};
pub use registry::{NodeClass, NodeRegistry};

/// Static description of a node: identity and channel contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDescriptor {
    /// Processor class identifier used in documents and the registry
    pub class_id: &'static str,
    /// Human readable name
    pub name: &'static str,
    /// Declared input channel count
    pub num_inputs: usize,
    /// Declared output channel count
    pub num_outputs: usize,
    /// Whether the node consumes MIDI
    pub accepts_midi: bool,
    /// Whether the node emits MIDI
    pub produces_midi: bool,
}

impl NodeDescriptor {
    /// Channel count of the in-place processing buffer
    pub fn buffer_channels(&self) -> usize {
        self.num_inputs.max(self.num_outputs)
    }
}

/// Capability interface for block-based audio processors
///
/// `process` works in place on a buffer with
/// `max(num_inputs, num_outputs)` channels: inputs arrive in the first
/// `num_inputs` channels, outputs are read from the first `num_outputs`.
/// It must not allocate, block or fail; a node that cannot apply a
/// parameter change clamps or ignores it.
pub trait AudioNode: Send {
    /// Identity and channel contract; must not change over the node's life
    fn descriptor(&self) -> NodeDescriptor;

    /// Allocate working memory for `sample_rate` and blocks up to `max_block_size`
    ///
    /// Safe to call repeatedly. Each call discards previous audio state.
    fn prepare(&mut self, sample_rate: f64, max_block_size: usize);

    /// Process one block in place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Free working memory; the node is inert until prepared again
    fn release_resources(&mut self);

    /// Whether `prepare` has been called since construction or the last release
    fn is_prepared(&self) -> bool;

    /// Ordered parameter list
    fn parameters(&self) -> &[Arc<Parameter>];

    /// Seconds of output after the input falls silent
    fn tail_length_seconds(&self) -> f64 {
        0.0
    }

    /// Number of programs the node exposes
    fn num_programs(&self) -> usize {
        1
    }

    /// Index of the active program
    fn current_program(&self) -> usize {
        0
    }

    /// Select a program; out-of-range indices are ignored
    fn set_current_program(&mut self, _index: usize) {}

    /// Name of a program
    fn program_name(&self, _index: usize) -> String {
        "Default".to_string()
    }

    /// Serialize parameter values into an opaque state blob
    fn get_state(&self) -> Vec<u8> {
        state::encode_parameters(self.parameters())
    }

    /// Restore parameter values from a state blob
    ///
    /// Malformed blobs are logged and ignored; parameters keep their values.
    fn set_state(&mut self, data: &[u8]) {
        if let Err(warning) = state::apply_parameters(self.parameters(), data) {
            tracing::warn!(node = self.descriptor().class_id, %warning, "ignoring node state");
        }
    }
}

/// Playback configuration shared by built-in nodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayConfig {
    /// Sample rate passed to the last `prepare`
    pub sample_rate: f64,
    /// Largest block the node was prepared for
    pub max_block_size: usize,
    prepared: bool,
}

impl PlayConfig {
    /// Unprepared configuration with host defaults
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            max_block_size: 1024,
            prepared: false,
        }
    }

    /// Record a `prepare` call
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.max_block_size = max_block_size;
        self.prepared = true;
    }

    /// Record a `release_resources` call
    pub fn release(&mut self) {
        self.prepared = false;
    }

    /// Whether the node is prepared
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Convert milliseconds to a whole sample count at the current rate
    pub fn ms_to_samples(&self, ms: f32) -> usize {
        ms_to_samples(ms, self.sample_rate)
    }
}

impl Default for PlayConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds to samples, rounded to the nearest integer
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f64) -> usize {
    (ms as f64 * sample_rate / 1000.0).round().max(0.0) as usize
}

/// Helper macro to implement common AudioNode trait methods
///
/// Expects `config: PlayConfig` and `params: Vec<Arc<Parameter>>` fields.
#[macro_export]
macro_rules! impl_node_common {
    () => {
        fn is_prepared(&self) -> bool {
            self.config.is_prepared()
        }

        fn parameters(&self) -> &[std::sync::Arc<$crate::node::Parameter>] {
            &self.params
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_samples_rounds() {
        assert_eq!(ms_to_samples(90.0, 44100.0), 3969);
        assert_eq!(ms_to_samples(1.0, 44100.0), 44);
        assert_eq!(ms_to_samples(0.5, 48000.0), 24);
    }

    #[test]
    fn test_play_config_lifecycle() {
        let mut config = PlayConfig::new();
        assert!(!config.is_prepared());
        config.prepare(48000.0, 256);
        assert!(config.is_prepared());
        assert_eq!(config.ms_to_samples(10.0), 480);
        config.release();
        assert!(!config.is_prepared());
    }

    #[test]
    fn test_buffer_channels() {
        let desc = NodeDescriptor {
            class_id: "test",
            name: "Test",
            num_inputs: 1,
            num_outputs: 2,
            accepts_midi: false,
            produces_midi: false,
        };
        assert_eq!(desc.buffer_channels(), 2);
    }
}
