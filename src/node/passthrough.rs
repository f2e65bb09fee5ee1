//! Pass-through node
//!
//! Copies its inputs to its outputs. The default graph is a single stereo
//! pass-through, so a fresh session routes host input straight to output.

use std::sync::Arc;

use crate::engine::AudioBuffer;
use crate::impl_node_common;
use crate::node::{AudioNode, NodeDescriptor, Parameter, PlayConfig};

/// Class id of the mono variant
pub const PASSTHROUGH_MONO_CLASS: &str = "plexus.passthrough.mono";

/// Class id of the stereo variant
pub const PASSTHROUGH_STEREO_CLASS: &str = "plexus.passthrough.stereo";

/// N-channel pass-through node with no parameters
#[derive(Debug)]
pub struct PassThroughNode {
    channels: usize,
    config: PlayConfig,
    params: Vec<Arc<Parameter>>,
}

impl PassThroughNode {
    /// Create a pass-through with `channels` (1 or 2)
    pub fn new(channels: usize) -> Self {
        Self {
            channels: channels.clamp(1, 2),
            config: PlayConfig::new(),
            params: Vec::new(),
        }
    }

    /// Mono pass-through
    pub fn mono() -> Self {
        Self::new(1)
    }

    /// Stereo pass-through
    pub fn stereo() -> Self {
        Self::new(2)
    }
}

impl AudioNode for PassThroughNode {
    impl_node_common!();

    fn descriptor(&self) -> NodeDescriptor {
        let stereo = self.channels == 2;
        NodeDescriptor {
            class_id: if stereo {
                PASSTHROUGH_STEREO_CLASS
            } else {
                PASSTHROUGH_MONO_CLASS
            },
            name: if stereo {
                "Pass-through (stereo)"
            } else {
                "Pass-through (mono)"
            },
            num_inputs: self.channels,
            num_outputs: self.channels,
            accepts_midi: false,
            produces_midi: false,
        }
    }

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.config.prepare(sample_rate, max_block_size);
    }

    fn process(&mut self, _buffer: &mut AudioBuffer) {
        // In-place buffer: inputs already are the outputs
    }

    fn release_resources(&mut self) {
        self.config.release();
    }
}
