//! Gain node
//!
//! Volume control with a dB parameter. The linear multiplier is cached and
//! recomputed once per block when the parameter moves.

use std::sync::Arc;

use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::impl_node_common;
use crate::node::{AudioNode, NodeDescriptor, Parameter, PlayConfig};

// ============================================================================
// Constants
// ============================================================================

/// Class id of the mono variant
pub const GAIN_MONO_CLASS: &str = "plexus.gain.mono";

/// Class id of the stereo variant
pub const GAIN_STEREO_CLASS: &str = "plexus.gain.stereo";

/// Minimum gain in dB (-96 dB = effectively silent)
const MIN_GAIN_DB: f32 = -96.0;

/// Maximum gain in dB (+24 dB)
const MAX_GAIN_DB: f32 = 24.0;

// ============================================================================
// Gain Node
// ============================================================================

/// Gain node
///
/// # Parameters
/// - `gain`: Gain in decibels (-96 to +24 dB)
#[derive(Debug)]
pub struct GainNode {
    channels: usize,
    config: PlayConfig,
    params: Vec<Arc<Parameter>>,
    gain_db: Arc<Parameter>,
    last_gain_db: f32,
    gain_linear: f32,
}

impl GainNode {
    /// Create a gain node with `channels` (1 or 2) and an initial gain
    pub fn new(channels: usize, gain_db: f32) -> Self {
        let param = Parameter::shared("gain", "Gain", MIN_GAIN_DB, MAX_GAIN_DB, 0.0);
        param.set_value(gain_db);
        let value = param.value();
        Self {
            channels: channels.clamp(1, 2),
            config: PlayConfig::new(),
            params: vec![Arc::clone(&param)],
            gain_db: param,
            last_gain_db: value,
            gain_linear: db_to_linear(value),
        }
    }

    /// Mono gain node at unity
    pub fn mono() -> Self {
        Self::new(1, 0.0)
    }

    /// Stereo gain node at unity
    pub fn stereo() -> Self {
        Self::new(2, 0.0)
    }

    /// Set the gain in decibels (clamped to -96..+24)
    pub fn set_gain_db(&self, db: f32) {
        self.gain_db.set_value(db);
    }

    /// Current gain in decibels
    pub fn gain_db(&self) -> f32 {
        self.gain_db.value()
    }

    /// Linear multiplier applied in the last processed block
    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }

    fn refresh_gain(&mut self) {
        let db = self.gain_db.value();
        if db != self.last_gain_db {
            self.last_gain_db = db;
            self.gain_linear = db_to_linear(db);
        }
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::stereo()
    }
}

impl AudioNode for GainNode {
    impl_node_common!();

    fn descriptor(&self) -> NodeDescriptor {
        let stereo = self.channels == 2;
        NodeDescriptor {
            class_id: if stereo { GAIN_STEREO_CLASS } else { GAIN_MONO_CLASS },
            name: if stereo { "Gain (stereo)" } else { "Gain (mono)" },
            num_inputs: self.channels,
            num_outputs: self.channels,
            accepts_midi: false,
            produces_midi: false,
        }
    }

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.config.prepare(sample_rate, max_block_size);
        // Update linear cache in case the value was restored from state
        self.last_gain_db = self.gain_db.value();
        self.gain_linear = db_to_linear(self.last_gain_db);
    }

    fn process(&mut self, buffer: &mut AudioBuffer) {
        if !self.config.is_prepared() {
            return;
        }
        self.refresh_gain();

        // Unity gain optimization
        if (self.gain_linear - 1.0).abs() < f32::EPSILON {
            return;
        }

        let channels = self.channels.min(buffer.num_channels());
        for channel in 0..channels {
            for sample in buffer.channel_mut(channel).iter_mut() {
                *sample *= self.gain_linear;
            }
        }
    }

    fn release_resources(&mut self) {
        self.config.release();
    }
}

// ============================================================================
// Tests
// ============================================================================
