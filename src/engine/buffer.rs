//! Audio Buffer Management
//!
//! Non-interleaved f32 block buffers shared by nodes, the graph router
//! and the offline renderer.

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert decibels to linear amplitude
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert linear amplitude to decibels
///
/// Returns -f32::INFINITY for zero input.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        f32::NEG_INFINITY
    } else {
        20.0 * linear.log10()
    }
}

// ============================================================================
// Audio Buffer
// ============================================================================

/// Block of non-interleaved 32-bit float audio
///
/// Each channel is a separate `Vec<f32>`. Buffers used on the audio thread
/// are created with [`AudioBuffer::with_capacity`] so that
/// [`AudioBuffer::set_num_samples`] never reallocates for blocks up to the
/// prepared size.
///
/// # Example
/// ```
/// use plexus::engine::AudioBuffer;
///
/// let mut buffer = AudioBuffer::with_capacity(2, 512);
/// buffer.set_num_samples(128);
/// assert_eq!(buffer.num_channels(), 2);
/// assert_eq!(buffer.num_samples(), 128);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Create a zeroed buffer with `num_channels` x `num_samples`
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            samples: vec![vec![0.0_f32; num_samples]; num_channels],
            sample_rate: 44100,
        }
    }

    /// Create an empty buffer whose channels can hold `max_samples` without reallocating
    pub fn with_capacity(num_channels: usize, max_samples: usize) -> Self {
        Self {
            samples: (0..num_channels)
                .map(|_| Vec::with_capacity(max_samples))
                .collect(),
            sample_rate: 44100,
        }
    }

    /// Create a buffer from per-channel sample data
    ///
    /// Channels shorter than the longest one are zero-padded.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let len = channels.iter().map(Vec::len).max().unwrap_or(0);
        let samples = channels
            .into_iter()
            .map(|mut ch| {
                ch.resize(len, 0.0);
                ch
            })
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    /// Sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Set the sample rate tag (does not resample)
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Get the number of channels
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer holds no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_samples() == 0
    }

    /// Resize every channel to `num_samples`
    ///
    /// New samples are zero. Does not allocate while `num_samples` stays
    /// within the capacity the buffer was created with.
    pub fn set_num_samples(&mut self, num_samples: usize) {
        for ch in &mut self.samples {
            ch.resize(num_samples, 0.0);
        }
    }

    /// Zero every sample
    pub fn clear(&mut self) {
        for ch in &mut self.samples {
            ch.fill(0.0);
        }
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Iterate over channels
    pub fn channels(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.iter().map(Vec::as_slice)
    }

    /// Get a sample, or None if out of bounds
    #[inline]
    pub fn get_sample(&self, channel: usize, index: usize) -> Option<f32> {
        self.samples
            .get(channel)
            .and_then(|ch| ch.get(index).copied())
    }

    /// Set a sample, returning false if out of bounds
    #[inline]
    pub fn set_sample(&mut self, channel: usize, index: usize, value: f32) -> bool {
        if let Some(ch) = self.samples.get_mut(channel) {
            if let Some(sample) = ch.get_mut(index) {
                *sample = value;
                return true;
            }
        }
        false
    }

    /// Add `source` into channel `channel`, sample by sample
    ///
    /// Only the overlapping length is mixed.
    #[inline]
    pub fn add_from(&mut self, channel: usize, source: &[f32]) {
        if let Some(dest) = self.samples.get_mut(channel) {
            for (d, s) in dest.iter_mut().zip(source) {
                *d += *s;
            }
        }
    }

    /// Copy `source` into channel `channel`, overwriting it
    #[inline]
    pub fn copy_from(&mut self, channel: usize, source: &[f32]) {
        if let Some(dest) = self.samples.get_mut(channel) {
            let n = dest.len().min(source.len());
            dest[..n].copy_from_slice(&source[..n]);
        }
    }

    /// Copy frames `[start, start + len)` of `source` into this buffer
    ///
    /// Used to slice long files into engine blocks.
    pub fn copy_frames_from(&mut self, source: &AudioBuffer, start: usize) {
        let len = self.num_samples();
        for (ch, dest) in self.samples.iter_mut().enumerate() {
            dest.fill(0.0);
            if let Some(src) = source.samples.get(ch) {
                let end = (start + len).min(src.len());
                if start < end {
                    dest[..end - start].copy_from_slice(&src[start..end]);
                }
            }
        }
    }

    /// Peak absolute sample value across all channels
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .flat_map(|ch| ch.iter())
            .map(|s| s.abs())
            .fold(0.0_f32, f32::max)
    }

    /// Peak level in dB (-inf for silence)
    pub fn peak_db(&self) -> f32 {
        linear_to_db(self.peak())
    }

    /// Convert to interleaved samples (L, R, L, R, ...)
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.num_channels();
        let num_samples = self.num_samples();
        let mut interleaved = Vec::with_capacity(num_channels * num_samples);
        for i in 0..num_samples {
            for ch in &self.samples {
                interleaved.push(ch[i]);
            }
        }
        interleaved
    }
}
