//! Node parameters
//!
//! A parameter value is written by the control thread and read by the audio
//! thread. The value lives in an `AtomicU32` holding the f32 bit pattern, so
//! a read is never torn. Values are clamped into range on every write.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A typed, range-checked node parameter
#[derive(Debug)]
pub struct Parameter {
    id: &'static str,
    display_name: &'static str,
    min: f32,
    max: f32,
    default: f32,
    value: AtomicU32,
}

impl Parameter {
    /// Create a parameter; `default` is clamped into `[min, max]`
    pub fn new(id: &'static str, display_name: &'static str, min: f32, max: f32, default: f32) -> Self {
        debug_assert!(min <= max, "parameter range is inverted");
        let default = default.clamp(min, max);
        Self {
            id,
            display_name,
            min,
            max,
            default,
            value: AtomicU32::new(default.to_bits()),
        }
    }

    /// Create a shared handle
    pub fn shared(id: &'static str, display_name: &'static str, min: f32, max: f32, default: f32) -> Arc<Self> {
        Arc::new(Self::new(id, display_name, min, max, default))
    }

    /// Stable identifier used in state blobs and documents
    pub fn id(&self) -> &'static str {
        self.id
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        self.display_name
    }

    /// Inclusive value range
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Default value
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Current value
    #[inline]
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Set the value, clamped into range
    ///
    /// NaN is ignored so the stored value always stays valid.
    #[inline]
    pub fn set_value(&self, value: f32) {
        if value.is_nan() {
            return;
        }
        let clamped = value.clamp(self.min, self.max);
        self.value.store(clamped.to_bits(), Ordering::Relaxed);
    }

    /// Restore the default value
    pub fn reset(&self) {
        self.set_value(self.default);
    }

    /// Value mapped to 0..1
    pub fn normalized(&self) -> f32 {
        if self.max > self.min {
            (self.value() - self.min) / (self.max - self.min)
        } else {
            0.0
        }
    }
}

/// Find a parameter by id in a node's parameter list
pub fn find<'a>(parameters: &'a [Arc<Parameter>], id: &str) -> Option<&'a Arc<Parameter>> {
    parameters.iter().find(|p| p.id() == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parameter_defaults() {
        let p = Parameter::new("length", "Buffer Length", 1.0, 500.0, 90.0);
        assert_eq!(p.id(), "length");
        assert_eq!(p.display_name(), "Buffer Length");
        assert_relative_eq!(p.value(), 90.0);
        assert_relative_eq!(p.default_value(), 90.0);
    }

    #[test]
    fn test_parameter_clamps() {
        let p = Parameter::new("length", "Buffer Length", 1.0, 500.0, 90.0);
        p.set_value(1000.0);
        assert_relative_eq!(p.value(), 500.0);
        p.set_value(-3.0);
        assert_relative_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_parameter_ignores_nan() {
        let p = Parameter::new("gain", "Gain", -96.0, 24.0, 0.0);
        p.set_value(-6.0);
        p.set_value(f32::NAN);
        assert_relative_eq!(p.value(), -6.0);
    }

    #[test]
    fn test_parameter_normalized_and_reset() {
        let p = Parameter::new("mix", "Mix", 0.0, 2.0, 1.0);
        p.set_value(0.5);
        assert_relative_eq!(p.normalized(), 0.25);
        p.reset();
        assert_relative_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_shared_handle_sees_writes_across_threads() {
        let p = Parameter::shared("length", "Buffer Length", 1.0, 500.0, 90.0);
        let writer = Arc::clone(&p);
        std::thread::spawn(move || writer.set_value(250.0))
            .join()
            .unwrap();
        assert_relative_eq!(p.value(), 250.0);
    }
}
