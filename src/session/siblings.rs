//! Sibling subsystems notified after a graph replacement
//!
//! Every call is fire-and-forget: nothing returned here changes what the
//! controller does next.

use std::sync::Arc;

use crate::session::Session;

/// Audio engine: rebuilds its running graph from the session
pub trait EngineSubsystem: Send + Sync {
    fn reload_from_session(&self, session: &Session);
}

/// Audio device manager
pub trait DeviceSubsystem: Send + Sync {
    fn refresh_device_list(&self);
}

/// MIDI/parameter mapping subsystem
pub trait MappingSubsystem: Send + Sync {
    fn exit_learn_mode(&self);
}

/// Preset browser
pub trait PresetSubsystem: Send + Sync {
    fn refresh_preset_list(&self);
}

/// Plugin editor windows owned by the GUI
pub trait EditorWindows: Send + Sync {
    fn close_all_editor_windows(&self);

    /// Let the GUI settle its content after a new graph is installed
    fn stabilize_content(&self) {}
}

/// Handles to every sibling subsystem the controller talks to
#[derive(Clone)]
pub struct Siblings {
    pub engine: Arc<dyn EngineSubsystem>,
    pub devices: Arc<dyn DeviceSubsystem>,
    pub mapping: Arc<dyn MappingSubsystem>,
    pub presets: Arc<dyn PresetSubsystem>,
    pub editors: Arc<dyn EditorWindows>,
}

impl Siblings {
    /// Siblings for a host without GUI, devices, mappings or presets
    pub fn headless(engine: Arc<dyn EngineSubsystem>) -> Self {
        let null = Arc::new(NullSubsystem);
        Self {
            engine,
            devices: null.clone(),
            mapping: null.clone(),
            presets: null.clone(),
            editors: null,
        }
    }
}

impl std::fmt::Debug for Siblings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Siblings").finish_non_exhaustive()
    }
}

/// Subsystem that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSubsystem;

impl EngineSubsystem for NullSubsystem {
    fn reload_from_session(&self, _session: &Session) {}
}

impl DeviceSubsystem for NullSubsystem {
    fn refresh_device_list(&self) {}
}

impl MappingSubsystem for NullSubsystem {
    fn exit_learn_mode(&self) {}
}

impl PresetSubsystem for NullSubsystem {
    fn refresh_preset_list(&self) {}
}

impl EditorWindows for NullSubsystem {
    fn close_all_editor_windows(&self) {}
}
