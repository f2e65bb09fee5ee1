//! Node registry and factory
//!
//! Maps processor class ids to factories. Documents store only the class id,
//! so loading a graph goes through here. The built-in nodes are registered
//! by [`NodeRegistry::with_builtins`]; the surrounding application registers
//! wrapped third-party plugins with [`NodeRegistry::register`].

use std::collections::BTreeMap;

use crate::node::allpass::{ALLPASS_MONO_CLASS, ALLPASS_STEREO_CLASS};
use crate::node::gain::{GAIN_MONO_CLASS, GAIN_STEREO_CLASS};
use crate::node::passthrough::{PASSTHROUGH_MONO_CLASS, PASSTHROUGH_STEREO_CLASS};
use crate::node::{AllPassFilterNode, AudioNode, GainNode, PassThroughNode};

/// Factory function type for creating nodes
pub type NodeFactory = Box<dyn Fn() -> Box<dyn AudioNode> + Send + Sync>;

/// Describes a registered node class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeClass {
    /// Class identifier
    pub class_id: String,
    /// Human-readable name
    pub name: String,
}

struct RegistryEntry {
    name: String,
    factory: NodeFactory,
}

/// Registry of instantiable node classes
pub struct NodeRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Create a registry with every built-in node
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PASSTHROUGH_MONO_CLASS, "Pass-through (mono)", || {
            Box::new(PassThroughNode::mono())
        });
        registry.register(PASSTHROUGH_STEREO_CLASS, "Pass-through (stereo)", || {
            Box::new(PassThroughNode::stereo())
        });
        registry.register(ALLPASS_MONO_CLASS, "AllPass Filter (mono)", || {
            Box::new(AllPassFilterNode::mono())
        });
        registry.register(ALLPASS_STEREO_CLASS, "AllPass Filter (stereo)", || {
            Box::new(AllPassFilterNode::stereo())
        });
        registry.register(GAIN_MONO_CLASS, "Gain (mono)", || Box::new(GainNode::mono()));
        registry.register(GAIN_STEREO_CLASS, "Gain (stereo)", || Box::new(GainNode::stereo()));
        registry
    }

    /// Register (or replace) a node class
    pub fn register<F>(&mut self, class_id: &str, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn AudioNode> + Send + Sync + 'static,
    {
        let previous = self.entries.insert(
            class_id.to_string(),
            RegistryEntry {
                name: name.to_string(),
                factory: Box::new(factory),
            },
        );
        if previous.is_some() {
            tracing::debug!(class = class_id, "replaced node class");
        }
    }

    /// Instantiate a node by class id
    pub fn create(&self, class_id: &str) -> Option<Box<dyn AudioNode>> {
        self.entries.get(class_id).map(|entry| (entry.factory)())
    }

    /// Check if a class id is registered
    pub fn contains(&self, class_id: &str) -> bool {
        self.entries.contains_key(class_id)
    }

    /// All registered classes, sorted by class id
    pub fn classes(&self) -> Vec<NodeClass> {
        self.entries
            .iter()
            .map(|(class_id, entry)| NodeClass {
                class_id: class_id.clone(),
                name: entry.name.clone(),
            })
            .collect()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("classes", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
