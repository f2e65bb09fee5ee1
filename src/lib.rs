//! Plexus - Audio Plugin Host Core
//!
//! Plexus loads, arranges and runs a directed graph of audio nodes in real
//! time, persists that graph as a document, and drives the new/open/save
//! lifecycle for a surrounding application.
//!
//! # Architecture
//!
//! - [`node`]: the [`node::AudioNode`] processing contract and built-in nodes
//! - [`graph`]: [`graph::NodeGraph`], topological ordering and block routing
//! - [`document`]: [`document::GraphDocument`], load/save with a dirty flag
//! - [`session`]: [`session::GraphSessionController`] and its collaborators
//! - [`engine`]: buffers, WAV I/O and the real-time graph handoff

pub mod cli;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod session;

pub use config::HostConfig;
pub use error::{PlexusError, Result};
