//! CLI Module
//!
//! Command-line interface for editing, inspecting and rendering graph
//! documents without a GUI.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Plexus - audio plugin host
#[derive(Parser, Debug)]
#[command(name = "plexus")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Host configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the engine sample rate
    #[arg(long, global = true)]
    pub sample_rate: Option<f64>,

    /// Override the engine block size
    #[arg(long, global = true)]
    pub block_size: Option<usize>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a graph document holding the default graph
    New {
        /// Path of the new document
        path: PathBuf,
    },

    /// Print the contents of a graph document
    Info {
        /// Path to the document
        path: PathBuf,
    },

    /// List the node classes this host can instantiate
    Classes,

    /// Add a node to a document
    #[command(name = "add-node")]
    AddNode {
        /// Path to the document
        path: PathBuf,

        /// Node class id, e.g. plexus.allpass.stereo
        class: String,

        /// Initial parameter values as id=value
        #[arg(short, long = "param", value_parser = parse_assignment)]
        params: Vec<(String, f32)>,
    },

    /// Remove a node and its connections
    #[command(name = "remove-node")]
    RemoveNode {
        /// Path to the document
        path: PathBuf,

        /// Node id
        id: u32,
    },

    /// Connect an output channel to an input channel
    Connect {
        /// Path to the document
        path: PathBuf,

        /// Source as node:channel
        #[arg(value_parser = parse_endpoint)]
        source: (u32, usize),

        /// Destination as node:channel
        #[arg(value_parser = parse_endpoint)]
        dest: (u32, usize),
    },

    /// Remove a connection
    Disconnect {
        /// Path to the document
        path: PathBuf,

        /// Source as node:channel
        #[arg(value_parser = parse_endpoint)]
        source: (u32, usize),

        /// Destination as node:channel
        #[arg(value_parser = parse_endpoint)]
        dest: (u32, usize),
    },

    /// Set a node parameter
    #[command(name = "set-param")]
    SetParam {
        /// Path to the document
        path: PathBuf,

        /// Node id
        node: u32,

        /// Parameter id
        parameter: String,

        /// New value (clamped to the parameter range)
        #[arg(allow_hyphen_values = true)]
        value: f32,
    },

    /// Render a WAV file through a graph document
    Render {
        /// Path to the document
        path: PathBuf,

        /// Input WAV file
        #[arg(short, long)]
        input: PathBuf,

        /// Output WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List graph documents in a directory
    List {
        /// Directory to scan (defaults to the configured graphs directory)
        dir: Option<PathBuf>,
    },
}

/// Parse `node:channel`
pub fn parse_endpoint(s: &str) -> Result<(u32, usize), String> {
    let (node, channel) = s
        .split_once(':')
        .ok_or_else(|| format!("expected node:channel, got '{s}'"))?;
    let node = node
        .trim()
        .parse()
        .map_err(|_| format!("invalid node id '{node}'"))?;
    let channel = channel
        .trim()
        .parse()
        .map_err(|_| format!("invalid channel '{channel}'"))?;
    Ok((node, channel))
}

/// Parse `id=value`
pub fn parse_assignment(s: &str) -> Result<(String, f32), String> {
    let (id, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected id=value, got '{s}'"))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value '{value}'"))?;
    Ok((id.trim().to_string(), value))
}
