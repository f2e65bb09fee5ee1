//! CLI Command Implementations
//!
//! Editing commands open the document through a [`GraphSessionController`]
//! so they follow the same lifecycle as an interactive host, then save it
//! back in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::HostConfig;
use crate::document::{read_document, read_graph_file, GraphDocument, SaveOutcome};
use crate::engine::{export_wav, import_wav, AudioBuffer, AudioEngine, BitDepth};
use crate::error::Result;
use crate::graph::description::FILE_EXTENSION;
use crate::graph::{Connection, NodeId};
use crate::node::NodeRegistry;
use crate::session::{AutoPrompt, GraphSessionController, Siblings};

/// Build a headless controller with a live engine behind it
fn controller(config: &HostConfig) -> GraphSessionController {
    let registry = Arc::new(NodeRegistry::with_builtins());
    let engine = Arc::new(AudioEngine::new(
        Arc::clone(&registry),
        config.sample_rate,
        config.block_size,
    ));
    let document = GraphDocument::new(registry);
    let mut controller = GraphSessionController::new(
        config,
        document,
        Siblings::headless(engine),
        Arc::new(AutoPrompt::never_save()),
    );
    controller.activate();
    controller
}

/// Open `path`, apply `edit` to its document, save it back
fn edit_document<T>(
    config: &HostConfig,
    path: &Path,
    edit: impl FnOnce(&mut GraphDocument) -> Result<T>,
) -> Result<T> {
    let mut controller = controller(config);
    controller.open_graph(path)?;
    let value = edit(controller.document_mut())?;
    controller.save_graph(false)?;
    Ok(value)
}

/// Create a document holding the default graph.
pub fn new_document(config: &HostConfig, path: &Path) -> Result<()> {
    info!("Creating graph document: {}", path.display());

    let mut controller = controller(config);
    controller.new_graph()?;
    let outcome = controller
        .document_mut()
        .save_as(Some(path.to_path_buf()), &AutoPrompt::never_save())?;

    if let SaveOutcome::Saved(saved) = outcome {
        println!("Created: {}", saved.display());
    }
    Ok(())
}

/// Print every graph in a document.
pub fn show_info(path: &Path) -> Result<()> {
    let file = read_graph_file(path)?;
    let registry = NodeRegistry::with_builtins();
    let loaded = read_document(path, &registry)?;

    println!("Document: {}", path.display());
    println!("Format version: {}", file.version);
    println!("Last modified: {}", file.modified_at);
    println!();

    for graph in &file.graphs {
        let marker = if graph.active { " (active)" } else { "" };
        println!("Graph '{}'{} [{}]", graph.name, marker, graph.uuid);
        for node in &graph.nodes {
            println!("  #{} {} ({})", node.id, node.name, node.class);
            for (param, value) in &node.parameters {
                println!("      {param} = {value}");
            }
        }
        for c in &graph.connections {
            println!(
                "  #{}:{} -> #{}:{}",
                c.source, c.source_channel, c.dest, c.dest_channel
            );
        }
    }

    let order: Vec<String> = loaded
        .graph
        .processing_order()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!();
    println!("Processing order: {}", order.join(" -> "));
    Ok(())
}

/// List the node classes this host can instantiate.
pub fn list_classes() -> Result<()> {
    let registry = NodeRegistry::with_builtins();
    for class in registry.classes() {
        println!("{:<28} {}", class.class_id, class.name);
    }
    Ok(())
}

/// Add a node with optional initial parameter values.
pub fn add_node(config: &HostConfig, path: &Path, class: &str, params: &[(String, f32)]) -> Result<()> {
    info!("Adding {} to {}", class, path.display());

    let id = edit_document(config, path, |doc| {
        let id = doc.add_node(class)?;
        for (param, value) in params {
            doc.set_parameter(id, param, *value)?;
        }
        Ok(id)
    })?;

    println!("Added node {id} ({class})");
    Ok(())
}

/// Remove a node and its connections.
pub fn remove_node(config: &HostConfig, path: &Path, id: u32) -> Result<()> {
    edit_document(config, path, |doc| doc.remove_node(NodeId(id)))?;
    println!("Removed node #{id}");
    Ok(())
}

/// Connect two nodes.
pub fn connect(config: &HostConfig, path: &Path, source: (u32, usize), dest: (u32, usize)) -> Result<()> {
    let connection = Connection::new(NodeId(source.0), source.1, NodeId(dest.0), dest.1);
    edit_document(config, path, |doc| Ok(doc.connect(connection)?))?;
    println!("Connected {connection}");
    Ok(())
}

/// Remove a connection.
pub fn disconnect(config: &HostConfig, path: &Path, source: (u32, usize), dest: (u32, usize)) -> Result<()> {
    let connection = Connection::new(NodeId(source.0), source.1, NodeId(dest.0), dest.1);
    edit_document(config, path, |doc| Ok(doc.disconnect(connection)?))?;
    println!("Disconnected {connection}");
    Ok(())
}

/// Set one parameter.
pub fn set_param(config: &HostConfig, path: &Path, node: u32, parameter: &str, value: f32) -> Result<()> {
    let stored = edit_document(config, path, |doc| {
        doc.set_parameter(NodeId(node), parameter, value)?;
        let stored = doc
            .graph()
            .node(NodeId(node))
            .and_then(|n| crate::node::parameter::find(n.parameters(), parameter))
            .map(|p| p.value())
            .unwrap_or(value);
        Ok(stored)
    })?;

    if stored != value {
        warn!("{} clamped from {} to {}", parameter, value, stored);
    }
    println!("Set #{node}.{parameter} = {stored}");
    Ok(())
}

/// Render a WAV file through the document's active graph.
///
/// The engine runs at the input file's sample rate with the configured
/// block size, exactly as it would on the audio thread.
pub fn render(config: &HostConfig, path: &Path, input: &Path, output: &Path) -> Result<()> {
    info!("Rendering {} through {}", input.display(), path.display());

    let registry = Arc::new(NodeRegistry::with_builtins());
    let loaded = read_document(path, &registry)?;
    let source = import_wav(input)?;

    let engine = AudioEngine::new(
        Arc::clone(&registry),
        source.sample_rate() as f64,
        config.block_size,
    );
    engine.publish(loaded.graph);
    let rendered = render_buffer(&engine, &source);
    drop(engine);

    export_wav(&rendered, output, BitDepth::default())?;
    println!(
        "Rendered {} frames to {} (peak {:.1} dBFS)",
        rendered.num_samples(),
        output.display(),
        rendered.peak_db()
    );
    Ok(())
}

/// Push `source` through the engine block by block
pub fn render_buffer(engine: &AudioEngine, source: &AudioBuffer) -> AudioBuffer {
    let mut processor = engine.processor();
    let block_size = engine.block_size();
    let channels = source.num_channels();
    let total = source.num_samples();

    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(total); channels];
    let mut block = AudioBuffer::with_capacity(channels, block_size);

    let mut start = 0;
    while start < total {
        let frames = (total - start).min(block_size);
        block.set_num_samples(frames);
        block.copy_frames_from(source, start);
        processor.process_block(&mut block);
        for (ch, out) in output.iter_mut().enumerate() {
            out.extend_from_slice(block.channel(ch));
        }
        start += frames;
    }

    AudioBuffer::from_channels(output, source.sample_rate())
}

/// List graph documents under `dir`.
pub fn list_documents(config: &HostConfig, dir: Option<&Path>) -> Result<()> {
    let dir: PathBuf = dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.graphs_dir.clone());
    let registry = NodeRegistry::with_builtins();

    let mut found = 0;
    for entry in WalkDir::new(&dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == FILE_EXTENSION))
    {
        found += 1;
        match read_document(entry.path(), &registry) {
            Ok(loaded) => println!(
                "{}  '{}' ({} nodes)",
                entry.path().display(),
                loaded.name,
                loaded.graph.len()
            ),
            Err(err) => println!("{}  unreadable: {}", entry.path().display(), err),
        }
    }

    if found == 0 {
        println!("No graph documents in {}", dir.display());
    }
    Ok(())
}
