//! Plexus CLI - Audio Plugin Host
//!
//! Command-line interface for editing, inspecting and rendering graph documents.

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plexus::cli::commands;
use plexus::cli::{Cli, Commands};
use plexus::HostConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Plexus v{}", env!("CARGO_PKG_VERSION"));

    let config = HostConfig::load_or_default(cli.config.as_deref())
        .context("failed to load host configuration")?
        .with_overrides(cli.sample_rate, cli.block_size)
        .context("invalid command line override")?;

    match cli.command {
        Some(cmd) => handle_command(&config, cmd),
        None => {
            println!("Plexus v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(config: &HostConfig, cmd: Commands) -> anyhow::Result<()> {
    let result = match cmd {
        Commands::New { path } => commands::new_document(config, &path),
        Commands::Info { path } => commands::show_info(&path),
        Commands::Classes => commands::list_classes(),
        Commands::AddNode {
            path,
            class,
            params,
        } => commands::add_node(config, &path, &class, &params),
        Commands::RemoveNode { path, id } => commands::remove_node(config, &path, id),
        Commands::Connect { path, source, dest } => commands::connect(config, &path, source, dest),
        Commands::Disconnect { path, source, dest } => {
            commands::disconnect(config, &path, source, dest)
        }
        Commands::SetParam {
            path,
            node,
            parameter,
            value,
        } => commands::set_param(config, &path, node, &parameter, value),
        Commands::Render {
            path,
            input,
            output,
        } => commands::render(config, &path, &input, &output),
        Commands::List { dir } => commands::list_documents(config, dir.as_deref()),
    };

    result.map_err(|err| match err.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{err}\n  hint: {hint}"),
        None => anyhow::Error::new(err),
    })
}
