mod cli;
mod registry;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command, RunArgs};
use registry::BackendKind;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    std::env::set_var("RUST_LOG", &args.log);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = args.to_config()?;
    let backend: BackendKind = args.backend.parse()?;
    let model = args
        .model_path()
        .context("--model is required unless --retrieve-context is given")?;
    info!(
        backend = ?backend,
        model = %model.display(),
        graphs = config.input_lists.len(),
        "graphrun starting"
    );

    let summary = registry::run(backend, model, config)
        .inspect_err(|err| error!(error = %format!("{err:#}"), "run failed"))?;

    for graph in &summary.graphs {
        info!(
            graph_idx = graph.graph_idx,
            graph = %graph.label,
            steps = graph.steps,
            populate_us = graph.timings.populate_us,
            backend_us = graph.timings.backend_us,
            serialize_us = graph.timings.serialize_us,
            "graph summary"
        );
    }
    info!(steps = summary.total_steps(), "graphrun finished");
    Ok(())
}
